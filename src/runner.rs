// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Repeated-split experiment loop
//!
//! For every (method, data set) configuration:
//! - reset the seed source and the aggregation window
//! - run partition / train / test / record until the scheduled runs are done
//! - retract outlier runs and execute one replacement per retracted run
//! - emit the aggregate summary line
//!
//! Any error aborts the whole experiment.

use crate::aggregator::{MetricSummary, MetricsAggregator};
use crate::classifiers::{save_classifier, Method};
use crate::config::ExperimentConfig;
use crate::datasets::{load_metadata, DataSetMetadata, Dataset, FolderData, ARFF_FILE_NAME};
use crate::evaluation::MethodEvaluation;
use crate::metrics::Metric;
use crate::outliers::{OutlierResampler, OutlierTest};
use crate::partition::DatasetPartitioner;
use crate::random::SeededRandomSource;
use crate::report;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::io::Write;

pub const TRAINING_SET_FILE_NAME: &str = "training.csv";
pub const TESTING_SET_FILE_NAME: &str = "testing.csv";

/// What one configuration did
#[derive(Debug, Clone, Default)]
pub struct ConfigurationOutcome {
    /// Runs executed, replacements included
    pub runs_executed: usize,
    /// Runs that trained a classifier rather than loading one
    pub trained_runs: usize,
    /// Runs retracted as outliers
    pub outliers_removed: usize,
    /// Statistics over the retained runs, absent when nothing was tested
    pub summary: Option<BTreeMap<Metric, MetricSummary>>,
}

/// Drives every configuration of an experiment and writes summary lines to `sink`
pub struct ExperimentRunner<W: Write> {
    config: ExperimentConfig,
    partitioner: DatasetPartitioner,
    seeds: SeededRandomSource,
    aggregator: MetricsAggregator,
    resampler: OutlierResampler,
    sink: W,
}

impl<W: Write> ExperimentRunner<W> {
    pub fn new(config: ExperimentConfig, sink: W) -> Result<Self> {
        config.validate()?;
        let partitioner = DatasetPartitioner::new(config.train_fraction)?;
        let resampler = OutlierResampler::new(config.outlier_threshold);

        Ok(Self {
            config,
            partitioner,
            seeds: SeededRandomSource::new(),
            aggregator: MetricsAggregator::new(),
            resampler,
            sink,
        })
    }

    /// Replace the statistical rule used to flag outlier runs
    pub fn with_outlier_test(mut self, test: Box<dyn OutlierTest>) -> Self {
        self.resampler = OutlierResampler::with_test(test);
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Evaluate every method on every data set listed in the metadata file
    pub fn run(&mut self) -> Result<()> {
        let datasets = load_metadata(&self.config.metadata_path)?;
        if datasets.is_empty() {
            tracing::warn!("No data sets listed in {}", self.config.metadata_path.display());
        }
        for metadata in &datasets {
            if !metadata.folder.is_dir() {
                bail!("Data set folder does not exist: {}", metadata.folder.display());
            }
        }

        let methods = self.config.methods.clone();
        for method in methods {
            tracing::info!("Method {}: {}", method.name(), method.description());
            writeln!(self.sink, "{}", report::header_line())?;

            for metadata in &datasets {
                let data = self.load_data_set(metadata)?;
                self.run_configuration(method, metadata, &data)
                    .with_context(|| format!("{} on {} failed", method.name(), metadata.identifier()))?;
            }
        }

        self.sink.flush()?;
        Ok(())
    }

    fn load_data_set(&self, metadata: &DataSetMetadata) -> Result<FolderData> {
        let arff_path = metadata.folder.join(ARFF_FILE_NAME);
        let cached = arff_path.exists();

        let data = Dataset::load_folder(&metadata.folder)?;
        tracing::info!(
            "Loaded {} ({} instances, {} features{})",
            metadata.identifier(),
            data.dataset.len(),
            data.dataset.feature_count(),
            if cached { ", cached" } else { "" }
        );

        if self.config.save_arff && !cached {
            data.dataset.save_arff(&arff_path)?;
        }
        Ok(data)
    }

    /// Execute the runs of one (method, data set) configuration
    pub fn run_configuration(
        &mut self,
        method: Method,
        metadata: &DataSetMetadata,
        data: &FolderData,
    ) -> Result<ConfigurationOutcome> {
        let skip_test = self.config.skip_test;
        let dataset = &data.dataset;

        self.seeds.reset();
        self.aggregator.reset();
        let base_classifier = method.build_classifier();

        let supplement = self.config.include_empty.then(|| {
            Dataset::create_empty_patterns(
                dataset.feature_count(),
                metadata.empty_ham_count,
                metadata.empty_spam_count,
            )
        });

        let mut outcome = ConfigurationOutcome::default();
        let mut last_evaluation: Option<MethodEvaluation> = None;
        let mut remaining = self.config.runs;

        while remaining > 0 {
            let mut rng = self.seeds.next();
            let seed = self.seeds.current_seed();

            let mut partition = self.partitioner.partition(dataset, &mut rng)?;
            if let Some(supplement) = &supplement {
                DatasetPartitioner::append_supplement(&mut partition.testing, supplement)?;
            }
            if self.config.save_sets {
                partition.training.save_csv(&metadata.folder.join(TRAINING_SET_FILE_NAME))?;
                partition.testing.save_csv(&metadata.folder.join(TESTING_SET_FILE_NAME))?;
            }

            let mut evaluation = MethodEvaluation::new(
                method,
                base_classifier.box_clone(),
                metadata.clone(),
                data.total_features,
                dataset.feature_count(),
            );

            let model_path = method.model_path(&metadata.folder, self.partitioner.train_fraction(), seed);
            if self.config.skip_train {
                evaluation.use_trained(method.load_classifier(&model_path)?);
            } else {
                evaluation.train(&partition.training);
                outcome.trained_runs += 1;
            }
            if self.config.save_model {
                save_classifier(evaluation.classifier(), &model_path)?;
            }

            if !skip_test {
                let metrics = evaluation.test(&partition.testing);
                self.aggregator.record(metrics);

                if let Some(values) = self.aggregator.last_values() {
                    let line = report::run_line(
                        &report::timestamp(),
                        &evaluation,
                        &values,
                        self.config.format_durations,
                    );
                    writeln!(self.sink, "{}", line)?;
                }
            }

            outcome.runs_executed += 1;
            remaining -= 1;
            last_evaluation = Some(evaluation);

            if remaining == 0 && !skip_test && self.config.remove_outliers {
                let removed = self.resampler.detect_and_remove(&mut self.aggregator);
                if removed > 0 {
                    tracing::info!("Scheduling {} replacement run(s)", removed);
                    outcome.outliers_removed += removed;
                    remaining += removed;
                }
            }
        }

        if !skip_test {
            if let (Some(evaluation), Some(summary)) = (&last_evaluation, self.aggregator.mean_and_std_dev()) {
                let line = report::aggregate_line(
                    &report::timestamp(),
                    evaluation,
                    &summary,
                    self.config.format_durations,
                );
                writeln!(self.sink, "{}", line)?;
                outcome.summary = Some(summary);
            }
        }

        tracing::info!(
            "Finished {} on {}: {} run(s), {} retained",
            method.name(),
            metadata.identifier(),
            outcome.runs_executed,
            self.aggregator.run_count()
        );
        Ok(outcome)
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Instance, Label};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;

    /// Two well separated clusters, alternating ham and spam
    fn clustered(size: usize) -> Dataset {
        let instances = (0..size)
            .map(|i| {
                let offset = (i / 2) as f64 * 0.05;
                if i % 2 == 0 {
                    Instance::new(vec![offset, 1.0 - offset], Label::Ham)
                } else {
                    Instance::new(vec![4.0 + offset, 5.0 - offset], Label::Spam)
                }
            })
            .collect();
        Dataset::from_instances("clustered", 2, instances).unwrap()
    }

    fn folder_data(size: usize) -> FolderData {
        FolderData {
            dataset: clustered(size),
            total_features: 2,
        }
    }

    fn config(runs: usize) -> ExperimentConfig {
        ExperimentConfig {
            methods: vec![Method::NearestCentroid],
            runs,
            ..Default::default()
        }
    }

    fn lines(sink: Vec<u8>) -> Vec<String> {
        String::from_utf8(sink).unwrap().lines().map(str::to_string).collect()
    }

    /// Flags run 2 the first time it is consulted, never again
    struct FlagRunTwoOnce {
        fired: Cell<bool>,
    }

    impl OutlierTest for FlagRunTwoOnce {
        fn outliers(&self, samples: &[f64]) -> Vec<usize> {
            if self.fired.get() || samples.len() < 3 {
                return Vec::new();
            }
            self.fired.set(true);
            vec![2]
        }

        fn name(&self) -> &str {
            "flag-run-two-once"
        }
    }

    #[test]
    fn test_five_runs_without_outliers() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let mut runner = ExperimentRunner::new(config(5), Vec::new()).unwrap();

        let outcome = runner
            .run_configuration(Method::NearestCentroid, &metadata, &folder_data(20))
            .unwrap();

        assert_eq!(outcome.runs_executed, 5);
        assert_eq!(outcome.outliers_removed, 0);
        assert_eq!(runner.aggregator().run_count(), 5);
        for (_, samples) in runner.aggregator().iter() {
            assert_eq!(samples.len(), 5);
        }

        let summary = outcome.summary.unwrap();
        assert_eq!(summary[&Metric::SpamRecall].mean, 1.0);

        let lines = lines(runner.into_sink());
        assert_eq!(lines.len(), 6);
        assert!(lines[..5].iter().all(|l| !l.contains('±')));
        assert!(lines[5].contains('±'));
        assert_eq!(lines[5].split('\t').count(), 15);
    }

    #[test]
    fn test_outlier_run_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let config = ExperimentConfig {
            remove_outliers: true,
            ..config(5)
        };
        let mut runner = ExperimentRunner::new(config, Vec::new())
            .unwrap()
            .with_outlier_test(Box::new(FlagRunTwoOnce { fired: Cell::new(false) }));

        let outcome = runner
            .run_configuration(Method::NearestCentroid, &metadata, &folder_data(20))
            .unwrap();

        assert_eq!(outcome.runs_executed, 6);
        assert_eq!(outcome.outliers_removed, 1);
        for (_, samples) in runner.aggregator().iter() {
            assert_eq!(samples.len(), 5);
        }

        let lines = lines(runner.into_sink());
        assert_eq!(lines.len(), 7);
        assert!(lines[6].contains('±'));
    }

    #[test]
    fn test_outliers_ignored_unless_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let mut runner = ExperimentRunner::new(config(5), Vec::new())
            .unwrap()
            .with_outlier_test(Box::new(FlagRunTwoOnce { fired: Cell::new(false) }));

        let outcome = runner
            .run_configuration(Method::NearestCentroid, &metadata, &folder_data(20))
            .unwrap();
        assert_eq!(outcome.runs_executed, 5);
        assert_eq!(outcome.outliers_removed, 0);
    }

    #[test]
    fn test_skip_test_trains_silently() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let config = ExperimentConfig {
            skip_test: true,
            remove_outliers: true,
            ..config(4)
        };
        let mut runner = ExperimentRunner::new(config, Vec::new()).unwrap();

        let outcome = runner
            .run_configuration(Method::NearestCentroid, &metadata, &folder_data(20))
            .unwrap();

        assert_eq!(outcome.runs_executed, 4);
        assert_eq!(outcome.trained_runs, 4);
        assert!(outcome.summary.is_none());
        assert!(runner.aggregator().is_empty());
        assert!(runner.into_sink().is_empty());
    }

    #[test]
    fn test_half_split_of_ten() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let config = ExperimentConfig {
            save_sets: true,
            ..config(1)
        };
        let mut runner = ExperimentRunner::new(config, Vec::new()).unwrap();

        let data = folder_data(10);
        let partitioner = DatasetPartitioner::new(0.5).unwrap();
        let mut seeds = SeededRandomSource::new();
        for _ in 0..10 {
            let partition = partitioner.partition(&data.dataset, &mut seeds.next()).unwrap();
            assert_eq!(partition.training.len(), 5);
            assert_eq!(partition.testing.len(), 5);
        }

        runner.run_configuration(Method::NearestCentroid, &metadata, &data).unwrap();
        let count_rows = |name: &str| {
            fs::read_to_string(dir.path().join(name)).unwrap().lines().count() - 1
        };
        assert_eq!(count_rows(TRAINING_SET_FILE_NAME), 5);
        assert_eq!(count_rows(TESTING_SET_FILE_NAME), 5);
    }

    #[test]
    fn test_zero_runs_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let mut runner = ExperimentRunner::new(config(0), Vec::new()).unwrap();

        let outcome = runner
            .run_configuration(Method::NearestCentroid, &metadata, &folder_data(10))
            .unwrap();

        assert_eq!(outcome.runs_executed, 0);
        assert!(outcome.summary.is_none());
        assert!(runner.into_sink().is_empty());
    }

    #[test]
    fn test_empty_patterns_reach_testing_only() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 3, 2);
        let config = ExperimentConfig {
            include_empty: true,
            save_sets: true,
            ..config(1)
        };
        let mut runner = ExperimentRunner::new(config, Vec::new()).unwrap();
        runner.run_configuration(Method::NearestCentroid, &metadata, &folder_data(10)).unwrap();

        let training = fs::read_to_string(dir.path().join(TRAINING_SET_FILE_NAME)).unwrap();
        let testing = fs::read_to_string(dir.path().join(TESTING_SET_FILE_NAME)).unwrap();
        assert_eq!(training.lines().count() - 1, 5);
        assert_eq!(testing.lines().count() - 1, 10);
        assert_eq!(testing.lines().filter(|l| l.starts_with("0,0,")).count(), 5);
    }

    #[test]
    fn test_saved_models_are_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let data = folder_data(20);

        let save = ExperimentConfig {
            save_model: true,
            ..config(3)
        };
        ExperimentRunner::new(save, Vec::new())
            .unwrap()
            .run_configuration(Method::NearestCentroid, &metadata, &data)
            .unwrap();
        for seed in [2, 3, 5] {
            assert!(Method::NearestCentroid.model_path(dir.path(), 0.5, seed).exists());
        }

        let load = ExperimentConfig {
            skip_train: true,
            ..config(3)
        };
        let mut runner = ExperimentRunner::new(load, Vec::new()).unwrap();
        let outcome = runner.run_configuration(Method::NearestCentroid, &metadata, &data).unwrap();

        assert_eq!(outcome.trained_runs, 0);
        assert_eq!(runner.aggregator().samples(Metric::TrainTime), &[0.0; 3]);
        assert_eq!(outcome.summary.unwrap()[&Metric::HamRecall].mean, 1.0);
    }

    #[test]
    fn test_missing_model_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = DataSetMetadata::new(dir.path(), 0, 0);
        let config = ExperimentConfig {
            skip_train: true,
            ..config(2)
        };
        let mut runner = ExperimentRunner::new(config, Vec::new()).unwrap();

        assert!(runner
            .run_configuration(Method::NearestCentroid, &metadata, &folder_data(10))
            .is_err());
    }

    fn write_data_set(base: &Path) -> std::path::PathBuf {
        let folder = base.join("TREC").join("CHI2").join("2");
        fs::create_dir_all(&folder).unwrap();
        clustered(12).save_arff(&folder.join(ARFF_FILE_NAME)).unwrap();
        folder
    }

    #[test]
    fn test_full_experiment_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let folder = write_data_set(dir.path());
        let metadata_path = dir.path().join("metadata.csv");
        fs::write(&metadata_path, format!("# data sets\n{},0,0\n", folder.display())).unwrap();

        let config = ExperimentConfig {
            metadata_path,
            methods: vec![Method::Majority, Method::NearestCentroid],
            runs: 2,
            ..Default::default()
        };
        let mut runner = ExperimentRunner::new(config, Vec::new()).unwrap();
        runner.run().unwrap();

        let lines = lines(runner.into_sink());
        // per method: header, two runs, aggregate
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("Timestamp\t"));
        assert!(lines[4].starts_with("Timestamp\t"));
        assert!(lines[1].contains("\tCHI2\t2->2\tMajority\t"));
        assert!(lines[7].contains("\tNearestCentroid\t"));
    }

    #[test]
    fn test_missing_folder_aborts_before_any_run() {
        let dir = tempfile::tempdir().unwrap();
        let metadata_path = dir.path().join("metadata.csv");
        fs::write(&metadata_path, format!("{},0,0\n", dir.path().join("absent").display())).unwrap();

        let config = ExperimentConfig {
            metadata_path,
            ..config(2)
        };
        let mut runner = ExperimentRunner::new(config, Vec::new()).unwrap();

        assert!(runner.run().is_err());
        assert!(runner.into_sink().is_empty());
    }
}
