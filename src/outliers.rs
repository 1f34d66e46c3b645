// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Outlier run detection and retraction
//!
//! Once the scheduled runs of a configuration are complete, every metric is
//! tested on its own. A run flagged by any metric is removed from all of them,
//! so the sequences stay aligned, and the caller schedules one replacement run
//! per removed run.

use crate::aggregator::{MetricSummary, MetricsAggregator};
use crate::metrics::Metric;
use std::collections::BTreeSet;

/// Default distance from the mean, in standard deviations, that flags a sample
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Statistical rule deciding which samples of one metric are outliers
pub trait OutlierTest {
    /// Positions of the outlying samples
    fn outliers(&self, samples: &[f64]) -> Vec<usize>;

    fn name(&self) -> &str;
}

/// Flags samples further than `threshold` sample standard deviations from the mean
#[derive(Debug, Clone, Copy)]
pub struct StdDevTest {
    threshold: f64,
}

impl StdDevTest {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for StdDevTest {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl OutlierTest for StdDevTest {
    fn outliers(&self, samples: &[f64]) -> Vec<usize> {
        let Some(summary) = MetricSummary::from_samples(samples) else {
            return Vec::new();
        };
        let limit = self.threshold * summary.std_dev;

        samples
            .iter()
            .enumerate()
            .filter(|(_, x)| (*x - summary.mean).abs() > limit)
            .map(|(i, _)| i)
            .collect()
    }

    fn name(&self) -> &str {
        "stddev"
    }
}

/// Runs flagged for one metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlierReport {
    pub metric: Metric,
    pub runs: Vec<usize>,
}

/// Removes outlier runs from an aggregation window
pub struct OutlierResampler {
    test: Box<dyn OutlierTest>,
}

impl OutlierResampler {
    pub fn new(threshold: f64) -> Self {
        Self::with_test(Box::new(StdDevTest::new(threshold)))
    }

    pub fn with_test(test: Box<dyn OutlierTest>) -> Self {
        Self { test }
    }

    /// Outliers of every metric that has any
    pub fn detect(&self, aggregator: &MetricsAggregator) -> Vec<OutlierReport> {
        aggregator
            .iter()
            .filter_map(|(metric, samples)| {
                let runs = self.test.outliers(samples);
                (!runs.is_empty()).then_some(OutlierReport { metric, runs })
            })
            .collect()
    }

    /// Remove every flagged run from every metric and return how many runs were dropped
    pub fn detect_and_remove(&self, aggregator: &mut MetricsAggregator) -> usize {
        let reports = self.detect(aggregator);
        let flagged: BTreeSet<usize> = reports.iter().flat_map(|r| r.runs.iter().copied()).collect();

        for report in &reports {
            tracing::debug!("{} flagged runs {:?} of {}", self.test.name(), report.runs, report.metric);
        }

        // highest index first so earlier positions stay valid
        for &run in flagged.iter().rev() {
            for metric in Metric::ALL {
                aggregator.remove_sample_at(metric, run);
            }
        }

        if !flagged.is_empty() {
            tracing::info!(
                "Discarded {} outlier run(s) at positions {:?}",
                flagged.len(),
                flagged
            );
        }

        flagged.len()
    }
}

impl Default for OutlierResampler {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Label;
    use crate::metrics::RunMetrics;

    /// Window whose train times are `millis` and whose other metrics are constant
    fn window(millis: &[f64]) -> MetricsAggregator {
        let mut aggregator = MetricsAggregator::new();
        for &m in millis {
            let mut run = RunMetrics::from_predictions(&[Label::Ham], &[Label::Ham], &[0.1]);
            run.train_millis = m;
            run.test_millis = 1.0;
            aggregator.record(&run);
        }
        aggregator
    }

    #[test]
    fn test_stddev_flags_far_samples() {
        let test = StdDevTest::new(1.5);
        assert_eq!(test.outliers(&[1.0, 1.0, 10.0, 1.0, 1.0]), vec![2]);
        assert!(StdDevTest::default().outliers(&[1.0, 1.0, 10.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn test_constant_samples_have_no_outliers() {
        assert!(StdDevTest::default().outliers(&[3.0; 8]).is_empty());
        assert!(StdDevTest::default().outliers(&[]).is_empty());
    }

    #[test]
    fn test_removes_run_from_every_metric() {
        let mut aggregator = window(&[5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 100.0]);
        let resampler = OutlierResampler::default();

        let reports = resampler.detect(&aggregator);
        assert_eq!(reports, vec![OutlierReport { metric: Metric::TrainTime, runs: vec![9] }]);

        assert_eq!(resampler.detect_and_remove(&mut aggregator), 1);
        for (_, samples) in aggregator.iter() {
            assert_eq!(samples.len(), 9);
        }
        assert_eq!(aggregator.samples(Metric::TrainTime), &[5.0; 9]);
    }

    #[test]
    fn test_union_across_metrics() {
        struct FlagByMetric;
        impl OutlierTest for FlagByMetric {
            fn outliers(&self, samples: &[f64]) -> Vec<usize> {
                // sequences starting at zero flag run 1, all-ones sequences flag runs 1 and 3
                if samples.first() == Some(&0.0) {
                    vec![1]
                } else if samples.iter().all(|x| *x == 1.0) && samples.len() == 4 {
                    vec![1, 3]
                } else {
                    Vec::new()
                }
            }
            fn name(&self) -> &str {
                "scripted"
            }
        }

        let mut aggregator = window(&[0.0, 1.0, 2.0, 3.0]);
        let resampler = OutlierResampler::with_test(Box::new(FlagByMetric));

        assert_eq!(resampler.detect_and_remove(&mut aggregator), 2);
        assert_eq!(aggregator.samples(Metric::TrainTime), &[0.0, 2.0]);
        assert_eq!(aggregator.run_count(), 2);
    }

    #[test]
    fn test_no_flapping_at_fixed_point() {
        let mut aggregator = window(&[4.0, 5.0, 6.0, 5.0, 4.0, 6.0, 5.0, 50.0, 5.0, 4.0, 6.0, 5.0]);
        let resampler = OutlierResampler::default();

        let mut rounds = 0;
        while resampler.detect_and_remove(&mut aggregator) > 0 {
            rounds += 1;
            assert!(rounds < 20);
        }
        assert_eq!(resampler.detect_and_remove(&mut aggregator), 0);
        assert_eq!(resampler.detect_and_remove(&mut aggregator), 0);
    }
}
