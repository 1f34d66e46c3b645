// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-run training and evaluation of one method on one dataset

use crate::classifiers::{Classifier, Method};
use crate::datasets::{DataSetMetadata, Dataset, Label};
use crate::metrics::RunMetrics;
use std::time::Instant;

/// Result bundle of one run: the trained classifier, its evaluation and the
/// configuration it belongs to
pub struct MethodEvaluation {
    method: Method,
    classifier: Box<dyn Classifier>,
    metrics: Option<RunMetrics>,
    metadata: DataSetMetadata,
    total_features: usize,
    actual_features: usize,
    train_millis: f64,
}

impl MethodEvaluation {
    pub fn new(
        method: Method,
        classifier: Box<dyn Classifier>,
        metadata: DataSetMetadata,
        total_features: usize,
        actual_features: usize,
    ) -> Self {
        Self {
            method,
            classifier,
            metrics: None,
            metadata,
            total_features,
            actual_features,
            train_millis: 0.0,
        }
    }

    /// Train the held classifier and record the elapsed time
    pub fn train(&mut self, training: &Dataset) {
        let start = Instant::now();
        self.classifier.train(training.instances());
        self.train_millis = elapsed_millis(start);

        tracing::debug!(
            "Trained {} on {} instances in {} ms",
            self.method.name(),
            training.len(),
            self.train_millis
        );
    }

    /// Replace the classifier with a previously trained one; train time is zero
    pub fn use_trained(&mut self, classifier: Box<dyn Classifier>) {
        self.classifier = classifier;
        self.train_millis = 0.0;
    }

    /// Evaluate the classifier on `testing`
    pub fn test(&mut self, testing: &Dataset) -> &RunMetrics {
        let start = Instant::now();
        let predictions = self.classifier.predict_batch(testing.instances());
        let test_millis = elapsed_millis(start);

        let pred_labels: Vec<Label> = predictions.iter().map(|p| p.label).collect();
        let true_labels: Vec<Label> = testing.instances().iter().map(|i| i.label).collect();
        let probabilities: Vec<f64> = predictions.iter().map(|p| p.probability).collect();

        let mut metrics = RunMetrics::from_predictions(&pred_labels, &true_labels, &probabilities);
        metrics.train_millis = self.train_millis;
        metrics.test_millis = test_millis;

        self.metrics.insert(metrics)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn metrics(&self) -> Option<&RunMetrics> {
        self.metrics.as_ref()
    }

    pub fn metadata(&self) -> &DataSetMetadata {
        &self.metadata
    }

    pub fn total_features(&self) -> usize {
        self.total_features
    }

    pub fn actual_features(&self) -> usize {
        self.actual_features
    }
}

/// Whole milliseconds since `start`
fn elapsed_millis(start: Instant) -> f64 {
    start.elapsed().as_millis() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Instance;
    use crate::metrics::Metric;

    fn separable(name: &str) -> Dataset {
        let instances = (0..6)
            .map(|i| {
                let offset = i as f64 * 0.1;
                if i % 2 == 0 {
                    Instance::new(vec![offset, offset], Label::Ham)
                } else {
                    Instance::new(vec![3.0 + offset, 3.0 - offset], Label::Spam)
                }
            })
            .collect();
        Dataset::from_instances(name, 2, instances).unwrap()
    }

    fn evaluation() -> MethodEvaluation {
        let method = Method::NearestCentroid;
        MethodEvaluation::new(
            method,
            method.build_classifier(),
            DataSetMetadata::new("/data/TREC/CHI2/2", 0, 0),
            8,
            2,
        )
    }

    #[test]
    fn test_train_then_test() {
        let mut evaluation = evaluation();
        assert!(evaluation.metrics().is_none());

        evaluation.train(&separable("train"));
        let metrics = evaluation.test(&separable("test"));

        assert_eq!(metrics.confusion_matrix.total(), 6);
        assert_eq!(metrics.value(Metric::SpamRecall), 1.0);
        assert_eq!(metrics.value(Metric::HamPrecision), 1.0);
        assert_eq!(metrics.value(Metric::TrainTime).fract(), 0.0);
        assert!(evaluation.metrics().is_some());
    }

    #[test]
    fn test_trained_classifier_has_zero_train_time() {
        let mut trained = Method::NearestCentroid.build_classifier();
        trained.train(separable("train").instances());

        let mut evaluation = evaluation();
        evaluation.use_trained(trained);
        let metrics = evaluation.test(&separable("test"));

        assert_eq!(metrics.train_millis, 0.0);
        assert_eq!(metrics.value(Metric::SpamPrecision), 1.0);
    }

    #[test]
    fn test_feature_counts_and_identity() {
        let evaluation = evaluation();
        assert_eq!(evaluation.total_features(), 8);
        assert_eq!(evaluation.actual_features(), 2);
        assert_eq!(evaluation.method(), Method::NearestCentroid);
        assert_eq!(evaluation.classifier().name(), "NearestCentroid");
        assert_eq!(evaluation.metadata().stat_method(), "CHI2");
    }
}
