// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Repeated-split evaluation harness for binary spam classifiers
//!
//! This crate provides:
//! - Data set loading (raw class files, ARFF cache) and metadata lists
//! - Seeded, reproducible train/test partitioning
//! - Classification methods (Random, Majority, Naive Bayes, Logistic, Nearest Centroid)
//! - Per-class precision, recall, AUPRC and AUROC
//! - Per-configuration aggregation with outlier run replacement
//! - Tab-separated summary reporting

pub mod aggregator;
pub mod classifiers;
pub mod config;
pub mod datasets;
pub mod evaluation;
pub mod logging;
pub mod metrics;
pub mod outliers;
pub mod partition;
pub mod random;
pub mod report;
pub mod runner;

pub use aggregator::{MetricSummary, MetricsAggregator};
pub use classifiers::{Classifier, Method, Prediction};
pub use config::ExperimentConfig;
pub use datasets::{DataSetMetadata, Dataset, FolderData, Instance, Label};
pub use evaluation::MethodEvaluation;
pub use metrics::{ConfusionMatrix, Metric, RunMetrics};
pub use outliers::{OutlierReport, OutlierResampler, OutlierTest, StdDevTest};
pub use partition::{DatasetPartitioner, Partition};
pub use random::SeededRandomSource;
pub use runner::{ConfigurationOutcome, ExperimentRunner};
