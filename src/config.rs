// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Experiment configuration

use crate::classifiers::Method;
use crate::outliers::DEFAULT_THRESHOLD;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings of one experiment, fixed before the first run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// File listing the data sets (`folder,empty_ham,empty_spam` per line)
    pub metadata_path: PathBuf,
    /// Methods to evaluate, in order
    pub methods: Vec<Method>,
    /// Scheduled runs per (method, data set) configuration
    pub runs: usize,
    /// Fraction of each data set used for training
    pub train_fraction: f64,
    /// Load persisted models instead of training
    pub skip_train: bool,
    /// Train only; record no metrics
    pub skip_test: bool,
    /// Append the empty-pattern supplement to every testing set
    pub include_empty: bool,
    /// Replace outlier runs with fresh ones
    pub remove_outliers: bool,
    /// Standard deviations from the mean that flag an outlier
    pub outlier_threshold: f64,
    pub save_model: bool,
    pub save_sets: bool,
    pub save_arff: bool,
    /// Print train and test times as `HH:MM:SS.mmm`
    pub format_durations: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from("metadata.csv"),
            methods: Method::ALL.to_vec(),
            runs: 10,
            train_fraction: 0.5,
            skip_train: false,
            skip_test: false,
            include_empty: false,
            remove_outliers: false,
            outlier_threshold: DEFAULT_THRESHOLD,
            save_model: false,
            save_sets: false,
            save_arff: false,
            format_durations: true,
        }
    }
}

impl ExperimentConfig {
    /// Reject settings no run could honour
    pub fn validate(&self) -> Result<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            bail!("Training fraction must be in (0, 1), got {}", self.train_fraction);
        }
        if self.methods.is_empty() {
            bail!("At least one classification method is required");
        }
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            bail!("Outlier threshold must be a positive number, got {}", self.outlier_threshold);
        }
        if self.skip_train && self.save_model {
            tracing::warn!("Both skip-train and save-model are set; loaded models will be written back");
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
