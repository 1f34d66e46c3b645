// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-configuration accumulation of run metrics
//!
//! Each metric keeps its own ordered sequence of samples, one per completed
//! run. Sequences are indexed by run position and can be edited one metric at
//! a time, which is how outlier runs are retracted after the fact.

use crate::metrics::{Metric, RunMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean and sample standard deviation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: f64,
}

impl MetricSummary {
    /// `None` for an empty slice; a single sample has zero deviation
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let std_dev = if samples.len() < 2 {
            0.0
        } else {
            let squared: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
            (squared / (n - 1.0)).sqrt()
        };
        Some(Self { mean, std_dev })
    }
}

/// Aggregation window of the configuration currently being evaluated
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    samples: BTreeMap<Metric, Vec<f64>>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            samples: Metric::ALL.iter().map(|&m| (m, Vec::new())).collect(),
        }
    }

    /// Drop every sample; called before the first run of a configuration
    pub fn reset(&mut self) {
        for values in self.samples.values_mut() {
            values.clear();
        }
    }

    /// Append one sample per metric from a run's evaluation
    pub fn record(&mut self, run: &RunMetrics) {
        for (metric, values) in self.samples.iter_mut() {
            values.push(run.value(*metric));
        }
    }

    /// Samples retained for `metric`, oldest first
    pub fn samples(&self, metric: Metric) -> &[f64] {
        self.samples.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Metrics and their samples in column order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, &[f64])> + '_ {
        self.samples.iter().map(|(m, v)| (*m, v.as_slice()))
    }

    /// Number of runs retained, i.e. the length of the shortest sequence
    pub fn run_count(&self) -> usize {
        self.samples.values().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.run_count() == 0
    }

    /// Most recent sample of every metric, `None` while any sequence is empty
    pub fn last_values(&self) -> Option<BTreeMap<Metric, f64>> {
        self.samples
            .iter()
            .map(|(m, v)| v.last().map(|last| (*m, *last)))
            .collect()
    }

    /// Mean and standard deviation of every metric, `None` while any sequence is empty
    pub fn mean_and_std_dev(&self) -> Option<BTreeMap<Metric, MetricSummary>> {
        self.samples
            .iter()
            .map(|(m, v)| MetricSummary::from_samples(v).map(|s| (*m, s)))
            .collect()
    }

    /// Delete one sample of one metric; other metrics are left untouched
    pub fn remove_sample_at(&mut self, metric: Metric, index: usize) -> Option<f64> {
        let values = self.samples.get_mut(&metric)?;
        if index < values.len() {
            Some(values.remove(index))
        } else {
            None
        }
    }
}
