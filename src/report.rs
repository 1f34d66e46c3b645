// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Tab-separated summary lines
//!
//! Column order: timestamp, dataset, statistics method, `total->actual`
//! features, method, then one column per metric.

use crate::aggregator::MetricSummary;
use crate::evaluation::MethodEvaluation;
use crate::metrics::Metric;
use std::collections::BTreeMap;

/// Timestamp layout of the first column
pub const DATE_FORMAT: &str = "%d/%m/%y %H:%M:%S%.3f %z";

/// Current local time in [`DATE_FORMAT`]
pub fn timestamp() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

/// Column titles, printed once per method
pub fn header_line() -> String {
    let mut columns = vec![
        "Timestamp".to_string(),
        "Dataset".to_string(),
        "Statistics".to_string(),
        "Features".to_string(),
        "Method".to_string(),
    ];
    columns.extend(Metric::ALL.iter().map(|m| m.name().to_string()));
    columns.join("\t")
}

/// Summary of the latest run
pub fn run_line(
    timestamp: &str,
    evaluation: &MethodEvaluation,
    values: &BTreeMap<Metric, f64>,
    format_durations: bool,
) -> String {
    let columns = values.iter().map(|(metric, value)| {
        if format_durations && metric.is_duration() {
            format_millis(*value)
        } else {
            format!("{:.2}", value)
        }
    });
    line(timestamp, evaluation, columns)
}

/// Mean ± standard deviation of every metric over the retained runs
pub fn aggregate_line(
    timestamp: &str,
    evaluation: &MethodEvaluation,
    summaries: &BTreeMap<Metric, MetricSummary>,
    format_durations: bool,
) -> String {
    let columns = summaries.iter().map(|(metric, s)| {
        if format_durations && metric.is_duration() {
            format!("{} ± {}", format_millis(s.mean), format_millis(s.std_dev))
        } else {
            format!("{:.2} ± {:.2}", s.mean, s.std_dev)
        }
    });
    line(timestamp, evaluation, columns)
}

fn line(timestamp: &str, evaluation: &MethodEvaluation, metrics: impl Iterator<Item = String>) -> String {
    let metadata = evaluation.metadata();
    let mut columns = vec![
        timestamp.to_string(),
        metadata.identifier(),
        metadata.stat_method(),
        format!("{}->{}", evaluation.total_features(), evaluation.actual_features()),
        evaluation.method().name().to_string(),
    ];
    columns.extend(metrics);
    columns.join("\t")
}

/// Render milliseconds as `HH:MM:SS.mmm`
pub fn format_millis(millis: f64) -> String {
    let total = if millis.is_finite() { millis.max(0.0).round() as u64 } else { 0 };
    let hours = total / 3_600_000;
    let minutes = (total / 60_000) % 60;
    let seconds = (total / 1_000) % 60;
    let ms = total % 1_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
}
