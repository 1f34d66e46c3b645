// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for ham/spam classification
//!
//! Every run produces the same fixed set of named metrics:
//! - Per-class precision and recall
//! - Per-class area under the precision-recall curve
//! - Per-class area under the ROC curve
//! - Train and test duration in milliseconds

use crate::datasets::Label;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Named metric recorded once per run
///
/// Declaration order is the column order of every summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    HamPrecision,
    SpamPrecision,
    HamRecall,
    SpamRecall,
    HamAreaUnderPrc,
    SpamAreaUnderPrc,
    HamAreaUnderRoc,
    SpamAreaUnderRoc,
    TrainTime,
    TestTime,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::HamPrecision,
        Metric::SpamPrecision,
        Metric::HamRecall,
        Metric::SpamRecall,
        Metric::HamAreaUnderPrc,
        Metric::SpamAreaUnderPrc,
        Metric::HamAreaUnderRoc,
        Metric::SpamAreaUnderRoc,
        Metric::TrainTime,
        Metric::TestTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::HamPrecision => "Ham Precision",
            Metric::SpamPrecision => "Spam Precision",
            Metric::HamRecall => "Ham Recall",
            Metric::SpamRecall => "Spam Recall",
            Metric::HamAreaUnderPrc => "Ham Area Under PRC",
            Metric::SpamAreaUnderPrc => "Spam Area Under PRC",
            Metric::HamAreaUnderRoc => "Ham Area Under ROC",
            Metric::SpamAreaUnderRoc => "Spam Area Under ROC",
            Metric::TrainTime => "Train Time",
            Metric::TestTime => "Test Time",
        }
    }

    /// Whether the metric is a duration in milliseconds
    pub fn is_duration(&self) -> bool {
        matches!(self, Metric::TrainTime | Metric::TestTime)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Confusion matrix with SPAM as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Spam predicted as spam
    pub tp: usize,
    /// Ham predicted as ham
    pub tn: usize,
    /// Ham predicted as spam
    pub fp: usize,
    /// Spam predicted as ham
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Create from predictions and ground truth labels
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        assert_eq!(predictions.len(), ground_truth.len(), "Prediction and ground truth lengths must match");

        let mut matrix = Self::default();

        for (pred, truth) in predictions.iter().zip(ground_truth.iter()) {
            match (pred, truth) {
                (Label::Spam, Label::Spam) => matrix.tp += 1,
                (Label::Ham, Label::Ham) => matrix.tn += 1,
                (Label::Spam, Label::Ham) => matrix.fp += 1,
                (Label::Ham, Label::Spam) => matrix.fn_ += 1,
            }
        }

        matrix
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Fraction of predictions of `class` that were correct
    pub fn precision(&self, class: Label) -> f64 {
        match class {
            Label::Spam => ratio(self.tp, self.tp + self.fp),
            Label::Ham => ratio(self.tn, self.tn + self.fn_),
        }
    }

    /// Fraction of instances of `class` that were found
    pub fn recall(&self, class: Label) -> f64 {
        match class {
            Label::Spam => ratio(self.tp, self.tp + self.fn_),
            Label::Ham => ratio(self.tn, self.tn + self.fp),
        }
    }

    pub fn support(&self, class: Label) -> usize {
        match class {
            Label::Spam => self.tp + self.fn_,
            Label::Ham => self.tn + self.fp,
        }
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    num as f64 / denom as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub area_under_prc: f64,
    pub area_under_roc: f64,
    pub support: usize,
}

/// Outcome of evaluating one trained classifier on one testing set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub confusion_matrix: ConfusionMatrix,
    pub per_class: BTreeMap<Label, ClassMetrics>,
    pub train_millis: f64,
    pub test_millis: f64,
}

impl RunMetrics {
    /// Create from predictions with spam probability scores; durations start at zero
    pub fn from_predictions(
        predictions: &[Label],
        ground_truth: &[Label],
        probabilities: &[f64], // P(spam)
    ) -> Self {
        let confusion_matrix = ConfusionMatrix::from_predictions(predictions, ground_truth);

        let per_class = Label::ALL
            .iter()
            .map(|&class| {
                // score each instance by its probability of belonging to `class`
                let scored: Vec<(bool, f64)> = ground_truth
                    .iter()
                    .zip(probabilities.iter())
                    .map(|(label, p)| {
                        let score = if class == Label::Spam { *p } else { 1.0 - *p };
                        (*label == class, score)
                    })
                    .collect();

                let metrics = ClassMetrics {
                    precision: confusion_matrix.precision(class),
                    recall: confusion_matrix.recall(class),
                    area_under_prc: area_under_prc(&scored),
                    area_under_roc: area_under_roc(&scored),
                    support: confusion_matrix.support(class),
                };
                (class, metrics)
            })
            .collect();

        Self {
            confusion_matrix,
            per_class,
            train_millis: 0.0,
            test_millis: 0.0,
        }
    }

    /// Value of one named metric
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HamPrecision => self.class(Label::Ham).precision,
            Metric::SpamPrecision => self.class(Label::Spam).precision,
            Metric::HamRecall => self.class(Label::Ham).recall,
            Metric::SpamRecall => self.class(Label::Spam).recall,
            Metric::HamAreaUnderPrc => self.class(Label::Ham).area_under_prc,
            Metric::SpamAreaUnderPrc => self.class(Label::Spam).area_under_prc,
            Metric::HamAreaUnderRoc => self.class(Label::Ham).area_under_roc,
            Metric::SpamAreaUnderRoc => self.class(Label::Spam).area_under_roc,
            Metric::TrainTime => self.train_millis,
            Metric::TestTime => self.test_millis,
        }
    }

    fn class(&self, label: Label) -> &ClassMetrics {
        &self.per_class[&label]
    }

    /// Format as human-readable string
    pub fn format(&self) -> String {
        let cm = &self.confusion_matrix;
        let mut output = format!(
            "Accuracy:          {:.4} ({} instances)\n",
            cm.accuracy(),
            cm.total()
        );
        for metric in Metric::ALL {
            output.push_str(&format!("{:<20} {:.4}\n", format!("{}:", metric), self.value(metric)));
        }
        output.push_str(&format!(
            "\nConfusion Matrix:\n                 Predicted\n                 Ham      Spam\nActual Ham   {:>6}    {:>6}\n       Spam  {:>6}    {:>6}\n",
            cm.tn, cm.fp, cm.fn_, cm.tp
        ));
        output
    }
}

/// Sort scored instances by descending score and group equal scores
fn ranked_groups(scored: &[(bool, f64)]) -> Vec<(f64, f64)> {
    let mut pairs = scored.to_vec();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    // (positives, negatives) per distinct threshold
    let mut groups: Vec<(f64, f64)> = Vec::new();
    let mut last: Option<f64> = None;
    for (positive, score) in pairs {
        if last != Some(score) {
            groups.push((0.0, 0.0));
            last = Some(score);
        }
        if let Some(group) = groups.last_mut() {
            if positive {
                group.0 += 1.0;
            } else {
                group.1 += 1.0;
            }
        }
    }
    groups
}

/// Area under the ROC curve using the trapezoidal rule, ties as one step
fn area_under_roc(scored: &[(bool, f64)]) -> f64 {
    let n_pos = scored.iter().filter(|(p, _)| *p).count() as f64;
    let n_neg = scored.len() as f64 - n_pos;

    if n_pos == 0.0 || n_neg == 0.0 {
        return 0.5; // undefined, report chance level
    }

    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut auc = 0.0;

    for (pos, neg) in ranked_groups(scored) {
        let tpr_prev = tp / n_pos;
        let fpr_prev = fp / n_neg;
        tp += pos;
        fp += neg;
        auc += (fp / n_neg - fpr_prev) * (tp / n_pos + tpr_prev) / 2.0;
    }

    auc
}

/// Area under the precision-recall curve (average precision), ties as one step
fn area_under_prc(scored: &[(bool, f64)]) -> f64 {
    let n_pos = scored.iter().filter(|(p, _)| *p).count() as f64;

    if n_pos == 0.0 {
        return 0.0;
    }

    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut ap = 0.0;

    for (pos, neg) in ranked_groups(scored) {
        tp += pos;
        fp += neg;
        if pos > 0.0 {
            ap += (tp / (tp + fp)) * (pos / n_pos);
        }
    }

    ap
}
