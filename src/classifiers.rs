// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classification methods evaluated by the harness
//!
//! Implements:
//! - Random baseline (seeded uniform scores)
//! - Majority class baseline
//! - Gaussian naive Bayes
//! - Logistic regression trained by batch gradient descent
//! - Nearest centroid
//!
//! Trained models persist as JSON, tagged with the method that produced them.

use crate::datasets::{Dataset, Instance, Label};
use anyhow::{bail, Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Seed of the random baseline's score stream
const RANDOM_BASELINE_SEED: u64 = 1;

/// Prediction output from a classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub probability: f64, // P(spam)
}

impl Prediction {
    fn from_probability(probability: f64) -> Self {
        Self {
            label: if probability > 0.5 { Label::Spam } else { Label::Ham },
            probability,
        }
    }
}

/// Trait for all classification methods
pub trait Classifier: Send + Sync {
    /// Train the model on the given instances, discarding previous state
    fn train(&mut self, instances: &[Instance]);

    /// Predict the label of one feature vector
    fn predict(&self, features: &[f64]) -> Prediction;

    /// Predict labels for multiple instances
    fn predict_batch(&self, instances: &[Instance]) -> Vec<Prediction> {
        instances.iter().map(|i| self.predict(&i.features)).collect()
    }

    /// Method that built this classifier
    fn method(&self) -> Method;

    /// Untrained-or-trained copy of this classifier
    fn box_clone(&self) -> Box<dyn Classifier>;

    /// Serialized model state
    fn to_json(&self) -> Result<serde_json::Value>;

    fn name(&self) -> &str {
        self.method().name()
    }

    fn description(&self) -> &str {
        self.method().description()
    }
}

/// Classification method selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Method {
    Random,
    Majority,
    NaiveBayes,
    Logistic,
    NearestCentroid,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Random,
        Method::Majority,
        Method::NaiveBayes,
        Method::Logistic,
        Method::NearestCentroid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::Random => "Random",
            Method::Majority => "Majority",
            Method::NaiveBayes => "NaiveBayes",
            Method::Logistic => "Logistic",
            Method::NearestCentroid => "NearestCentroid",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Method::Random => "Uniform random scores (expected AUC: 0.5)",
            Method::Majority => "Always predicts the majority class from training data",
            Method::NaiveBayes => "Gaussian naive Bayes over the raw feature values",
            Method::Logistic => "L2-regularized logistic regression on standardized features",
            Method::NearestCentroid => "Assigns the class whose mean vector is closest",
        }
    }

    /// Untrained classifier for this method
    pub fn build_classifier(&self) -> Box<dyn Classifier> {
        match self {
            Method::Random => Box::new(RandomClassifier::new(RANDOM_BASELINE_SEED)),
            Method::Majority => Box::new(MajorityClassifier::default()),
            Method::NaiveBayes => Box::new(NaiveBayesClassifier::default()),
            Method::Logistic => Box::new(LogisticClassifier::default()),
            Method::NearestCentroid => Box::new(NearestCentroidClassifier::default()),
        }
    }

    /// Path of the persisted model for one run: `<Method>_TRAIN=..._TEST=..._SEED=....model`
    pub fn model_path(&self, folder: &Path, train_fraction: f64, seed: u64) -> PathBuf {
        let train = (100.0 * train_fraction).round() as u32;
        let test = (100.0 * (1.0 - train_fraction)).round() as u32;
        folder.join(format!(
            "{}_TRAIN={}_TEST={}_SEED={}.model",
            self.name(),
            train,
            test,
            seed
        ))
    }

    /// Load a classifier persisted by [`save_classifier`]
    pub fn load_classifier(&self, path: &Path) -> Result<Box<dyn Classifier>> {
        tracing::debug!("Loading model from {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        let file: ModelFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))?;

        if file.method != *self {
            bail!(
                "Model file {} holds a {} model, expected {}",
                path.display(),
                file.method.name(),
                self.name()
            );
        }

        let classifier: Box<dyn Classifier> = match self {
            Method::Random => Box::new(serde_json::from_value::<RandomClassifier>(file.model)?),
            Method::Majority => Box::new(serde_json::from_value::<MajorityClassifier>(file.model)?),
            Method::NaiveBayes => Box::new(serde_json::from_value::<NaiveBayesClassifier>(file.model)?),
            Method::Logistic => Box::new(serde_json::from_value::<LogisticClassifier>(file.model)?),
            Method::NearestCentroid => {
                Box::new(serde_json::from_value::<NearestCentroidClassifier>(file.model)?)
            }
        };
        Ok(classifier)
    }
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    method: Method,
    model: serde_json::Value,
}

/// Persist a classifier as JSON
pub fn save_classifier(classifier: &dyn Classifier, path: &Path) -> Result<()> {
    tracing::debug!("Saving model to {}", path.display());

    let file = ModelFile {
        method: classifier.method(),
        model: classifier.to_json()?,
    };
    let json = serde_json::to_string(&file)?;
    fs::write(path, json).with_context(|| format!("Failed to write model file: {}", path.display()))?;
    Ok(())
}

/// Count of (ham, spam) instances
fn class_counts(instances: &[Instance]) -> (usize, usize) {
    let dist = Dataset::label_distribution(instances);
    (
        dist.get(&Label::Ham).copied().unwrap_or(0),
        dist.get(&Label::Spam).copied().unwrap_or(0),
    )
}

/// Random baseline: scores drawn from a fixed-seed stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomClassifier {
    seed: u64,
}

impl RandomClassifier {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Classifier for RandomClassifier {
    fn train(&mut self, _instances: &[Instance]) {}

    fn predict(&self, _features: &[f64]) -> Prediction {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Prediction::from_probability(rng.gen())
    }

    fn predict_batch(&self, instances: &[Instance]) -> Vec<Prediction> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        instances
            .iter()
            .map(|_| Prediction::from_probability(rng.gen()))
            .collect()
    }

    fn method(&self) -> Method {
        Method::Random
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Majority class baseline: always predicts the most common class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MajorityClassifier {
    spam_prob: f64,
}

impl Classifier for MajorityClassifier {
    fn train(&mut self, instances: &[Instance]) {
        let (ham, spam) = class_counts(instances);
        let total = ham + spam;
        self.spam_prob = if total == 0 { 0.0 } else { spam as f64 / total as f64 };
    }

    fn predict(&self, _features: &[f64]) -> Prediction {
        Prediction::from_probability(self.spam_prob)
    }

    fn method(&self) -> Method {
        Method::Majority
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GaussianClass {
    prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl GaussianClass {
    fn fit(rows: &[&[f64]], feature_count: usize, prior: f64) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; feature_count];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row.iter()) {
                *m += v / n;
            }
        }
        let mut variances = vec![0.0; feature_count];
        for row in rows {
            for ((var, m), v) in variances.iter_mut().zip(means.iter()).zip(row.iter()) {
                *var += (v - m).powi(2) / n;
            }
        }
        Self {
            prior,
            means,
            variances,
        }
    }

    fn log_likelihood(&self, features: &[f64], epsilon: f64) -> f64 {
        self.means
            .iter()
            .zip(self.variances.iter())
            .zip(features.iter())
            .map(|((m, var), x)| {
                let var = var + epsilon;
                -0.5 * ((2.0 * std::f64::consts::PI * var).ln() + (x - m).powi(2) / var)
            })
            .sum::<f64>()
            + self.prior.ln()
    }
}

/// Gaussian naive Bayes with variance smoothing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NaiveBayesClassifier {
    ham: GaussianClass,
    spam: GaussianClass,
    epsilon: f64,
}

impl Classifier for NaiveBayesClassifier {
    fn train(&mut self, instances: &[Instance]) {
        let feature_count = instances.first().map_or(0, |i| i.features.len());
        let (ham_count, spam_count) = class_counts(instances);
        let total = (ham_count + spam_count).max(1) as f64;

        let rows = |label: Label| {
            instances
                .iter()
                .filter(|i| i.label == label)
                .map(|i| i.features.as_slice())
                .collect::<Vec<&[f64]>>()
        };
        self.ham = GaussianClass::fit(&rows(Label::Ham), feature_count, ham_count as f64 / total);
        self.spam = GaussianClass::fit(&rows(Label::Spam), feature_count, spam_count as f64 / total);

        let max_variance = self
            .ham
            .variances
            .iter()
            .chain(self.spam.variances.iter())
            .fold(0.0f64, |acc, v| acc.max(*v));
        self.epsilon = (1e-9 * max_variance).max(1e-12);
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        let ham_score = self.ham.log_likelihood(features, self.epsilon);
        let spam_score = self.spam.log_likelihood(features, self.epsilon);

        // log scores to probability
        let probability = if spam_score == f64::NEG_INFINITY && ham_score == f64::NEG_INFINITY {
            0.5
        } else {
            let max_score = ham_score.max(spam_score);
            let ham_exp = (ham_score - max_score).exp();
            let spam_exp = (spam_score - max_score).exp();
            spam_exp / (ham_exp + spam_exp)
        };
        Prediction::from_probability(probability)
    }

    fn method(&self) -> Method {
        Method::NaiveBayes
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Logistic regression on standardized features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticClassifier {
    epochs: usize,
    learning_rate: f64,
    l2: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.5,
            l2: 1e-4,
            means: Vec::new(),
            scales: Vec::new(),
            weights: Vec::new(),
            bias: 0.0,
        }
    }
}

impl LogisticClassifier {
    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    fn score(&self, standardized: &[f64]) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(standardized.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticClassifier {
    fn train(&mut self, instances: &[Instance]) {
        let feature_count = instances.first().map_or(0, |i| i.features.len());
        let n = instances.len().max(1) as f64;

        self.means = vec![0.0; feature_count];
        for instance in instances {
            for (m, v) in self.means.iter_mut().zip(instance.features.iter()) {
                *m += v / n;
            }
        }
        let mut variances = vec![0.0; feature_count];
        for instance in instances {
            for ((var, m), v) in variances.iter_mut().zip(self.means.iter()).zip(instance.features.iter()) {
                *var += (v - m).powi(2) / n;
            }
        }
        self.scales = variances
            .into_iter()
            .map(|v| if v > 1e-12 { v.sqrt() } else { 1.0 })
            .collect();

        let rows: Vec<(Vec<f64>, f64)> = instances
            .iter()
            .map(|i| (self.standardize(&i.features), i.label.to_binary() as f64))
            .collect();

        self.weights = vec![0.0; feature_count];
        self.bias = 0.0;

        for _ in 0..self.epochs {
            let mut grad = vec![0.0; feature_count];
            let mut grad_bias = 0.0;
            for (x, y) in &rows {
                let error = self.score(x) - y;
                for (g, xi) in grad.iter_mut().zip(x.iter()) {
                    *g += error * xi / n;
                }
                grad_bias += error / n;
            }
            for (w, g) in self.weights.iter_mut().zip(grad.iter()) {
                *w -= self.learning_rate * (g + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_bias;
        }
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        Prediction::from_probability(self.score(&self.standardize(features)))
    }

    fn method(&self) -> Method {
        Method::Logistic
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Nearest centroid; the score is the relative distance to the ham centroid
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestCentroidClassifier {
    ham_centroid: Vec<f64>,
    spam_centroid: Vec<f64>,
}

fn centroid(instances: &[Instance], label: Label, feature_count: usize) -> Vec<f64> {
    let mut sum = vec![0.0; feature_count];
    let mut count = 0usize;
    for instance in instances.iter().filter(|i| i.label == label) {
        for (s, v) in sum.iter_mut().zip(instance.features.iter()) {
            *s += v;
        }
        count += 1;
    }
    if count > 0 {
        sum.iter_mut().for_each(|s| *s /= count as f64);
    }
    sum
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

impl Classifier for NearestCentroidClassifier {
    fn train(&mut self, instances: &[Instance]) {
        let feature_count = instances.first().map_or(0, |i| i.features.len());
        self.ham_centroid = centroid(instances, Label::Ham, feature_count);
        self.spam_centroid = centroid(instances, Label::Spam, feature_count);
    }

    fn predict(&self, features: &[f64]) -> Prediction {
        let to_ham = distance(features, &self.ham_centroid);
        let to_spam = distance(features, &self.spam_centroid);
        let total = to_ham + to_spam;
        let probability = if total == 0.0 { 0.5 } else { to_ham / total };
        Prediction::from_probability(probability)
    }

    fn method(&self) -> Method {
        Method::NearestCentroid
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
