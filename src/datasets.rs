// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset loading, merging and persistence for spam classification experiments
//!
//! A dataset folder holds one raw file per class (`ham`, `spam`) and, once
//! cached, a merged `data.arff`. Folders are listed in a metadata file along
//! with how many all-zero "empty" patterns to add to each test partition.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the merged dataset cache inside a dataset folder
pub const ARFF_FILE_NAME: &str = "data.arff";

/// Binary label for message classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    /// Legitimate message
    Ham,
    /// Unsolicited message
    Spam,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Ham, Label::Spam];

    /// Convert to numeric value for metrics calculation (1 = spam)
    pub fn to_binary(&self) -> u8 {
        match self {
            Label::Ham => 0,
            Label::Spam => 1,
        }
    }

    /// Create from binary prediction (1 = spam, anything else = ham)
    pub fn from_binary(value: u8) -> Self {
        if value == 1 {
            Label::Spam
        } else {
            Label::Ham
        }
    }

    /// Class name as written to saved sets
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ham => "HAM",
            Label::Spam => "SPAM",
        }
    }

    /// Name of the raw class file inside a dataset folder
    pub fn file_name(&self) -> &'static str {
        match self {
            Label::Ham => "ham",
            Label::Spam => "spam",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HAM" => Some(Label::Ham),
            "SPAM" => Some(Label::Spam),
            _ => None,
        }
    }
}

/// A single labeled feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub features: Vec<f64>,
    pub label: Label,
}

impl Instance {
    pub fn new(features: Vec<f64>, label: Label) -> Self {
        Self { features, label }
    }
}

/// Ordered collection of instances sharing one feature-vector length
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    feature_count: usize,
    instances: Vec<Instance>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, feature_count: usize) -> Self {
        Self {
            name: name.into(),
            feature_count,
            instances: Vec::new(),
        }
    }

    /// Build a dataset, rejecting instances whose length differs from `feature_count`
    pub fn from_instances(
        name: impl Into<String>,
        feature_count: usize,
        instances: Vec<Instance>,
    ) -> Result<Self> {
        let mut dataset = Self::new(name, feature_count);
        dataset.instances.reserve(instances.len());
        for instance in instances {
            dataset.push(instance)?;
        }
        Ok(dataset)
    }

    pub fn push(&mut self, instance: Instance) -> Result<()> {
        if instance.features.len() != self.feature_count {
            bail!(
                "Instance with {} features does not fit dataset '{}' with {} features",
                instance.features.len(),
                self.name,
                self.feature_count
            );
        }
        self.instances.push(instance);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Concatenate two datasets, `a` first
    pub fn merge(a: &Dataset, b: &Dataset) -> Result<Dataset> {
        if a.feature_count != b.feature_count {
            bail!(
                "Cannot merge '{}' ({} features) with '{}' ({} features)",
                a.name,
                a.feature_count,
                b.name,
                b.feature_count
            );
        }
        let mut instances = Vec::with_capacity(a.len() + b.len());
        instances.extend_from_slice(&a.instances);
        instances.extend_from_slice(&b.instances);
        Ok(Dataset {
            name: a.name.clone(),
            feature_count: a.feature_count,
            instances,
        })
    }

    /// All-zero patterns, `ham_count` of class HAM followed by `spam_count` of class SPAM
    pub fn create_empty_patterns(feature_count: usize, ham_count: usize, spam_count: usize) -> Dataset {
        tracing::debug!(
            "Creating empty data set with {} features ({} ham, {} spam)",
            feature_count,
            ham_count,
            spam_count
        );
        let instances = std::iter::repeat(Label::Ham)
            .take(ham_count)
            .chain(std::iter::repeat(Label::Spam).take(spam_count))
            .map(|label| Instance::new(vec![0.0; feature_count], label))
            .collect();

        Dataset {
            name: "empty".to_string(),
            feature_count,
            instances,
        }
    }

    /// Truncate the larger class so both hold the same number of instances
    pub fn match_cardinalities(ham: &mut Dataset, spam: &mut Dataset) {
        let size = ham.len().min(spam.len());
        if ham.len() != spam.len() {
            tracing::debug!(
                "Matching class cardinalities: ham {} -> {}, spam {} -> {}",
                ham.len(),
                size,
                spam.len(),
                size
            );
        }
        ham.instances.truncate(size);
        spam.instances.truncate(size);
    }

    /// Load one class from a raw binary file
    ///
    /// Layout: big-endian `i32` instance count, big-endian `i32` feature count,
    /// then the feature values as big-endian `f64`, one instance after another.
    pub fn load_raw_class_file(path: &Path, label: Label) -> Result<Dataset> {
        tracing::debug!("Reading {} data from {}", label.file_name(), path.display());

        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read raw data file: {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("Raw data file {} is truncated: missing header", path.display());
        }

        let declared = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let feature_count = i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if declared < 0 || feature_count <= 0 {
            bail!(
                "Raw data file {} has an invalid header ({} instances, {} features)",
                path.display(),
                declared,
                feature_count
            );
        }
        let feature_count = feature_count as usize;

        let payload = &bytes[8..];
        let row_len = feature_count * 8;
        if payload.len() % row_len != 0 {
            bail!(
                "Raw data file {} holds {} payload bytes, not a multiple of {} features",
                path.display(),
                payload.len(),
                feature_count
            );
        }

        let instances: Vec<Instance> = payload
            .chunks_exact(row_len)
            .map(|row| {
                let features = row
                    .chunks_exact(8)
                    .map(|value| {
                        let mut buf = [0u8; 8];
                        buf.copy_from_slice(value);
                        f64::from_be_bytes(buf)
                    })
                    .collect();
                Instance::new(features, label)
            })
            .collect();

        if instances.len() != declared as usize {
            tracing::warn!(
                "{} declares {} instances but holds {}",
                path.display(),
                declared,
                instances.len()
            );
        }

        Ok(Dataset {
            name: label.file_name().to_string(),
            feature_count,
            instances,
        })
    }

    /// Load the dataset of one folder
    ///
    /// A cached `data.arff` wins over the raw class files. Raw classes are
    /// balanced by truncation and merged ham first.
    pub fn load_folder(folder: &Path) -> Result<FolderData> {
        let arff_path = folder.join(ARFF_FILE_NAME);
        if arff_path.exists() {
            let dataset = Self::load_arff(&arff_path)?;
            let total_features = folder
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<usize>().ok())
                .unwrap_or(dataset.feature_count());
            return Ok(FolderData {
                dataset,
                total_features,
            });
        }

        let mut ham = Self::load_raw_class_file(&folder.join(Label::Ham.file_name()), Label::Ham)?;
        let mut spam = Self::load_raw_class_file(&folder.join(Label::Spam.file_name()), Label::Spam)?;
        Self::match_cardinalities(&mut ham, &mut spam);

        let mut dataset = Self::merge(&ham, &spam)
            .with_context(|| format!("Failed to merge class files in {}", folder.display()))?;
        dataset.name = folder.display().to_string();
        let total_features = dataset.feature_count();

        Ok(FolderData {
            dataset,
            total_features,
        })
    }

    /// Save as CSV with header `x0,...,x{n-1},class`
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        tracing::debug!("Saving data set to {}", path.display());

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

        let mut header: Vec<String> = (0..self.feature_count).map(|i| format!("x{}", i)).collect();
        header.push("class".to_string());
        writer.write_record(&header)?;

        for instance in &self.instances {
            let mut record: Vec<String> = instance.features.iter().map(|v| v.to_string()).collect();
            record.push(instance.label.as_str().to_string());
            writer.write_record(&record)?;
        }

        writer
            .flush()
            .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        Ok(())
    }

    /// Save in ARFF format with numeric attributes `x0..` and a nominal class
    pub fn save_arff(&self, path: &Path) -> Result<()> {
        tracing::debug!("Saving data set to {}", path.display());

        let file = File::create(path)
            .with_context(|| format!("Failed to create ARFF file: {}", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "@relation '{}'", self.name.replace('\'', "_"))?;
        writeln!(out)?;
        for i in 0..self.feature_count {
            writeln!(out, "@attribute x{} numeric", i)?;
        }
        writeln!(out, "@attribute class {{HAM,SPAM}}")?;
        writeln!(out)?;
        writeln!(out, "@data")?;

        for instance in &self.instances {
            for value in &instance.features {
                write!(out, "{},", value)?;
            }
            writeln!(out, "{}", instance.label.as_str())?;
        }

        out.flush()
            .with_context(|| format!("Failed to write ARFF file: {}", path.display()))?;
        Ok(())
    }

    /// Load a file written by [`save_arff`](Self::save_arff)
    pub fn load_arff(path: &Path) -> Result<Dataset> {
        tracing::debug!("Reading data set from {}", path.display());

        let file = File::open(path)
            .with_context(|| format!("Failed to open ARFF file: {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut name = path.display().to_string();
        let mut attributes = 0usize;
        let mut in_data = false;
        let mut instances = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {} in {}", idx + 1, path.display()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }

            if !in_data {
                let lower = line.to_ascii_lowercase();
                if lower.starts_with("@relation") {
                    name = line["@relation".len()..].trim().trim_matches('\'').to_string();
                } else if lower.starts_with("@attribute") {
                    attributes += 1;
                } else if lower.starts_with("@data") {
                    in_data = true;
                }
                continue;
            }

            if attributes < 2 {
                bail!("ARFF file {} declares no feature attributes", path.display());
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != attributes {
                bail!(
                    "Malformed row at line {} in {}: expected {} fields, found {}",
                    idx + 1,
                    path.display(),
                    attributes,
                    fields.len()
                );
            }
            let (class, values) = (fields[fields.len() - 1], &fields[..fields.len() - 1]);
            let label = Label::parse(class).with_context(|| {
                format!("Unknown class '{}' at line {} in {}", class, idx + 1, path.display())
            })?;
            let features = values
                .iter()
                .map(|v| v.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Invalid numeric value at line {} in {}", idx + 1, path.display()))?;
            instances.push(Instance::new(features, label));
        }

        if attributes < 2 {
            bail!("ARFF file {} declares no feature attributes", path.display());
        }
        Self::from_instances(name, attributes - 1, instances)
    }

    /// Get label distribution for a slice of instances
    pub fn label_distribution(instances: &[Instance]) -> HashMap<Label, usize> {
        let mut dist = HashMap::new();
        for instance in instances {
            *dist.entry(instance.label).or_insert(0) += 1;
        }
        dist
    }
}

/// A loaded folder together with its original feature count
#[derive(Debug, Clone)]
pub struct FolderData {
    pub dataset: Dataset,
    pub total_features: usize,
}

/// One line of the metadata file: a dataset folder and its empty-pattern counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetMetadata {
    pub folder: PathBuf,
    pub empty_ham_count: usize,
    pub empty_spam_count: usize,
}

impl DataSetMetadata {
    pub fn new(folder: impl Into<PathBuf>, empty_ham_count: usize, empty_spam_count: usize) -> Self {
        Self {
            folder: folder.into(),
            empty_ham_count,
            empty_spam_count,
        }
    }

    /// Identifier printed in the dataset column of summary lines
    pub fn identifier(&self) -> String {
        self.folder.display().to_string()
    }

    /// Name of the statistics method directory (`<base>/<dataset>/<method>/<features>`)
    pub fn stat_method(&self) -> String {
        self.folder
            .parent()
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Read dataset descriptors (`folder,empty_ham,empty_spam`), skipping blanks and `#` comments
pub fn load_metadata(path: &Path) -> Result<Vec<DataSetMetadata>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open metadata file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());

    let mut metadata: Vec<DataSetMetadata> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} in {}", idx + 1, path.display()))?;
        let entry = parse_metadata_line(&line, home.as_deref())
            .with_context(|| format!("Malformed metadata at line {} in {}", idx + 1, path.display()))?;

        if let Some(entry) = entry {
            if metadata.contains(&entry) {
                tracing::warn!("Skipping duplicate data set {}", entry.folder.display());
                continue;
            }
            metadata.push(entry);
        }
    }

    Ok(metadata)
}

fn parse_metadata_line(line: &str, home: Option<&Path>) -> Result<Option<DataSetMetadata>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        bail!("expected 'folder,empty_ham,empty_spam', found {} fields", parts.len());
    }

    let folder = match (parts[0].strip_prefix('~'), home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        (Some(_), None) => bail!("cannot expand '~': no home directory"),
        (None, _) => PathBuf::from(parts[0]),
    };
    let empty_ham_count = parts[1]
        .parse()
        .with_context(|| format!("invalid empty ham count '{}'", parts[1]))?;
    let empty_spam_count = parts[2]
        .parse()
        .with_context(|| format!("invalid empty spam count '{}'", parts[2]))?;

    Ok(Some(DataSetMetadata {
        folder,
        empty_ham_count,
        empty_spam_count,
    }))
}
