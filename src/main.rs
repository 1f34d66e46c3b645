// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Experiment CLI for spam classifiers
//!
//! Usage:
//!   spam-eval --metadata sets.csv --methods naive-bayes,logistic --runs 10
//!   spam-eval --metadata sets.csv --remove-outliers --include-empty --log-dir logs

use anyhow::Result;
use clap::Parser;
use spam_eval::classifiers::Method;
use spam_eval::config::ExperimentConfig;
use spam_eval::logging;
use spam_eval::outliers::DEFAULT_THRESHOLD;
use spam_eval::runner::ExperimentRunner;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "spam-eval")]
#[command(about = "Evaluate spam classifiers over repeated random splits")]
#[command(version)]
struct Args {
    /// File listing data set folders (folder,empty_ham,empty_spam per line)
    #[arg(short, long)]
    metadata: PathBuf,

    /// Methods to evaluate (comma-separated, default: all)
    #[arg(long, value_enum, value_delimiter = ',')]
    methods: Vec<Method>,

    /// Runs per method and data set
    #[arg(short, long, default_value_t = 10)]
    runs: usize,

    /// Fraction of each data set used for training
    #[arg(short, long, default_value_t = 0.5)]
    split: f64,

    /// Load saved models instead of training
    #[arg(long)]
    skip_train: bool,

    /// Train only, without evaluation
    #[arg(long)]
    skip_test: bool,

    /// Add the empty patterns listed in the metadata file to every testing set
    #[arg(long)]
    include_empty: bool,

    /// Replace outlier runs with fresh runs
    #[arg(long)]
    remove_outliers: bool,

    /// Standard deviations from the mean that mark an outlier
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    outlier_threshold: f64,

    /// Save the model of every run next to its data set
    #[arg(long)]
    save_model: bool,

    /// Save the training and testing sets of every run as CSV
    #[arg(long)]
    save_sets: bool,

    /// Cache each loaded data set as ARFF
    #[arg(long)]
    save_arff: bool,

    /// Print train and test times in milliseconds instead of HH:MM:SS.mmm
    #[arg(long)]
    raw_durations: bool,

    /// Directory for verbose.log
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> ExperimentConfig {
        let methods = if self.methods.is_empty() {
            Method::ALL.to_vec()
        } else {
            self.methods
        };

        ExperimentConfig {
            metadata_path: self.metadata,
            methods,
            runs: self.runs,
            train_fraction: self.split,
            skip_train: self.skip_train,
            skip_test: self.skip_test,
            include_empty: self.include_empty,
            remove_outliers: self.remove_outliers,
            outlier_threshold: self.outlier_threshold,
            save_model: self.save_model,
            save_sets: self.save_sets,
            save_arff: self.save_arff,
            format_durations: !self.raw_durations,
        }
    }
}

fn run(config: ExperimentConfig) -> Result<()> {
    tracing::info!("Spam Classifier Evaluation");
    tracing::info!("==========================");
    tracing::info!("Configuration:\n{}", config.to_json()?);

    let stdout = std::io::stdout();
    let mut runner = ExperimentRunner::new(config, stdout.lock())?;
    runner.run()?;

    tracing::info!("Evaluation complete!");
    Ok(())
}

fn main() -> ExitCode {
    let mut args = Args::parse();

    let _guard = match logging::init(args.log_dir.take().as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(args.into_config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
