// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Single split runner
//!
//! Loads one data set folder, splits it once and trains and evaluates each
//! method for a quick look at the data.

use anyhow::Result;
use clap::Parser;
use spam_eval::classifiers::Method;
use spam_eval::datasets::{DataSetMetadata, Dataset};
use spam_eval::evaluation::MethodEvaluation;
use spam_eval::partition::DatasetPartitioner;
use spam_eval::random::SeededRandomSource;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "single-run")]
#[command(about = "Train and evaluate methods on one split of a data set folder")]
#[command(version)]
struct Args {
    /// Data set folder holding ham/spam class files or data.arff
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Method to run (default: all)
    #[arg(short, long, value_enum)]
    method: Option<Method>,

    /// Fraction of the data set used for training
    #[arg(short, long, default_value_t = 0.5)]
    split: f64,

    /// Number of seeds to skip before splitting
    #[arg(long, default_value_t = 0)]
    skip_seeds: usize,

    /// List available methods
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        println!("Available methods:");
        println!("------------------");
        for method in Method::ALL {
            println!("  {}: {}", method.name(), method.description());
        }
        return Ok(());
    }

    let Some(folder) = args.folder else {
        anyhow::bail!("--folder is required unless --list is given");
    };

    let data = Dataset::load_folder(&folder)?;
    let partitioner = DatasetPartitioner::new(args.split)?;
    let mut seeds = SeededRandomSource::new();
    for _ in 0..args.skip_seeds {
        seeds.next();
    }
    let mut rng = seeds.next();
    let partition = partitioner.partition(&data.dataset, &mut rng)?;

    println!("\nData set: {}", folder.display());
    println!("  Features: {} of {}", data.dataset.feature_count(), data.total_features);
    println!("  Seed: {}", seeds.current_seed());
    println!("  Train instances: {}", partition.training.len());
    println!("  Test instances: {}", partition.testing.len());

    for (name, set) in [("Train", &partition.training), ("Test", &partition.testing)] {
        println!("\n{} distribution:", name);
        for (label, count) in Dataset::label_distribution(set.instances()) {
            println!("  {}: {} ({:.1}%)", label.as_str(), count, count as f64 / set.len() as f64 * 100.0);
        }
    }

    println!("\n{}", "=".repeat(70));
    println!("SINGLE RUN EVALUATION");
    println!("{}", "=".repeat(70));

    let metadata = DataSetMetadata::new(&folder, 0, 0);
    let methods = match args.method {
        Some(method) => vec![method],
        None => Method::ALL.to_vec(),
    };

    for method in methods {
        println!("\n## {} ##", method.name());
        println!("{}", method.description());
        println!("{}", "-".repeat(50));

        let mut evaluation = MethodEvaluation::new(
            method,
            method.build_classifier(),
            metadata.clone(),
            data.total_features,
            data.dataset.feature_count(),
        );
        evaluation.train(&partition.training);
        let metrics = evaluation.test(&partition.testing);

        println!("{}", metrics.format());
    }

    println!("\n{}", "=".repeat(70));
    println!("Evaluation complete!");

    Ok(())
}
