// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Seeded train/test partitioning
//!
//! The source dataset is never reordered; each call shuffles a private copy,
//! so a run's split depends only on the generator it is given.

use crate::datasets::{Dataset, Instance};
use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Training prefix and testing suffix of one shuffled dataset
#[derive(Debug, Clone)]
pub struct Partition {
    pub training: Dataset,
    pub testing: Dataset,
}

/// Splits datasets at a fixed training fraction
#[derive(Debug, Clone, Copy)]
pub struct DatasetPartitioner {
    train_fraction: f64,
}

impl DatasetPartitioner {
    /// `train_fraction` must lie strictly between 0 and 1
    pub fn new(train_fraction: f64) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            bail!("Training fraction must be in (0, 1), got {}", train_fraction);
        }
        Ok(Self { train_fraction })
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Number of training instances for a dataset of `total` instances
    pub fn training_size(&self, total: usize) -> usize {
        ((total as f64) * self.train_fraction).round() as usize
    }

    /// Shuffle a copy of `dataset` with `rng` and cut it into training and testing sets
    pub fn partition<R: Rng + ?Sized>(&self, dataset: &Dataset, rng: &mut R) -> Result<Partition> {
        let mut shuffled: Vec<Instance> = dataset.instances().to_vec();
        shuffled.shuffle(rng);

        let testing_instances = shuffled.split_off(self.training_size(shuffled.len()));
        let training = Dataset::from_instances(dataset.name(), dataset.feature_count(), shuffled)?;
        let testing = Dataset::from_instances(dataset.name(), dataset.feature_count(), testing_instances)?;

        Ok(Partition { training, testing })
    }

    /// Append a fixed supplement (e.g. empty patterns) to a testing set
    pub fn append_supplement(testing: &mut Dataset, supplement: &Dataset) -> Result<()> {
        for instance in supplement.instances() {
            testing.push(instance.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Label;
    use crate::random::SeededRandomSource;

    fn numbered_dataset(size: usize) -> Dataset {
        let instances = (0..size)
            .map(|i| {
                let label = if i % 2 == 0 { Label::Ham } else { Label::Spam };
                Instance::new(vec![i as f64, 1.0], label)
            })
            .collect();
        Dataset::from_instances("numbered", 2, instances).unwrap()
    }

    fn ids(dataset: &Dataset) -> Vec<usize> {
        dataset.instances().iter().map(|i| i.features[0] as usize).collect()
    }

    #[test]
    fn test_rejects_fraction_outside_open_interval() {
        assert!(DatasetPartitioner::new(0.0).is_err());
        assert!(DatasetPartitioner::new(1.0).is_err());
        assert!(DatasetPartitioner::new(f64::NAN).is_err());
        assert!(DatasetPartitioner::new(0.66).is_ok());
    }

    #[test]
    fn test_half_split_of_ten_for_every_seed() {
        let dataset = numbered_dataset(10);
        let partitioner = DatasetPartitioner::new(0.5).unwrap();
        let mut source = SeededRandomSource::new();

        for _ in 0..20 {
            let mut rng = source.next();
            let partition = partitioner.partition(&dataset, &mut rng).unwrap();
            assert_eq!(partition.training.len(), 5);
            assert_eq!(partition.testing.len(), 5);
        }
    }

    #[test]
    fn test_partitions_are_disjoint_and_exhaustive() {
        let partitioner = DatasetPartitioner::new(0.3).unwrap();
        let mut source = SeededRandomSource::new();

        for size in [1usize, 2, 7, 33, 100] {
            let dataset = numbered_dataset(size);
            let partition = partitioner.partition(&dataset, &mut source.next()).unwrap();

            assert_eq!(partition.training.len(), ((size as f64) * 0.3).round() as usize);
            assert_eq!(partition.testing.len(), size - partition.training.len());

            let mut all: Vec<usize> = ids(&partition.training);
            all.extend(ids(&partition.testing));
            all.sort_unstable();
            assert_eq!(all, (0..size).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_source_is_not_reordered() {
        let dataset = numbered_dataset(12);
        let before = dataset.clone();
        let partitioner = DatasetPartitioner::new(0.5).unwrap();

        partitioner.partition(&dataset, &mut SeededRandomSource::new().next()).unwrap();
        assert_eq!(dataset, before);
    }

    #[test]
    fn test_same_seed_same_split() {
        let dataset = numbered_dataset(50);
        let partitioner = DatasetPartitioner::new(0.5).unwrap();

        let a = partitioner.partition(&dataset, &mut SeededRandomSource::new().next()).unwrap();
        let b = partitioner.partition(&dataset, &mut SeededRandomSource::new().next()).unwrap();
        assert_eq!(ids(&a.training), ids(&b.training));
        assert_eq!(ids(&a.testing), ids(&b.testing));
    }

    #[test]
    fn test_supplement_goes_to_testing_only() {
        let dataset = numbered_dataset(10);
        let partitioner = DatasetPartitioner::new(0.5).unwrap();
        let mut partition = partitioner.partition(&dataset, &mut SeededRandomSource::new().next()).unwrap();

        let empty = Dataset::create_empty_patterns(2, 3, 1);
        DatasetPartitioner::append_supplement(&mut partition.testing, &empty).unwrap();

        assert_eq!(partition.training.len(), 5);
        assert_eq!(partition.testing.len(), 9);
        assert!(partition.testing.instances()[5..].iter().all(|i| i.features == vec![0.0, 0.0]));
    }
}
