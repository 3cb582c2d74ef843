//! Dataset Loader
//!
//! Turns a configured example source into three disjoint, stratified
//! split sequences (train / validation / test). Splitting is fully
//! deterministic given the configured seed: the same configuration
//! always produces the same membership.

use burn::data::dataset::Dataset;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::{TrainingConfiguration, CLASS_NAMES, NUM_CLASSES};
use crate::dataset::provider::{provider_for, ExampleRecord};
use crate::dataset::split::stratified_take;
use crate::utils::error::{BeanLeafError, Result};
use crate::utils::metrics::class_ratios;

/// One split's worth of examples, in a fixed order
#[derive(Debug, Clone)]
pub struct SplitSequence {
    pub name: &'static str,
    pub records: Vec<ExampleRecord>,
}

impl SplitSequence {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Labels of all records, in sequence order
    pub fn labels(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.label).collect()
    }
}

impl Dataset<ExampleRecord> for SplitSequence {
    fn get(&self, index: usize) -> Option<ExampleRecord> {
        self.records.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// The three disjoint splits of one dataset
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: SplitSequence,
    pub validation: SplitSequence,
    pub test: SplitSequence,
}

/// Loads examples from the configured source and carves the splits
pub struct DatasetLoader;

impl DatasetLoader {
    /// Fetch all examples and produce the three stratified splits.
    ///
    /// Train is carved first from the full set, validation from what
    /// remains, then the test split at exactly `test_size` (stratified,
    /// surplus beyond it dropped). Fails with `InsufficientData` when
    /// `train_size + val_size + test_size` exceeds what any class can
    /// supply, before any model work happens.
    pub fn load(config: &TrainingConfiguration) -> Result<DatasetSplits> {
        let provider = provider_for(&config.dataset_source, config.random_seed);
        info!("Loading dataset from {}", provider.describe());

        let records = provider.fetch()?;
        let total = records.len();

        // Per-class index pools, each shuffled by the run seed
        let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        let mut pools: Vec<Vec<usize>> = vec![Vec::new(); NUM_CLASSES];
        for (idx, record) in records.iter().enumerate() {
            pools[record.label].push(idx);
        }
        for pool in pools.iter_mut() {
            pool.shuffle(&mut rng);
        }

        let train_idx =
            stratified_take(&mut pools, config.train_size, "train", &CLASS_NAMES, &mut rng)?;
        let val_idx =
            stratified_take(&mut pools, config.val_size, "validation", &CLASS_NAMES, &mut rng)?;

        let remaining: usize = pools.iter().map(|p| p.len()).sum();
        if remaining < config.test_size {
            return Err(BeanLeafError::InsufficientData(format!(
                "test split needs {} examples but only {} remain after train and validation",
                config.test_size, remaining
            )));
        }
        if remaining > config.test_size {
            debug!(
                "Dropping {} surplus examples beyond the test split",
                remaining - config.test_size
            );
        }
        let test_idx =
            stratified_take(&mut pools, config.test_size, "test", &CLASS_NAMES, &mut rng)?;

        let pick = |name: &'static str, indices: &[usize]| SplitSequence {
            name,
            records: indices.iter().map(|&i| records[i].clone()).collect(),
        };

        let splits = DatasetSplits {
            train: pick("train", &train_idx),
            validation: pick("validation", &val_idx),
            test: pick("test", &test_idx),
        };

        info!(
            "Split {} examples into train={} val={} test={}",
            total,
            splits.train.len(),
            splits.validation.len(),
            splits.test.len()
        );
        for split in [&splits.train, &splits.validation, &splits.test] {
            let ratios = class_ratios(&split.labels(), NUM_CLASSES);
            debug!(
                "{} class ratios: {}",
                split.name,
                CLASS_NAMES
                    .iter()
                    .zip(&ratios)
                    .map(|(name, r)| format!("{}={:.2}", name, r))
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }

        Ok(splits)
    }
}
