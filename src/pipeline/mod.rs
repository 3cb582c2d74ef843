//! Input pipeline
//!
//! Decoded examples are cached once per split, then each epoch draws a
//! (seeded) shuffle, applies augmentation where configured, normalizes,
//! and yields fixed-size batches with the final partial batch included.
//! Batch assembly runs on a background thread with bounded prefetch;
//! tensor creation stays on the caller's thread.

pub mod transform;

use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::{TrainingConfiguration, IMAGE_SIZE};
use crate::dataset::loader::{DatasetSplits, SplitSequence};
use crate::model::ModelAssembler;
use crate::pipeline::transform::{Augmenter, Preprocessor};
use crate::utils::error::Result;

/// Batches kept in flight ahead of the consumer
const PREFETCH_DEPTH: usize = 2;

/// One decoded example, unit-range CHW
#[derive(Debug, Clone)]
pub struct BeanItem {
    pub image: Vec<f32>,
    pub label: usize,
}

/// A batch of examples on the target device
#[derive(Debug, Clone)]
pub struct BeanBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Assembles `BeanItem`s into device tensors
#[derive(Debug, Clone)]
pub struct BeanBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> BeanBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<BeanItem, BeanBatch<B>> for BeanBatcher<B> {
    fn batch(&self, items: Vec<BeanItem>) -> BeanBatch<B> {
        let batch_size = items.len();

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, IMAGE_SIZE, IMAGE_SIZE]),
            &self.device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        BeanBatch { images, targets }
    }
}

/// A ready-to-iterate split: cached decodes plus per-epoch policy
#[derive(Debug, Clone)]
pub struct Pipeline {
    items: Arc<Vec<BeanItem>>,
    name: &'static str,
    batch_size: usize,
    shuffle: bool,
    augmenter: Option<Augmenter>,
    preprocessor: Preprocessor,
    seed: u64,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Batches per epoch; the final partial batch counts
    pub fn num_batches(&self) -> usize {
        self.items.len().div_ceil(self.batch_size)
    }

    /// Begin one epoch of batch assembly on a background thread.
    ///
    /// The same `(seed, epoch)` pair always yields the same order and
    /// augmentations.
    pub fn epoch(&self, epoch: usize) -> EpochBatches {
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        let epoch_seed = self
            .seed
            .wrapping_add((epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(epoch_seed);
            order.shuffle(&mut rng);
        }

        let items = Arc::clone(&self.items);
        let batch_size = self.batch_size;
        let augmenter = self.augmenter;
        let preprocessor = self.preprocessor;
        let (tx, rx) = sync_channel::<Vec<BeanItem>>(PREFETCH_DEPTH);

        debug!("{} epoch {}: {} batches", self.name, epoch, self.num_batches());

        thread::spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(epoch_seed.wrapping_add(1));
            for chunk in order.chunks(batch_size) {
                let mut batch = Vec::with_capacity(chunk.len());
                for &idx in chunk {
                    let mut item = items[idx].clone();
                    if let Some(augmenter) = &augmenter {
                        augmenter.apply(&mut item.image, &mut rng);
                    }
                    preprocessor.finish(&mut item.image);
                    batch.push(item);
                }
                // Consumer gone, stop assembling
                if tx.send(batch).is_err() {
                    return;
                }
            }
        });

        EpochBatches { receiver: rx }
    }
}

/// Iterator over one epoch's assembled batches
pub struct EpochBatches {
    receiver: Receiver<Vec<BeanItem>>,
}

impl Iterator for EpochBatches {
    type Item = Vec<BeanItem>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

/// Builds pipelines for the three splits from one configuration
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    batch_size: usize,
    seed: u64,
    preprocessor: Preprocessor,
    augmenter: Option<Augmenter>,
}

impl PipelineBuilder {
    pub fn new(config: &TrainingConfiguration) -> Self {
        let (preprocessor, augmenter) = ModelAssembler::build_preprocessing(config);
        Self {
            batch_size: config.batch_size,
            seed: config.random_seed,
            preprocessor,
            augmenter,
        }
    }

    fn decode_all(&self, split: &SplitSequence) -> Result<Vec<BeanItem>> {
        split
            .iter()
            .map(|record| {
                Ok(BeanItem {
                    image: Preprocessor::decode_unit(&record.source)?,
                    label: record.label,
                })
            })
            .collect()
    }

    /// Training pipeline: shuffled per epoch, augmented unless the
    /// model graph carries preprocessing
    pub fn build_train(&self, split: &SplitSequence) -> Result<Pipeline> {
        Ok(Pipeline {
            items: Arc::new(self.decode_all(split)?),
            name: split.name,
            batch_size: self.batch_size,
            shuffle: true,
            augmenter: self.augmenter,
            preprocessor: self.preprocessor,
            seed: self.seed,
        })
    }

    /// Evaluation pipeline: fixed order, no augmentation
    pub fn build_eval(&self, split: &SplitSequence) -> Result<Pipeline> {
        Ok(Pipeline {
            items: Arc::new(self.decode_all(split)?),
            name: split.name,
            batch_size: self.batch_size,
            shuffle: false,
            augmenter: None,
            preprocessor: self.preprocessor,
            seed: self.seed,
        })
    }

    /// All three pipelines for one set of splits
    pub fn build(&self, splits: &DatasetSplits) -> Result<(Pipeline, Pipeline, Pipeline)> {
        Ok((
            self.build_train(&splits.train)?,
            self.build_eval(&splits.validation)?,
            self.build_eval(&splits.test)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetSourceChoice;
    use crate::dataset::DatasetLoader;

    fn smoke_splits() -> crate::dataset::DatasetSplits {
        let config = TrainingConfiguration {
            dataset_source: DatasetSourceChoice::Synthetic {
                examples_per_class: 16,
            },
            train_size: 32,
            val_size: 8,
            test_size: 8,
            ..Default::default()
        };
        DatasetLoader::load(&config).unwrap()
    }

    fn builder() -> PipelineBuilder {
        PipelineBuilder::new(&TrainingConfiguration {
            batch_size: 16,
            ..Default::default()
        })
    }

    #[test]
    fn test_partial_final_batch_is_included() {
        let splits = smoke_splits();
        let pipeline = builder().build_eval(&splits.validation).unwrap();

        // 8 examples, batch 16: a single partial batch
        assert_eq!(pipeline.num_batches(), 1);
        let batches: Vec<_> = pipeline.epoch(0).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 8);
    }

    #[test]
    fn test_train_epochs_reshuffle_deterministically() {
        let splits = smoke_splits();
        let pipeline = builder().build_train(&splits.train).unwrap();

        let labels = |epoch: usize| -> Vec<usize> {
            pipeline
                .epoch(epoch)
                .flat_map(|batch| batch.into_iter().map(|item| item.label))
                .collect()
        };

        let first = labels(0);
        assert_eq!(first, labels(0), "same epoch must replay identically");
        assert_ne!(first, labels(1), "different epochs should reshuffle");
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn test_eval_order_is_stable() {
        let splits = smoke_splits();
        let pipeline = builder().build_eval(&splits.test).unwrap();

        let a: Vec<usize> = pipeline
            .epoch(0)
            .flat_map(|b| b.into_iter().map(|i| i.label))
            .collect();
        let b: Vec<usize> = pipeline
            .epoch(5)
            .flat_map(|b| b.into_iter().map(|i| i.label))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_in_model_preprocessing_keeps_unit_range() {
        let splits = smoke_splits();
        let mut config = TrainingConfiguration::default();
        config.preprocess_in_model = true;
        let pipeline = PipelineBuilder::new(&config)
            .build_train(&splits.train)
            .unwrap();

        for batch in pipeline.epoch(0) {
            for item in batch {
                assert!(item.image.iter().all(|&v| (0.0..=1.0).contains(&v)));
            }
        }
    }

    #[test]
    fn test_batcher_shapes() {
        use crate::backend::DefaultBackend;

        let device = crate::backend::default_device();
        let batcher = BeanBatcher::<DefaultBackend>::new(device);
        let items = vec![
            BeanItem {
                image: vec![0.1; 3 * IMAGE_SIZE * IMAGE_SIZE],
                label: 0,
            },
            BeanItem {
                image: vec![0.2; 3 * IMAGE_SIZE * IMAGE_SIZE],
                label: 2,
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [2, 3, IMAGE_SIZE, IMAGE_SIZE]);
        assert_eq!(batch.targets.dims(), [2]);
    }
}
