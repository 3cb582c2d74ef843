//! # BeanLeaf
//!
//! Two-phase transfer-learning trainer for bean leaf disease
//! classification, built on the Burn framework.
//!
//! A run loads a labeled dataset, carves deterministic stratified
//! train/validation/test splits, fits a classification head on a frozen
//! backbone, optionally unfreezes the backbone tail for fine-tuning,
//! evaluates on the held-out test split, and exports a full-precision
//! and a compact half-precision artifact.
//!
//! ## Modules
//!
//! - `config`: run configuration, backbone and optimizer families
//! - `dataset`: example providers and stratified splitting
//! - `pipeline`: decode/augment/batch pipelines with prefetch
//! - `model`: backbone stages, classifier, assembly and unfreezing
//! - `training`: the orchestrator, optimizers, and artifact export
//! - `tracking`: experiment sinks
//! - `api`: untyped request/response mapping
//! - `utils`: errors, logging, metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use beanleaf::config::TrainingConfiguration;
//! use beanleaf::training::Trainer;
//! use beanleaf::backend::{default_device, TrainingBackend};
//!
//! let config = TrainingConfiguration::default();
//! let trainer = Trainer::<TrainingBackend>::new(config, default_device())?;
//! let result = trainer.run()?;
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod dataset;
pub mod model;
pub mod pipeline;
pub mod tracking;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{
    BackboneChoice, DatasetSourceChoice, OptimizerChoice, TrainingConfiguration, CLASS_NAMES,
    IMAGE_SIZE, NUM_CLASSES,
};
pub use dataset::{DatasetLoader, DatasetSplits, SplitSequence};
pub use model::{BeanClassifier, ModelAssembler};
pub use pipeline::{BeanBatch, BeanBatcher, BeanItem, Pipeline, PipelineBuilder};
pub use tracking::{ExperimentSink, JsonlSink, TrackedTrainer};
pub use training::{Phase, Trainer, TrainingResult};
pub use utils::error::{BeanLeafError, Result};
pub use utils::metrics::Metrics;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
