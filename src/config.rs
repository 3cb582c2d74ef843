//! Training Configuration Module
//!
//! Defines the full configuration surface for a training run: dataset
//! source and split sizes, backbone and optimizer families, two-phase
//! epoch counts and learning rates, and run identification.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::error::{BeanLeafError, Result};

/// Number of disease classes
pub const NUM_CLASSES: usize = 3;

/// Input image side length (square)
pub const IMAGE_SIZE: usize = 224;

/// Class names, index order fixed
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["angular_leaf_spot", "bean_rust", "healthy"];

/// Supported backbone families
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackboneChoice {
    Xception,
    EfficientNetV2,
    MobileNet,
}

impl Default for BackboneChoice {
    fn default() -> Self {
        Self::Xception
    }
}

impl BackboneChoice {
    /// Parse a backbone name as it appears in untyped requests
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "XCEPTION" => Ok(Self::Xception),
            "EFFICIENT_NET" | "EFFICIENTNETV2" => Ok(Self::EfficientNetV2),
            "MOBILE_NET" | "MOBILENET" => Ok(Self::MobileNet),
            other => Err(BeanLeafError::UnknownBackbone(other.to_string())),
        }
    }

    /// Architecture description for this family
    pub fn spec(&self) -> BackboneSpec {
        match self {
            Self::Xception => BackboneSpec {
                name: "xception",
                stage_widths: &[32, 64, 128, 256],
                depthwise: false,
                finetune_from_stage: 2,
                normalization: Normalization::Scaled,
            },
            Self::EfficientNetV2 => BackboneSpec {
                name: "efficientnet_v2",
                stage_widths: &[24, 48, 96, 192, 384],
                depthwise: false,
                finetune_from_stage: 3,
                normalization: Normalization::ImageNet,
            },
            Self::MobileNet => BackboneSpec {
                name: "mobilenet",
                stage_widths: &[32, 64, 128, 256],
                depthwise: true,
                finetune_from_stage: 2,
                normalization: Normalization::Scaled,
            },
        }
    }
}

/// Supported optimizer families
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OptimizerChoice {
    Sgd,
    Adam,
    AdamW,
}

impl Default for OptimizerChoice {
    fn default() -> Self {
        Self::Adam
    }
}

impl OptimizerChoice {
    /// Parse an optimizer name as it appears in untyped requests
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SGD" => Ok(Self::Sgd),
            "ADAM" => Ok(Self::Adam),
            "ADAMW" | "NADAM" => Ok(Self::AdamW),
            other => Err(BeanLeafError::UnknownOptimizer(other.to_string())),
        }
    }
}

/// Where the labeled examples come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSourceChoice {
    /// Class-named subdirectories of image files under `root`
    Directory { root: PathBuf },
    /// Procedurally generated examples, for tests and dry runs
    Synthetic { examples_per_class: usize },
}

impl Default for DatasetSourceChoice {
    fn default() -> Self {
        Self::Directory {
            root: PathBuf::from("data/beans"),
        }
    }
}

/// Pixel normalization scheme a backbone family expects
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Normalization {
    /// Scale [0, 255] to [-1, 1]
    Scaled,
    /// Scale to [0, 1] then standardize with ImageNet channel statistics
    ImageNet,
}

/// Architecture description for a backbone family.
///
/// Widths, depthwise convolutions, and the stage index from which
/// fine-tuning unfreezes are data here; adding a family means adding
/// a row, not a new code path.
#[derive(Debug, Clone, Copy)]
pub struct BackboneSpec {
    pub name: &'static str,
    pub stage_widths: &'static [usize],
    pub depthwise: bool,
    /// First stage (0-based) that becomes trainable during fine-tuning
    pub finetune_from_stage: usize,
    pub normalization: Normalization,
}

impl BackboneSpec {
    pub fn num_stages(&self) -> usize {
        self.stage_widths.len()
    }
}

/// Full configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfiguration {
    /// Backbone family to transfer from
    pub backbone: BackboneChoice,

    /// Optimizer family for both phases
    pub optimizer: OptimizerChoice,

    /// Dataset source
    pub dataset_source: DatasetSourceChoice,

    /// Number of training examples (stratified over classes)
    pub train_size: usize,

    /// Number of validation examples
    pub val_size: usize,

    /// Maximum number of test examples
    pub test_size: usize,

    /// Batch size for all three splits
    pub batch_size: usize,

    /// Epochs for the frozen-backbone phase
    pub epochs_pretrain: usize,

    /// Epochs for the fine-tuning phase (0 skips it)
    pub epochs_finetune: usize,

    /// Learning rate for the frozen-backbone phase
    pub initial_lr: f64,

    /// Learning rate for the fine-tuning phase
    pub finetune_lr: f64,

    /// Dropout rate in the classification head
    pub dropout_rate: f64,

    /// Early-stopping patience, in epochs without val-loss improvement
    pub patience: usize,

    /// Seed for splits, shuffles, and augmentation
    pub random_seed: u64,

    /// Embed normalization in the model graph instead of the pipeline
    pub preprocess_in_model: bool,

    /// Experiment grouping name for tracking
    pub experiment_name: String,

    /// Run name; also the artifact subdirectory
    pub run_name: String,

    /// Directory that receives exported artifacts
    pub output_dir: PathBuf,

    /// Optional burn record with pretrained backbone weights
    pub pretrained_weights: Option<PathBuf>,
}

impl Default for TrainingConfiguration {
    fn default() -> Self {
        Self {
            backbone: BackboneChoice::default(),
            optimizer: OptimizerChoice::default(),
            dataset_source: DatasetSourceChoice::default(),
            train_size: 1034,
            val_size: 133,
            test_size: 128,
            batch_size: 16,
            epochs_pretrain: 5,
            epochs_finetune: 10,
            initial_lr: 0.1,
            finetune_lr: 0.01,
            dropout_rate: 0.5,
            patience: 10,
            random_seed: 42,
            preprocess_in_model: false,
            experiment_name: "bean-disease".to_string(),
            run_name: "baseline".to_string(),
            output_dir: PathBuf::from("output"),
            pretrained_weights: None,
        }
    }
}

impl TrainingConfiguration {
    /// Small configuration for quick smoke runs
    pub fn smoke_test() -> Self {
        Self {
            backbone: BackboneChoice::MobileNet,
            dataset_source: DatasetSourceChoice::Synthetic {
                examples_per_class: 16,
            },
            train_size: 32,
            val_size: 8,
            test_size: 8,
            batch_size: 16,
            epochs_pretrain: 1,
            epochs_finetune: 0,
            run_name: "smoke".to_string(),
            ..Default::default()
        }
    }

    /// Validate all fields; returns the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.train_size == 0 {
            return Err(BeanLeafError::Configuration(
                "train_size must be greater than 0".to_string(),
            ));
        }
        if self.val_size == 0 {
            return Err(BeanLeafError::Configuration(
                "val_size must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(BeanLeafError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.epochs_pretrain == 0 {
            return Err(BeanLeafError::Configuration(
                "epochs_pretrain must be greater than 0".to_string(),
            ));
        }
        if !(self.initial_lr > 0.0) || !(self.finetune_lr > 0.0) {
            return Err(BeanLeafError::Configuration(
                "learning rates must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(BeanLeafError::Configuration(
                "dropout_rate must be in range [0.0, 1.0)".to_string(),
            ));
        }
        if self.run_name.is_empty() {
            return Err(BeanLeafError::Configuration(
                "run_name must not be empty".to_string(),
            ));
        }
        if let DatasetSourceChoice::Synthetic { examples_per_class } = &self.dataset_source {
            if *examples_per_class == 0 {
                return Err(BeanLeafError::Configuration(
                    "examples_per_class must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
