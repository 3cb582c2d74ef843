//! Model Assembler
//!
//! Builds the classifier in its pre-training configuration (all
//! backbone stages frozen, head trainable) and performs the one-way
//! fine-tuning transition that unfreezes the tail of the backbone.

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use tracing::{info, warn};

use crate::config::{BackboneSpec, TrainingConfiguration, NUM_CLASSES};
use crate::model::backbone::{build_stages, PreprocessBlock};
use crate::model::classifier::{BeanClassifier, Head, TunableSection};
use crate::pipeline::transform::{Augmenter, Preprocessor};
use crate::utils::error::{BeanLeafError, Result};

pub struct ModelAssembler;

impl ModelAssembler {
    /// Build the classifier for the pre-training phase.
    ///
    /// All backbone stages start in the frozen group; only the head is
    /// tunable. When `pretrained_weights` names a record it is loaded
    /// over the freshly initialized model; otherwise the backbone is
    /// randomly initialized.
    pub fn build<B: Backend>(
        config: &TrainingConfiguration,
        device: &B::Device,
    ) -> Result<BeanClassifier<B>> {
        let spec = config.backbone.spec();
        info!(
            "Assembling '{}' backbone: {} stages, head dropout {}",
            spec.name,
            spec.num_stages(),
            config.dropout_rate
        );

        let preprocess = if config.preprocess_in_model {
            Some(PreprocessBlock::new(spec.normalization, device))
        } else {
            None
        };
        let frozen = build_stages(&spec, device);
        let head = Head::new(
            *spec.stage_widths.last().expect("spec has stages"),
            NUM_CLASSES,
            config.dropout_rate,
            device,
        );
        let model = BeanClassifier::new(
            preprocess,
            frozen,
            TunableSection {
                stages: Vec::new(),
                head,
            },
            NUM_CLASSES,
        );

        match &config.pretrained_weights {
            Some(path) => {
                info!("Loading pretrained weights from {}", path.display());
                let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::default();
                model.load_file(path.clone(), &recorder, device).map_err(|e| {
                    BeanLeafError::Training(format!(
                        "failed to load pretrained weights from {}: {}",
                        path.display(),
                        e
                    ))
                })
            }
            None => {
                warn!("No pretrained weights configured; backbone starts from random init");
                Ok(model)
            }
        }
    }

    /// The pipeline-side transforms matching this configuration.
    ///
    /// With `preprocess_in_model` the model graph normalizes and the
    /// pipeline only resizes and scales, with no augmentation.
    pub fn build_preprocessing(config: &TrainingConfiguration) -> (Preprocessor, Option<Augmenter>) {
        if config.preprocess_in_model {
            (Preprocessor::scale_only(), None)
        } else {
            let spec = config.backbone.spec();
            (
                Preprocessor::new(spec.normalization),
                Some(Augmenter::default()),
            )
        }
    }

    /// Move the backbone tail into the tunable group for fine-tuning.
    ///
    /// Stages at index `finetune_from_stage` and beyond become
    /// trainable; weights are untouched. Calling this on a model that
    /// already made the transition is a no-op.
    pub fn prepare_for_finetuning<B: Backend>(
        mut model: BeanClassifier<B>,
        spec: &BackboneSpec,
    ) -> BeanClassifier<B> {
        let cutoff = spec.finetune_from_stage;
        if model.frozen.len() <= cutoff {
            return model;
        }

        let mut moved = model.frozen.split_off(cutoff);
        info!(
            "Unfreezing {} backbone stages for fine-tuning ({} stay frozen)",
            moved.len(),
            model.frozen.len()
        );
        moved.append(&mut model.tunable.stages);
        model.tunable.stages = moved;
        model
    }
}
