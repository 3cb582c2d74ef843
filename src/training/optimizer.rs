//! Optimizer construction
//!
//! Per-family learning rate policy for the two training phases. The
//! optimizer instances themselves are created at the dispatch site in
//! the trainer, one concrete type per match arm, so each family keeps
//! its own state type.

use serde::{Deserialize, Serialize};

use crate::config::{OptimizerChoice, TrainingConfiguration};

/// The two training phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Pretrain,
    Finetune,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Pretrain => "pretrain",
            Phase::Finetune => "finetune",
        }
    }
}

/// Momentum used by the SGD family
pub const SGD_MOMENTUM: f64 = 0.9;

/// Fixed rates for the AdamW family, per phase
const ADAMW_PRETRAIN_LR: f64 = 1e-4;
const ADAMW_FINETUNE_LR: f64 = 1e-5;

/// Learning rate for a phase.
///
/// SGD and Adam use the configured rates; AdamW always runs at fixed
/// conservative rates, ignoring the configured ones.
pub fn phase_learning_rate(
    optimizer: OptimizerChoice,
    phase: Phase,
    config: &TrainingConfiguration,
) -> f64 {
    match optimizer {
        OptimizerChoice::AdamW => match phase {
            Phase::Pretrain => ADAMW_PRETRAIN_LR,
            Phase::Finetune => ADAMW_FINETUNE_LR,
        },
        OptimizerChoice::Sgd | OptimizerChoice::Adam => match phase {
            Phase::Pretrain => config.initial_lr,
            Phase::Finetune => config.finetune_lr,
        },
    }
}
