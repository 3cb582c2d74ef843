//! Training orchestration, optimizers, and artifact export

pub mod export;
pub mod optimizer;
pub mod trainer;

pub use export::ExportReport;
pub use optimizer::Phase;
pub use trainer::{PhaseReport, Trainer, TrainingResult};
