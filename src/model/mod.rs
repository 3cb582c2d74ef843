//! Model architecture and assembly

pub mod assembler;
pub mod backbone;
pub mod classifier;

pub use assembler::ModelAssembler;
pub use backbone::{ConvStage, PreprocessBlock};
pub use classifier::{BeanClassifier, Head, TunableSection};
