//! Dataset sources and splitting

pub mod loader;
pub mod provider;
pub mod split;

pub use loader::{DatasetLoader, DatasetSplits, SplitSequence};
pub use provider::{ExampleProvider, ExampleRecord, ImageSource};
