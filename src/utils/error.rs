//! Error Handling Module
//!
//! Defines the error taxonomy for the beanleaf training pipeline.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for beanleaf operations
#[derive(Error, Debug)]
pub enum BeanLeafError {
    /// Bad, missing, or uncoercible configuration fields
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configured dataset source could not be reached or read
    #[error("Dataset unavailable: {0}")]
    DataUnavailable(String),

    /// Requested split sizes cannot be satisfied per class
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Backbone name not recognized when parsing an untyped request
    #[error("Unknown backbone: '{0}'")]
    UnknownBackbone(String),

    /// Optimizer name not recognized when parsing an untyped request
    #[error("Unknown optimizer: '{0}'")]
    UnknownOptimizer(String),

    /// Error decoding or processing an image
    #[error("Failed to load image at '{0}': {1}")]
    Image(PathBuf, String),

    /// Error during model fitting
    #[error("Training error: {0}")]
    Training(String),

    /// Error writing or verifying an exported artifact
    #[error("Export error: {0}")]
    Export(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for beanleaf operations
pub type Result<T> = std::result::Result<T, BeanLeafError>;
