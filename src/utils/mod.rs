//! Utility modules: errors, logging, metrics

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{BeanLeafError, Result};
