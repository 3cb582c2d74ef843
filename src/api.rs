//! Request and response mapping
//!
//! Pure functions between untyped JSON payloads and the typed
//! configuration/result types, for embedding the trainer behind any
//! transport. Every request field is optional and falls back to the
//! default configuration; present fields must coerce cleanly.

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::config::{
    BackboneChoice, DatasetSourceChoice, OptimizerChoice, TrainingConfiguration,
};
use crate::training::TrainingResult;
use crate::utils::error::{BeanLeafError, Result};

fn bad_field(key: &str, expected: &str) -> BeanLeafError {
    BeanLeafError::Configuration(format!("field '{}' must be {}", key, expected))
}

fn get_usize(map: &Map<String, Value>, key: &str, default: usize) -> Result<usize> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| bad_field(key, "a non-negative integer")),
        Some(_) => Err(bad_field(key, "a non-negative integer")),
    }
}

fn get_u64(map: &Map<String, Value>, key: &str, default: u64) -> Result<u64> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| bad_field(key, "a non-negative integer")),
        Some(_) => Err(bad_field(key, "a non-negative integer")),
    }
}

fn get_f64(map: &Map<String, Value>, key: &str, default: f64) -> Result<f64> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| bad_field(key, "a number")),
        Some(_) => Err(bad_field(key, "a number")),
    }
}

fn get_bool(map: &Map<String, Value>, key: &str, default: bool) -> Result<bool> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(bad_field(key, "a boolean")),
    }
}

fn get_string(map: &Map<String, Value>, key: &str, default: &str) -> Result<String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(bad_field(key, "a string")),
    }
}

/// Build a validated configuration from an untyped request body.
///
/// Absent fields take defaults; unknown fields are ignored.
pub fn config_from_request(request: &Value) -> Result<TrainingConfiguration> {
    let map = request
        .as_object()
        .ok_or_else(|| BeanLeafError::Configuration("request body must be a JSON object".into()))?;
    let defaults = TrainingConfiguration::default();

    let backbone = match map.get("backbone") {
        None | Some(Value::Null) => defaults.backbone,
        Some(Value::String(s)) => BackboneChoice::parse(s)?,
        Some(_) => return Err(bad_field("backbone", "a string")),
    };
    let optimizer = match map.get("optimizer") {
        None | Some(Value::Null) => defaults.optimizer,
        Some(Value::String(s)) => OptimizerChoice::parse(s)?,
        Some(_) => return Err(bad_field("optimizer", "a string")),
    };
    let dataset_source = match map.get("dataset_root") {
        None | Some(Value::Null) => defaults.dataset_source,
        Some(Value::String(s)) => DatasetSourceChoice::Directory {
            root: PathBuf::from(s),
        },
        Some(_) => return Err(bad_field("dataset_root", "a string")),
    };
    let pretrained_weights = match map.get("pretrained_weights") {
        None | Some(Value::Null) => defaults.pretrained_weights.clone(),
        Some(Value::String(s)) => Some(PathBuf::from(s)),
        Some(_) => return Err(bad_field("pretrained_weights", "a string")),
    };

    let config = TrainingConfiguration {
        backbone,
        optimizer,
        dataset_source,
        train_size: get_usize(map, "train_size", defaults.train_size)?,
        val_size: get_usize(map, "val_size", defaults.val_size)?,
        test_size: get_usize(map, "test_size", defaults.test_size)?,
        batch_size: get_usize(map, "batch_size", defaults.batch_size)?,
        epochs_pretrain: get_usize(map, "epochs_pretrain", defaults.epochs_pretrain)?,
        epochs_finetune: get_usize(map, "epochs_finetune", defaults.epochs_finetune)?,
        initial_lr: get_f64(map, "initial_lr", defaults.initial_lr)?,
        finetune_lr: get_f64(map, "finetune_lr", defaults.finetune_lr)?,
        dropout_rate: get_f64(map, "dropout_rate", defaults.dropout_rate)?,
        patience: get_usize(map, "patience", defaults.patience)?,
        random_seed: get_u64(map, "random_seed", defaults.random_seed)?,
        preprocess_in_model: get_bool(map, "preprocess_in_model", defaults.preprocess_in_model)?,
        experiment_name: get_string(map, "experiment_name", &defaults.experiment_name)?,
        run_name: get_string(map, "run_name", &defaults.run_name)?,
        output_dir: PathBuf::from(get_string(
            map,
            "output_dir",
            &defaults.output_dir.display().to_string(),
        )?),
        pretrained_weights,
    };

    config.validate()?;
    Ok(config)
}

/// Success payload for a finished run
pub fn response_from_result(result: &TrainingResult) -> Value {
    json!({
        "status": "success",
        "metrics": {
            "test_loss": result.test.loss,
            "test_accuracy": result.test.accuracy,
        },
        "pretrain": result.pretrain,
        "finetune": result.finetune,
        "artifacts": {
            "full_path": result.export.full_path.display().to_string(),
            "compact_path": result.export.compact_path.display().to_string(),
            "compact_size_mb": result.export.compact_size_mb,
        },
        "config": result.config,
        "started_at": result.started_at,
        "finished_at": result.finished_at,
    })
}

/// Error payload for a failed run
pub fn error_envelope(error: &BeanLeafError) -> Value {
    let kind = match error {
        BeanLeafError::Configuration(_) => "configuration",
        BeanLeafError::DataUnavailable(_) => "data_unavailable",
        BeanLeafError::InsufficientData(_) => "insufficient_data",
        BeanLeafError::UnknownBackbone(_) => "unknown_backbone",
        BeanLeafError::UnknownOptimizer(_) => "unknown_optimizer",
        BeanLeafError::Image(_, _) => "image",
        BeanLeafError::Training(_) => "training",
        BeanLeafError::Export(_) => "export",
        BeanLeafError::Io(_) => "io",
    };
    json!({
        "status": "error",
        "kind": kind,
        "error": error.to_string(),
    })
}
