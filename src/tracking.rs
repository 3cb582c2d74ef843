//! Experiment tracking
//!
//! A small sink abstraction for recording runs: parameters up front,
//! metrics and artifacts at the end, and a terminal status either way.
//! The bundled sink appends JSON lines to a file per experiment.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use crate::backend::TrainingBackend;
use crate::config::TrainingConfiguration;
use crate::training::{Trainer, TrainingResult};
use crate::utils::error::Result;

/// Receiver for run lifecycle events
pub trait ExperimentSink {
    fn begin_run(&mut self, experiment: &str, run: &str) -> Result<()>;
    fn log_params(&mut self, config: &TrainingConfiguration) -> Result<()>;
    fn log_metrics(&mut self, result: &TrainingResult) -> Result<()>;
    fn log_artifact(&mut self, path: &Path) -> Result<()>;
    fn end_run(&mut self, status: &str) -> Result<()>;
}

/// Appends one JSON object per event to `<dir>/<experiment>.jsonl`
pub struct JsonlSink {
    dir: PathBuf,
    current: Option<PathBuf>,
}

impl JsonlSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, current: None }
    }

    fn append(&self, event: serde_json::Value) -> Result<()> {
        let Some(path) = &self.current else {
            warn!("Tracking event dropped: no run in progress");
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", event)?;
        Ok(())
    }
}

impl ExperimentSink for JsonlSink {
    fn begin_run(&mut self, experiment: &str, run: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        self.current = Some(self.dir.join(format!("{}.jsonl", experiment)));
        self.append(json!({
            "event": "begin_run",
            "run": run,
            "time": Utc::now().to_rfc3339(),
        }))
    }

    fn log_params(&mut self, config: &TrainingConfiguration) -> Result<()> {
        self.append(json!({
            "event": "params",
            "config": config,
        }))
    }

    fn log_metrics(&mut self, result: &TrainingResult) -> Result<()> {
        self.append(json!({
            "event": "metrics",
            "pretrain": result.pretrain,
            "finetune": result.finetune,
            "test": result.test,
        }))
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        self.append(json!({
            "event": "artifact",
            "path": path.display().to_string(),
        }))
    }

    fn end_run(&mut self, status: &str) -> Result<()> {
        let result = self.append(json!({
            "event": "end_run",
            "status": status,
            "time": Utc::now().to_rfc3339(),
        }));
        self.current = None;
        result
    }
}

/// Runs a trainer with its lifecycle mirrored into a sink.
///
/// Tracking failures are logged but never fail the run itself.
pub struct TrackedTrainer {
    trainer: Trainer<TrainingBackend>,
}

impl TrackedTrainer {
    pub fn new(config: TrainingConfiguration) -> Result<Self> {
        let device = crate::backend::default_device();
        Ok(Self {
            trainer: Trainer::new(config, device)?,
        })
    }

    pub fn run_with(&self, sink: &mut dyn ExperimentSink) -> Result<TrainingResult> {
        let config = self.trainer.config();
        log_soft(sink.begin_run(&config.experiment_name, &config.run_name));
        log_soft(sink.log_params(config));

        match self.trainer.run() {
            Ok(result) => {
                log_soft(sink.log_metrics(&result));
                log_soft(sink.log_artifact(&result.export.full_path));
                log_soft(sink.log_artifact(&result.export.compact_path));
                log_soft(sink.end_run("success"));
                Ok(result)
            }
            Err(err) => {
                log_soft(sink.end_run("failed"));
                Err(err)
            }
        }
    }
}

fn log_soft(result: Result<()>) {
    if let Err(err) = result {
        warn!("Tracking sink error (ignored): {}", err);
    } else {
        debug!("Tracking event recorded");
    }
}
