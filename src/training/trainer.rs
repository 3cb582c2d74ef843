//! Training orchestrator
//!
//! Drives a run end to end: load and split the dataset, build the
//! pipelines and model, fit the frozen-backbone phase, optionally make
//! the fine-tuning transition and fit again, evaluate on the held-out
//! test split, and export artifacts. Uses a manual fit loop with
//! early stopping on validation loss and best-weight restore.

use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{
        momentum::MomentumConfig, AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig,
    },
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{OptimizerChoice, TrainingConfiguration};
use crate::dataset::DatasetLoader;
use crate::model::{BeanClassifier, ModelAssembler, TunableSection};
use crate::pipeline::{BeanBatcher, Pipeline, PipelineBuilder};
use crate::training::export::{export_artifacts, ExportReport};
use crate::training::optimizer::{phase_learning_rate, Phase, SGD_MOMENTUM};
use crate::utils::error::Result;
use crate::utils::metrics::{Metrics, MetricsAccumulator};

/// Stations a run passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loading,
    Pretraining,
    Finetuning,
    Evaluating,
    Exporting,
    Done,
}

/// Outcome of one fitting phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub epochs_run: usize,
    pub early_stopped: bool,
    /// Train metrics of the last epoch that ran
    pub final_train: Metrics,
    /// Validation metrics of the best epoch
    pub best_val: Metrics,
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    pub pretrain: PhaseReport,
    pub finetune: Option<PhaseReport>,
    pub test: Metrics,
    pub export: ExportReport,
    pub config: TrainingConfiguration,
    pub started_at: String,
    pub finished_at: String,
}

/// End-to-end run orchestrator
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfiguration,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfiguration, device: B::Device) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, device })
    }

    pub fn config(&self) -> &TrainingConfiguration {
        &self.config
    }

    fn enter(&self, state: RunState) {
        info!("Run '{}' entering {:?}", self.config.run_name, state);
    }

    /// Execute the full run. Nothing is written unless every stage up
    /// to export succeeds.
    pub fn run(&self) -> Result<TrainingResult> {
        let started_at = Utc::now().to_rfc3339();

        self.enter(RunState::Loading);
        let splits = DatasetLoader::load(&self.config)?;
        let builder = PipelineBuilder::new(&self.config);
        let (train, val, test) = builder.build(&splits)?;

        let mut model = ModelAssembler::build::<B>(&self.config, &self.device)?;

        self.enter(RunState::Pretraining);
        let (fitted, pretrain) = self.dispatch_phase(
            model,
            Phase::Pretrain,
            self.config.epochs_pretrain,
            &train,
            &val,
        )?;
        model = fitted;

        let finetune = if self.config.epochs_finetune > 0 {
            self.enter(RunState::Finetuning);
            let spec = self.config.backbone.spec();
            model = ModelAssembler::prepare_for_finetuning(model, &spec);
            let (fitted, report) = self.dispatch_phase(
                model,
                Phase::Finetune,
                self.config.epochs_finetune,
                &train,
                &val,
            )?;
            model = fitted;
            Some(report)
        } else {
            debug!("Fine-tuning disabled, skipping phase");
            None
        };

        self.enter(RunState::Evaluating);
        let test_metrics = self.evaluate(&model, &test);
        info!(
            "Test: loss {:.4}, accuracy {:.2}%",
            test_metrics.loss,
            test_metrics.accuracy * 100.0
        );

        self.enter(RunState::Exporting);
        let export = export_artifacts(&model, &self.config)?;

        self.enter(RunState::Done);
        Ok(TrainingResult {
            pretrain,
            finetune,
            test: test_metrics,
            export,
            config: self.config.clone(),
            started_at,
            finished_at: Utc::now().to_rfc3339(),
        })
    }

    /// One match arm per optimizer family; each arm instantiates its
    /// own concrete optimizer type
    fn dispatch_phase(
        &self,
        model: BeanClassifier<B>,
        phase: Phase,
        epochs: usize,
        train: &Pipeline,
        val: &Pipeline,
    ) -> Result<(BeanClassifier<B>, PhaseReport)> {
        let lr = phase_learning_rate(self.config.optimizer, phase, &self.config);
        info!(
            "{} phase: {} epochs, {:?} at lr {}",
            phase.name(),
            epochs,
            self.config.optimizer,
            lr
        );

        match self.config.optimizer {
            OptimizerChoice::Sgd => {
                let optimizer = SgdConfig::new()
                    .with_momentum(Some(MomentumConfig::new().with_momentum(SGD_MOMENTUM)))
                    .init();
                self.fit_phase(model, optimizer, phase, lr, epochs, train, val)
            }
            OptimizerChoice::Adam => {
                let optimizer = AdamConfig::new().init();
                self.fit_phase(model, optimizer, phase, lr, epochs, train, val)
            }
            OptimizerChoice::AdamW => {
                let optimizer = AdamWConfig::new().init();
                self.fit_phase(model, optimizer, phase, lr, epochs, train, val)
            }
        }
    }

    /// Fit loop for one phase. Only `model.tunable` is ever stepped;
    /// the frozen group keeps its weights throughout.
    ///
    /// The weights of the best-validation epoch are restored at the end
    /// of the phase whether or not early stopping triggered; patience
    /// only shortens the schedule. A phase therefore never hands a
    /// worse-than-best model to the next stage.
    fn fit_phase<O: Optimizer<TunableSection<B>, B>>(
        &self,
        mut model: BeanClassifier<B>,
        mut optimizer: O,
        phase: Phase,
        lr: f64,
        epochs: usize,
        train: &Pipeline,
        val: &Pipeline,
    ) -> Result<(BeanClassifier<B>, PhaseReport)> {
        let batcher = BeanBatcher::<B>::new(self.device.clone());

        let mut best_val = Metrics {
            loss: f64::INFINITY,
            accuracy: 0.0,
        };
        let mut best_model: Option<BeanClassifier<B>> = None;
        let mut last_val = Metrics::default();
        let mut stale_epochs = 0usize;
        let mut early_stopped = false;
        let mut final_train = Metrics::default();
        let mut epochs_run = 0usize;
        let mut warned_nonfinite = false;

        for epoch in 0..epochs {
            epochs_run = epoch + 1;
            let mut acc = MetricsAccumulator::new();

            for items in train.epoch(epoch) {
                let batch = batcher.batch(items);

                let output = model.forward(batch.images.clone());
                let loss = CrossEntropyLossConfig::new()
                    .init(&output.device())
                    .forward(output.clone(), batch.targets.clone());
                let loss_value: f64 = loss.clone().into_scalar().elem();
                if !loss_value.is_finite() && !warned_nonfinite {
                    warn!(
                        "{} loss became non-finite in epoch {}; run continues with degenerate metrics",
                        phase.name(),
                        epoch + 1
                    );
                    warned_nonfinite = true;
                }

                let predictions = output.argmax(1).squeeze::<1>(1);
                let correct: i64 = predictions
                    .equal(batch.targets.clone())
                    .int()
                    .sum()
                    .into_scalar()
                    .elem();
                acc.update(loss_value, correct as usize, batch.targets.dims()[0]);

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model.tunable);
                model.tunable = optimizer.step(lr, model.tunable, grads);
            }

            final_train = acc.finish();
            let val_metrics = self.evaluate(&model, val);
            last_val = val_metrics;

            info!(
                "{} epoch {}/{}: train loss {:.4} acc {:.2}% | val loss {:.4} acc {:.2}%",
                phase.name(),
                epoch + 1,
                epochs,
                final_train.loss,
                final_train.accuracy * 100.0,
                val_metrics.loss,
                val_metrics.accuracy * 100.0
            );

            if val_metrics.loss < best_val.loss {
                best_val = val_metrics;
                best_model = Some(model.clone());
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                if stale_epochs >= self.config.patience {
                    info!(
                        "Early stopping {} after {} epochs without val-loss improvement",
                        phase.name(),
                        stale_epochs
                    );
                    early_stopped = true;
                    break;
                }
            }
        }

        // Restore the best weights seen in this phase, early-stopped or not
        match best_model {
            Some(best) => model = best,
            None => best_val = last_val,
        }

        Ok((
            model,
            PhaseReport {
                phase,
                epochs_run,
                early_stopped,
                final_train,
                best_val,
            },
        ))
    }

    /// Loss and accuracy over one pipeline, in inference mode
    fn evaluate(&self, model: &BeanClassifier<B>, pipeline: &Pipeline) -> Metrics {
        let device = <B::InnerBackend as Backend>::Device::default();
        let batcher = BeanBatcher::<B::InnerBackend>::new(device);
        let inner_model = model.valid();

        let mut acc = MetricsAccumulator::new();
        for items in pipeline.epoch(0) {
            let batch = batcher.batch(items);
            let output = inner_model.forward(batch.images.clone());
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());
            let loss_value: f64 = loss.into_scalar().elem();

            let predictions = output.argmax(1).squeeze::<1>(1);
            let correct: i64 = predictions
                .equal(batch.targets.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();
            acc.update(loss_value, correct as usize, batch.targets.dims()[0]);
        }
        acc.finish()
    }
}
