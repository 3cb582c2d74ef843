//! BeanLeaf CLI
//!
//! Entry point for running bean leaf disease training from the command
//! line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use beanleaf::config::{
    BackboneChoice, DatasetSourceChoice, OptimizerChoice, TrainingConfiguration,
};
use beanleaf::tracking::{JsonlSink, TrackedTrainer};
use beanleaf::utils::logging::{init_logging, LogConfig};

/// Bean leaf disease classification trainer
#[derive(Parser, Debug)]
#[command(name = "beanleaf")]
#[command(version = beanleaf::VERSION)]
#[command(about = "Two-phase transfer-learning trainer for bean disease classification", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a classifier and export its artifacts
    Train {
        /// Path to a JSON configuration file; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset root with class-named subdirectories
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Use a synthetic dataset with this many examples per class
        #[arg(long, conflicts_with = "data_dir")]
        synthetic: Option<usize>,

        /// Backbone family: xception, efficientnetv2, mobilenet
        #[arg(short, long)]
        backbone: Option<String>,

        /// Optimizer family: sgd, adam, adamw
        #[arg(long)]
        optimizer: Option<String>,

        /// Epochs for the frozen-backbone phase
        #[arg(long)]
        epochs_pretrain: Option<usize>,

        /// Epochs for the fine-tuning phase (0 skips it)
        #[arg(long)]
        epochs_finetune: Option<usize>,

        /// Batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Run name (also the artifact subdirectory)
        #[arg(short, long)]
        run_name: Option<String>,

        /// Output directory for artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory for experiment tracking logs
        #[arg(long, default_value = "output/tracking")]
        tracking_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_logging(&log_config).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Train {
            config,
            data_dir,
            synthetic,
            backbone,
            optimizer,
            epochs_pretrain,
            epochs_finetune,
            batch_size,
            seed,
            run_name,
            output_dir,
            tracking_dir,
        } => {
            let mut training_config = match config {
                Some(path) => TrainingConfiguration::load(&path)?,
                None => TrainingConfiguration::default(),
            };

            if let Some(root) = data_dir {
                training_config.dataset_source = DatasetSourceChoice::Directory { root };
            }
            if let Some(per_class) = synthetic {
                training_config.dataset_source = DatasetSourceChoice::Synthetic {
                    examples_per_class: per_class,
                };
            }
            if let Some(name) = backbone {
                training_config.backbone = BackboneChoice::parse(&name)?;
            }
            if let Some(name) = optimizer {
                training_config.optimizer = OptimizerChoice::parse(&name)?;
            }
            if let Some(epochs) = epochs_pretrain {
                training_config.epochs_pretrain = epochs;
            }
            if let Some(epochs) = epochs_finetune {
                training_config.epochs_finetune = epochs;
            }
            if let Some(size) = batch_size {
                training_config.batch_size = size;
            }
            if let Some(value) = seed {
                training_config.random_seed = value;
            }
            if let Some(name) = run_name {
                training_config.run_name = name;
            }
            if let Some(dir) = output_dir {
                training_config.output_dir = dir;
            }

            println!("{}", "BeanLeaf Training".green().bold());
            println!("  Backend:   {}", beanleaf::backend::backend_name());
            println!("  Backbone:  {:?}", training_config.backbone);
            println!("  Optimizer: {:?}", training_config.optimizer);
            println!(
                "  Epochs:    {} pretrain + {} finetune",
                training_config.epochs_pretrain, training_config.epochs_finetune
            );
            println!("  Run:       {}", training_config.run_name);
            println!();

            let mut sink = JsonlSink::new(tracking_dir);
            let trainer = TrackedTrainer::new(training_config)?;
            let result = trainer.run_with(&mut sink)?;

            info!("Run finished");
            println!();
            println!("{}", "Training Complete!".green().bold());
            println!(
                "  Test accuracy: {}",
                format!("{:.2}%", result.test.accuracy * 100.0).cyan()
            );
            println!("  Test loss:     {:.4}", result.test.loss);
            println!(
                "  Artifacts:     {} ({:.2} MB), {} ({:.2} MB)",
                result.export.full_path.display(),
                result.export.full_size_mb,
                result.export.compact_path.display(),
                result.export.compact_size_mb
            );
        }
    }

    Ok(())
}
