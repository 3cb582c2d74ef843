//! End-to-end training runs on the CPU backend with synthetic data.

use beanleaf::backend::{default_device, TrainingBackend};
use beanleaf::config::{
    BackboneChoice, DatasetSourceChoice, OptimizerChoice, TrainingConfiguration,
};
use beanleaf::training::Trainer;
use beanleaf::utils::error::BeanLeafError;

fn smoke_config(output_dir: &std::path::Path) -> TrainingConfiguration {
    TrainingConfiguration {
        backbone: BackboneChoice::MobileNet,
        optimizer: OptimizerChoice::Adam,
        dataset_source: DatasetSourceChoice::Synthetic {
            examples_per_class: 16,
        },
        train_size: 32,
        val_size: 8,
        test_size: 8,
        batch_size: 16,
        epochs_pretrain: 1,
        epochs_finetune: 0,
        output_dir: output_dir.to_path_buf(),
        run_name: "smoke".to_string(),
        ..Default::default()
    }
}

#[test]
fn pretrain_only_run_succeeds_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let config = smoke_config(dir.path());

    let trainer = Trainer::<TrainingBackend>::new(config, default_device()).unwrap();
    let result = trainer.run().unwrap();

    assert_eq!(result.pretrain.epochs_run, 1);
    assert!(!result.pretrain.early_stopped);
    assert!(result.finetune.is_none());

    // Metrics are finite and in range
    assert!(result.test.loss.is_finite());
    assert!((0.0..=1.0).contains(&result.test.accuracy));

    // Both artifacts landed under <output_dir>/<run_name>/
    let run_dir = dir.path().join("smoke");
    assert!(result.export.full_path.starts_with(&run_dir));
    assert!(result.export.full_path.exists());
    assert!(result.export.compact_path.exists());
    assert!(result.export.compact_size_mb > 0.0);
}

#[test]
fn finetune_phase_runs_after_transition() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = smoke_config(dir.path());
    config.epochs_finetune = 1;
    config.run_name = "smoke-finetune".to_string();

    let trainer = Trainer::<TrainingBackend>::new(config, default_device()).unwrap();
    let result = trainer.run().unwrap();

    let finetune = result.finetune.expect("finetune phase must report");
    assert_eq!(finetune.epochs_run, 1);
    assert!(result.export.full_path.exists());
}

#[test]
fn insufficient_data_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = smoke_config(dir.path());
    config.train_size = 100; // exceeds the 48 synthetic examples
    config.run_name = "too-big".to_string();

    let trainer = Trainer::<TrainingBackend>::new(config, default_device()).unwrap();
    let result = trainer.run();

    match result {
        Err(BeanLeafError::InsufficientData(message)) => {
            assert!(message.contains("train"));
        }
        other => panic!("expected InsufficientData, got {:?}", other.map(|_| ())),
    }

    // No artifacts, no run directory
    assert!(!dir.path().join("too-big").exists());
}

#[test]
fn same_seed_reports_identical_split_membership() {
    let dir = tempfile::tempdir().unwrap();
    let config = smoke_config(dir.path());

    let a = beanleaf::DatasetLoader::load(&config).unwrap();
    let b = beanleaf::DatasetLoader::load(&config).unwrap();

    let ids = |s: &beanleaf::SplitSequence| s.records.iter().map(|r| r.id).collect::<Vec<_>>();
    assert_eq!(ids(&a.train), ids(&b.train));
    assert_eq!(ids(&a.test), ids(&b.test));
}

#[test]
fn request_mapping_drives_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let request = serde_json::json!({
        "backbone": "MOBILE_NET",
        "train_size": 32,
        "val_size": 8,
        "test_size": 8,
        "batch_size": 16,
        "epochs_pretrain": 1,
        "epochs_finetune": 0,
        "run_name": "from-request",
        "output_dir": dir.path().display().to_string(),
    });

    let mut config = beanleaf::api::config_from_request(&request).unwrap();
    config.dataset_source = DatasetSourceChoice::Synthetic {
        examples_per_class: 16,
    };

    let trainer = Trainer::<TrainingBackend>::new(config, default_device()).unwrap();
    let result = trainer.run().unwrap();

    let response = beanleaf::api::response_from_result(&result);
    assert_eq!(response["status"], "success");
    assert!(response["metrics"]["test_accuracy"].is_number());
    assert!(response["artifacts"]["compact_size_mb"].as_f64().unwrap() > 0.0);
}
