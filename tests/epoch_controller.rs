mod common;

use std::fs;
use std::sync::mpsc;

use ferrite_cd::config::LoggingInterval;
use ferrite_cd::model::ChangeModel;
use ferrite_cd::report::{TEST_BEST_FILE, TEST_LATEST_FILE, TRAIN_FILE, VAL_FILE};
use ferrite_cd::telemetry::MemorySink;
use ferrite_cd::train::{Mode, Phase, TrainConfig};
use ferrite_cd::HarnessError;
use tempfile::tempdir;

use common::{controller, controller_with_test, sample, toy_samples};

#[test]
fn one_epoch_reports_emits_and_resets() {
    let dir = tempdir().unwrap();
    let sink = MemorySink::new();
    let mut ctl = controller(dir.path(), toy_samples(), TrainConfig::new(3), sink.clone());

    let stats = ctl.run_epoch(0).unwrap();

    for name in [TRAIN_FILE, VAL_FILE, TEST_LATEST_FILE, TEST_BEST_FILE] {
        let text = fs::read_to_string(dir.path().join(name)).unwrap();
        assert!(text.starts_with("epoch:0/3 "), "{}: {}", name, text);
    }

    // 4 samples in batches of 2.
    assert_eq!(sink.values("tr_loss_step").len(), 2);
    assert_eq!(sink.values("val_loss_step").len(), 2);
    assert_eq!(sink.values("tr_loss_epoch").len(), 1);
    assert_eq!(sink.values("val_change_f1"), vec![stats.val_change_f1]);
    assert_eq!(sink.values("test_change_f1"), vec![stats.test_change_f1]);
    assert_eq!(sink.values("lr-SGD"), vec![0.3]);
    assert!(sink.values("test_oa").is_empty());

    for mode in [Mode::Train, Mode::Val, Mode::Test] {
        assert!(ctl.accumulator(mode).is_empty(), "{} accumulator not reset", mode);
    }
    for key in ["tr_change_f1", "val_change_f1", "val_miou", "val_loss_epoch", "test_change_f1"] {
        assert!(stats.logged.contains_key(key), "missing {}", key);
    }
    assert_eq!(ctl.global_step(), 2);
    assert_eq!(ctl.next_phase(), Phase::Training);
}

#[test]
fn phases_must_alternate() {
    let dir = tempdir().unwrap();
    let mut ctl = controller(dir.path(), toy_samples(), TrainConfig::new(1), MemorySink::new());

    assert!(matches!(ctl.run_validation_phase(0), Err(HarnessError::PhaseOrder { .. })));
    ctl.run_training_phase(0).unwrap();
    assert!(matches!(ctl.run_training_phase(0), Err(HarnessError::PhaseOrder { .. })));
    ctl.run_validation_phase(0).unwrap();
    assert!(ctl.run_training_phase(1).is_ok());
}

#[test]
fn failed_phase_leaves_accumulator_dirty_until_reset() {
    let dir = tempdir().unwrap();
    let mut bad = sample(&[]);
    bad.mask[0] = 5;
    let train = vec![sample(&[1]), sample(&[2]), bad, sample(&[0])];
    let mut ctl = controller(dir.path(), train, TrainConfig::new(1), MemorySink::new());

    assert!(matches!(ctl.run_training_phase(0), Err(HarnessError::LabelOutOfRange { label: 5, .. })));
    assert!(!ctl.accumulator(Mode::Train).is_empty());
    assert!(matches!(ctl.run_training_phase(0), Err(HarnessError::DirtyAccumulator("train"))));

    ctl.reset_accumulators();
    assert!(matches!(ctl.run_training_phase(0), Err(HarnessError::LabelOutOfRange { .. })));
}

#[test]
fn failed_test_pass_retry_does_not_repeat_validation() {
    let dir = tempdir().unwrap();
    let sink = MemorySink::new();
    let mut bad = sample(&[]);
    bad.mask[1] = 7;
    let mut test = toy_samples();
    test.push(bad);
    let mut ctl = controller_with_test(dir.path(), toy_samples(), test, TrainConfig::new(1), sink.clone());

    ctl.run_training_phase(0).unwrap();
    assert!(matches!(ctl.run_validation_phase(0), Err(HarnessError::LabelOutOfRange { label: 7, .. })));
    assert_eq!(ctl.next_phase(), Phase::ValidationAndEmbeddedTest);
    let val_best = ctl.val_best().best();

    ctl.reset_accumulators();
    assert!(matches!(ctl.run_validation_phase(0), Err(HarnessError::LabelOutOfRange { label: 7, .. })));

    let val_report = fs::read_to_string(dir.path().join(VAL_FILE)).unwrap();
    assert_eq!(val_report.matches("epoch:0/1 val").count(), 1);
    assert_eq!(sink.values("val_change_f1").len(), 1);
    assert_eq!(sink.values("val_loss_step").len(), 2);
    assert_eq!(ctl.val_best().best(), val_best);
    assert!(sink.values("test_change_f1").is_empty());
    assert!(!dir.path().join(TEST_LATEST_FILE).exists());
}

#[test]
fn test_split_is_only_evaluated_after_training() {
    let dir = tempdir().unwrap();
    let sink = MemorySink::new();
    let mut ctl = controller(dir.path(), toy_samples(), TrainConfig::new(1), sink.clone());

    assert!(matches!(ctl.run_validation_phase(0), Err(HarnessError::PhaseOrder { .. })));
    assert!(!dir.path().join(TEST_LATEST_FILE).exists());
    assert!(sink.values("test_change_f1").is_empty());
    assert_eq!(ctl.test_best().best(), -1.0);
}

#[test]
fn validation_does_not_touch_weights() {
    let dir = tempdir().unwrap();
    let mut ctl = controller(dir.path(), toy_samples(), TrainConfig::new(1), MemorySink::new());
    ctl.run_training_phase(0).unwrap();

    let before = ctl.model().state().unwrap();
    ctl.run_validation_phase(0).unwrap();
    assert_eq!(ctl.model().state().unwrap(), before);
}

#[test]
fn step_interval_logs_lr_every_step() {
    let dir = tempdir().unwrap();
    let sink = MemorySink::new();
    let mut config = TrainConfig::new(2);
    config.logging_interval = LoggingInterval::Step;
    let mut ctl = controller(dir.path(), toy_samples(), config, sink.clone());

    ctl.run_epoch(0).unwrap();
    ctl.run_epoch(1).unwrap();
    assert_eq!(sink.values("lr-SGD").len(), 4);
}

#[test]
fn sanity_check_leaves_no_trace() {
    let dir = tempdir().unwrap();
    let sink = MemorySink::new();
    let mut config = TrainConfig::new(1);
    config.sanity_val_steps = 2;
    let mut ctl = controller(dir.path(), toy_samples(), config, sink.clone());

    ctl.sanity_check().unwrap();
    assert!(ctl.accumulator(Mode::Val).is_empty());
    assert!(sink.records().is_empty());
    assert!(!dir.path().join(VAL_FILE).exists());
}

#[test]
fn checkpoint_restore_round_trip() {
    let dir = tempdir().unwrap();
    let mut trained = controller(dir.path(), toy_samples(), TrainConfig::new(2), MemorySink::new());
    trained.run_epoch(0).unwrap();
    let ckpt = trained.checkpoint(0).unwrap();

    let other_dir = tempdir().unwrap();
    let mut fresh = controller(other_dir.path(), toy_samples(), TrainConfig::new(2), MemorySink::new());
    fresh.restore(&ckpt).unwrap();
    assert_eq!(fresh.global_step(), trained.global_step());
    assert_eq!(fresh.model().state().unwrap(), trained.model().state().unwrap());
    assert_eq!(fresh.test_best().best(), -1.0);
    assert_eq!(fresh.val_best().best(), -1.0);
    assert!(trained.val_best().best() >= 0.0);
}

#[test]
fn progress_channel_receives_each_epoch() {
    let dir = tempdir().unwrap();
    let (tx, rx) = mpsc::channel();
    let mut config = TrainConfig::new(2);
    config.progress_tx = Some(tx);
    let mut ctl = controller(dir.path(), toy_samples(), config, MemorySink::new());

    ctl.run_epoch(0).unwrap();
    ctl.run_epoch(1).unwrap();
    let epochs: Vec<usize> = rx.try_iter().map(|s| s.epoch).collect();
    assert_eq!(epochs, vec![0, 1]);
}
