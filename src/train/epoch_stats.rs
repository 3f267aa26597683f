use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::metrics::AggregateMetrics;

/// Per-epoch summary returned by `EpochController::run_epoch`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, one value is
/// sent at the end of every completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over the batches of this epoch.
    pub train_loss: f64,
    /// Mean validation loss.
    pub val_loss: f64,
    pub train: AggregateMetrics,
    pub val: AggregateMetrics,
    pub train_change_f1: f64,
    pub val_change_f1: f64,
    /// Change-class F1 of the embedded full test pass.
    pub test_change_f1: f64,
    /// Learning rate the next epoch will use.
    pub learning_rate: f64,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
    /// Every epoch-level scalar emitted this epoch, by name. Checkpoint
    /// monitors look their value up here.
    pub logged: BTreeMap<String, f64>,
}
