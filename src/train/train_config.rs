use std::sync::mpsc;

use crate::config::LoggingInterval;
use crate::train::epoch_stats::EpochStats;

/// Run-level knobs for an `EpochController`.
///
/// # Fields
/// - `epochs`: total number of epochs (used in report headers)
/// - `logging_interval`: emit the learning rate every step or every epoch
/// - `sanity_val_steps`: validation batches run once before a fresh run
/// - `progress_bar`: draw per-phase progress bars on the terminal
/// - `progress_tx`: optional channel; one `EpochStats` is sent per
///   completed epoch. A dropped receiver is ignored.
pub struct TrainConfig {
    pub epochs: usize,
    pub logging_interval: LoggingInterval,
    pub sanity_val_steps: usize,
    pub progress_bar: bool,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl TrainConfig {
    /// Creates a minimal `TrainConfig`: epoch-level LR logging, no sanity
    /// steps, no progress bar, no channel.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            logging_interval: LoggingInterval::Epoch,
            sanity_val_steps: 0,
            progress_bar: false,
            progress_tx: None,
        }
    }
}
