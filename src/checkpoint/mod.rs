pub mod best;
pub mod checkpoint;
pub mod monitor;

pub use best::{RunningBest, BEST_SENTINEL};
pub use checkpoint::Checkpoint;
pub use monitor::{CheckpointMonitor, MonitorMode, Retention, LAST_CHECKPOINT};
