pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod data;
pub mod model;
pub mod loss;
pub mod optim;
pub mod metrics;
pub mod report;
pub mod checkpoint;
pub mod telemetry;
pub mod config;
pub mod train;

// Convenience re-exports
pub use error::{HarnessError, Result};
pub use math::matrix::Matrix;
pub use data::{Batch, ClassScores, DataLoader, LabelMask, PixelTensor};
pub use model::{ChangeModel, PixelNet};
pub use metrics::{ClassMetrics, ConfusionAccumulator};
pub use report::{ReportTable, ReportWriter};
pub use checkpoint::{Checkpoint, CheckpointMonitor, RunningBest};
pub use config::HarnessConfig;
pub use train::{Driver, EpochController, EpochStats, Mode};
