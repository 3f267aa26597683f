pub mod mode;
pub mod epoch_stats;
pub mod train_config;
pub mod controller;
pub mod driver;

pub use mode::Mode;
pub use epoch_stats::EpochStats;
pub use train_config::TrainConfig;
pub use controller::{EpochController, Loaders, OptimSetup, Phase, PhaseOutcome, ValidationOutcome};
pub use driver::Driver;
