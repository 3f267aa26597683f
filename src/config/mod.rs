pub mod harness_config;
pub mod run_dir;

pub use harness_config::{HarnessConfig, LoggingInterval, MONITORABLE};
pub use run_dir::RunDir;
