pub mod optimizer;
pub mod sgd;
pub mod adamw;
pub mod scheduler;
pub mod spec;

pub use optimizer::Optimizer;
pub use sgd::Sgd;
pub use adamw::AdamW;
pub use scheduler::{LrScheduler, SchedulerSpec};
pub use spec::{OptimizerConfig, OptimizerSpec};
