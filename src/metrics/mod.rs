pub mod accumulator;
pub mod class_metrics;

pub use accumulator::{ConfusionAccumulator, MetricSpec, MetricTask};
pub use class_metrics::{AggregateMetrics, ClassMetrics, CHANGE_CLASS};
