pub mod sink;

pub use sink::{JsonlSink, MemorySink, MetricRecord, MetricSink};
