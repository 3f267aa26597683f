use std::path::PathBuf;

use thiserror::Error;

/// Every failure the harness can surface. Nothing in the training core
/// swallows one of these; they abort the enclosing phase or the run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Batch tensors disagree in shape, or a sample cannot be collated.
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    /// A predicted or ground-truth label falls outside `[0, num_classes)`.
    #[error("{which} label {label} out of range for {num_classes} classes")]
    LabelOutOfRange {
        which: &'static str,
        label: usize,
        num_classes: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("resume checkpoint not found: {}", .0.display())]
    ResumeCheckpointMissing(PathBuf),

    /// A checkpoint monitor asked for a scalar that was not logged this epoch.
    #[error("monitored metric `{0}` was not logged this epoch")]
    MissingMonitor(String),

    #[error("phase out of order: expected {expected}, got {requested}")]
    PhaseOrder {
        expected: &'static str,
        requested: &'static str,
    },

    /// A phase was started while its accumulator still held a previous
    /// (aborted) phase's statistics.
    #[error("{0} accumulator holds stale statistics; reset it before reuse")]
    DirtyAccumulator(&'static str),

    #[error("model state error: {0}")]
    ModelState(String),

    #[error("cannot parse report table: {0}")]
    ReportParse(String),

    /// A metric sink could not accept a record.
    #[error("metric sink error: {0}")]
    Telemetry(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
