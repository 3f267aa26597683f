use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{HarnessError, Result};

/// Everything needed to continue a run after the epoch it was taken at.
///
/// Best-so-far trackers are deliberately not part of it; a resumed run
/// starts its "best" bookkeeping from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last completed epoch (0-based).
    pub epoch: usize,
    pub global_step: u64,
    pub model: serde_json::Value,
    pub optimizer: serde_json::Value,
    pub scheduler: serde_json::Value,
}

impl Checkpoint {
    /// Serializes the checkpoint to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| HarnessError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a checkpoint written by `save_json`. A missing file is reported
    /// as `ResumeCheckpointMissing` so callers can fail before training.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        if !path.is_file() {
            return Err(HarnessError::ResumeCheckpointMissing(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| HarnessError::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
