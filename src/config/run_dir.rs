use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// Directory layout of one run: `<work_dir>/<exp_name>/version_<N>/`.
///
/// ```text
/// version_N/
///   config.json
///   train_metrics.txt  val_metrics.txt
///   test_metrics_rest.txt  test_metrics_max.txt
///   log/metrics.jsonl
///   ckpts/val/  ckpts/test/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    pub root: PathBuf,
}

impl RunDir {
    /// Creates the next free `version_<N>` under `<work_dir>/<exp_name>`.
    pub fn create(work_dir: &Path, exp_name: &str) -> Result<RunDir> {
        let exp_dir = work_dir.join(exp_name);
        fs::create_dir_all(&exp_dir).map_err(|e| HarnessError::io(&exp_dir, e))?;

        let next = fs::read_dir(&exp_dir)
            .map_err(|e| HarnessError::io(&exp_dir, e))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("version_"))
                    .and_then(|n| n.parse::<usize>().ok())
            })
            .max()
            .map_or(0, |n| n + 1);

        let run = RunDir { root: exp_dir.join(format!("version_{}", next)) };
        for dir in [run.root.clone(), run.log_dir(), run.val_ckpt_dir(), run.test_ckpt_dir()] {
            fs::create_dir_all(&dir).map_err(|e| HarnessError::io(&dir, e))?;
        }
        Ok(run)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn metrics_stream(&self) -> PathBuf {
        self.log_dir().join("metrics.jsonl")
    }

    pub fn val_ckpt_dir(&self) -> PathBuf {
        self.root.join("ckpts").join("val")
    }

    pub fn test_ckpt_dir(&self) -> PathBuf {
        self.root.join("ckpts").join("test")
    }

    pub fn config_copy(&self) -> PathBuf {
        self.root.join("config.json")
    }
}
