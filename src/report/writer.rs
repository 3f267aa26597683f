use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};
use crate::metrics::{AggregateMetrics, ClassMetrics};
use crate::report::table::ReportTable;
use crate::train::Mode;

pub const TRAIN_FILE: &str = "train_metrics.txt";
pub const VAL_FILE: &str = "val_metrics.txt";
pub const TEST_LATEST_FILE: &str = "test_metrics_rest.txt";
pub const TEST_BEST_FILE: &str = "test_metrics_max.txt";

/// Appends formatted metric tables to the run's per-mode report files.
///
/// Whether a test report is a new best is decided by the caller
/// (see `RunningBest`); this type only routes text to files.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    total_epochs: usize,
    echo: bool,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, total_epochs: usize) -> Self {
        ReportWriter { dir: dir.into(), total_epochs, echo: true }
    }

    /// Disables console echo of val/test tables.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files a report for `mode` is appended to.
    pub fn targets(mode: Mode, new_test_best: bool) -> Vec<&'static str> {
        match mode {
            Mode::Train => vec![TRAIN_FILE],
            Mode::Val => vec![VAL_FILE],
            Mode::Test if new_test_best => vec![TEST_LATEST_FILE, TEST_BEST_FILE],
            Mode::Test => vec![TEST_LATEST_FILE],
        }
    }

    /// Formats `metrics`, echoes val/test tables to the console and appends
    /// the table under an `epoch:<e>/<total> <mode>` line to every target file.
    pub fn report(
        &self,
        mode: Mode,
        epoch: usize,
        metrics: &ClassMetrics,
        aggregate: &AggregateMetrics,
        new_test_best: bool,
    ) -> Result<ReportTable> {
        let table = ReportTable::new(metrics, aggregate);
        let rendered = table.to_string();

        if self.echo && mode != Mode::Train {
            println!("{}", mode);
            println!("{}", rendered);
        }

        fs::create_dir_all(&self.dir).map_err(|e| HarnessError::io(&self.dir, e))?;
        for name in Self::targets(mode, new_test_best) {
            let path = self.dir.join(name);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| HarnessError::io(&path, e))?;
            write!(file, "epoch:{}/{} {}\n{}\n", epoch, self.total_epochs, mode, rendered)
                .map_err(|e| HarnessError::io(&path, e))?;
        }
        log::debug!("{} report for epoch {} written to {}", mode, epoch, self.dir.display());

        Ok(table)
    }
}
