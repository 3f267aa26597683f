use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::checkpoint::Checkpoint;
use crate::error::{HarnessError, Result};

pub const LAST_CHECKPOINT: &str = "last.ckpt";

/// What a top-K monitor does with a new score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Not good enough, or retention is disabled.
    Skip,
    /// Room left; keep it.
    Insert,
    /// At capacity; evict the retained entry at this index.
    Replace(usize),
}

/// Which direction of a monitored scalar counts as better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Max,
    Min,
}

impl MonitorMode {
    /// Losses are minimised; every other logged scalar is maximised.
    pub fn for_key(monitor: &str) -> Self {
        if monitor.contains("loss") {
            MonitorMode::Min
        } else {
            MonitorMode::Max
        }
    }

    /// Orders `a` before `b` when `a` is the better score.
    fn better_first(self, a: f64, b: f64) -> std::cmp::Ordering {
        match self {
            MonitorMode::Max => b.total_cmp(&a),
            MonitorMode::Min => a.total_cmp(&b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Retained {
    score: f64,
    epoch: usize,
    path: PathBuf,
}

/// Keeps the K checkpoints with the best value of one logged scalar, plus
/// an always-refreshed `last.ckpt`, inside its own directory. "Best" is the
/// highest value, or the lowest for loss keys (see `MonitorMode::for_key`).
#[derive(Debug, Clone)]
pub struct CheckpointMonitor {
    monitor: String,
    mode: MonitorMode,
    dir: PathBuf,
    /// `-1` keeps every checkpoint, `0` keeps none (only `last.ckpt`).
    save_top_k: i64,
    retained: Vec<Retained>,
}

impl CheckpointMonitor {
    pub fn new(monitor: impl Into<String>, dir: impl Into<PathBuf>, save_top_k: i64) -> Self {
        let monitor = monitor.into();
        let mode = MonitorMode::for_key(&monitor);
        CheckpointMonitor { monitor, mode, dir: dir.into(), save_top_k, retained: Vec::new() }
    }

    pub fn monitor(&self) -> &str {
        &self.monitor
    }

    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a retained checkpoint, e.g. `val_change_f1=0.8123-epoch=7.ckpt`.
    pub fn filename(monitor: &str, score: f64, epoch: usize) -> String {
        format!("{}={:.4}-epoch={}.ckpt", monitor, score, epoch)
    }

    /// Retained `(score, epoch)` pairs, best first.
    pub fn retained(&self) -> Vec<(f64, usize)> {
        let mut v: Vec<(f64, usize)> = self.retained.iter().map(|r| (r.score, r.epoch)).collect();
        v.sort_by(|a, b| self.mode.better_first(a.0, b.0).then(b.1.cmp(&a.1)));
        v
    }

    pub fn best(&self) -> Option<f64> {
        self.retained.iter().map(|r| r.score).min_by(|a, b| self.mode.better_first(*a, *b))
    }

    /// Top-K decision for `score`, without touching the filesystem.
    ///
    /// At capacity the worst retained entry (oldest among equal scores) is
    /// evicted when `score` is at least as good, so ties favour recency.
    pub fn decide(&self, score: f64) -> Retention {
        if self.save_top_k == 0 || score.is_nan() {
            return Retention::Skip;
        }
        if self.save_top_k < 0 || (self.retained.len() as i64) < self.save_top_k {
            return Retention::Insert;
        }
        let worst = self
            .retained
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| self.mode.better_first(a.score, b.score).then(b.epoch.cmp(&a.epoch)))
            .map(|(i, r)| (i, r.score));
        match worst {
            Some((i, worst_score)) if self.mode.better_first(score, worst_score).is_le() => Retention::Replace(i),
            _ => Retention::Skip,
        }
    }

    /// Looks up this monitor's scalar in `metrics`, applies the top-K
    /// decision, and writes `last.ckpt`. Returns the path of the retained
    /// checkpoint when one was written.
    pub fn observe(
        &mut self,
        epoch: usize,
        metrics: &BTreeMap<String, f64>,
        checkpoint: &Checkpoint,
    ) -> Result<Option<PathBuf>> {
        let score = *metrics
            .get(&self.monitor)
            .ok_or_else(|| HarnessError::MissingMonitor(self.monitor.clone()))?;

        fs::create_dir_all(&self.dir).map_err(|e| HarnessError::io(&self.dir, e))?;

        let saved = match self.decide(score) {
            Retention::Skip => None,
            decision => {
                if let Retention::Replace(i) = decision {
                    let evicted = self.retained.swap_remove(i);
                    if evicted.path.exists() {
                        fs::remove_file(&evicted.path).map_err(|e| HarnessError::io(&evicted.path, e))?;
                    }
                    log::debug!("{}: evicted {}", self.monitor, evicted.path.display());
                }
                let path = self.dir.join(Self::filename(&self.monitor, score, epoch));
                checkpoint.save_json(&path)?;
                self.retained.push(Retained { score, epoch, path: path.clone() });
                log::info!("{} = {:.4} at epoch {}: saved {}", self.monitor, score, epoch, path.display());
                Some(path)
            }
        };

        checkpoint.save_json(&self.dir.join(LAST_CHECKPOINT))?;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ckpt(epoch: usize) -> Checkpoint {
        Checkpoint {
            epoch,
            global_step: 0,
            model: serde_json::Value::Null,
            optimizer: serde_json::Value::Null,
            scheduler: serde_json::Value::Null,
        }
    }

    fn metrics(v: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([("val_change_f1".to_string(), v)])
    }

    #[test]
    fn keeps_the_k_best_and_evicts_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut mon = CheckpointMonitor::new("val_change_f1", dir.path(), 2);
        for (epoch, v) in [0.1, 0.5, 0.3, 0.7].into_iter().enumerate() {
            mon.observe(epoch, &metrics(v), &ckpt(epoch)).unwrap();
        }
        assert_eq!(mon.retained(), vec![(0.7, 3), (0.5, 1)]);
        assert!(dir.path().join("val_change_f1=0.7000-epoch=3.ckpt").exists());
        assert!(dir.path().join("val_change_f1=0.5000-epoch=1.ckpt").exists());
        assert!(!dir.path().join("val_change_f1=0.1000-epoch=0.ckpt").exists());
        assert!(!dir.path().join("val_change_f1=0.3000-epoch=2.ckpt").exists());
        assert_eq!(Checkpoint::load_json(&dir.path().join(LAST_CHECKPOINT)).unwrap().epoch, 3);
    }

    #[test]
    fn ties_at_capacity_go_to_the_later_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut mon = CheckpointMonitor::new("val_change_f1", dir.path(), 1);
        mon.observe(0, &metrics(0.5), &ckpt(0)).unwrap();
        let saved = mon.observe(1, &metrics(0.5), &ckpt(1)).unwrap();
        assert!(saved.is_some());
        assert_eq!(mon.retained(), vec![(0.5, 1)]);
    }

    #[test]
    fn zero_keeps_only_last_and_negative_keeps_all() {
        let none = CheckpointMonitor::new("m", "unused", 0);
        assert_eq!(none.decide(1.0), Retention::Skip);

        let dir = tempfile::tempdir().unwrap();
        let mut all = CheckpointMonitor::new("val_change_f1", dir.path(), -1);
        for epoch in 0..4 {
            all.observe(epoch, &metrics(0.1), &ckpt(epoch)).unwrap();
        }
        assert_eq!(all.retained().len(), 4);
    }

    #[test]
    fn loss_monitors_keep_the_lowest_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut mon = CheckpointMonitor::new("val_loss_epoch", dir.path(), 1);
        assert_eq!(mon.mode(), MonitorMode::Min);
        for (epoch, v) in [0.9, 0.5, 0.2].into_iter().enumerate() {
            let logged = BTreeMap::from([("val_loss_epoch".to_string(), v)]);
            mon.observe(epoch, &logged, &ckpt(epoch)).unwrap();
        }
        assert_eq!(mon.retained(), vec![(0.2, 2)]);
        assert_eq!(mon.best(), Some(0.2));
        assert!(dir.path().join("val_loss_epoch=0.2000-epoch=2.ckpt").exists());
        assert!(!dir.path().join("val_loss_epoch=0.9000-epoch=0.ckpt").exists());
        assert_eq!(mon.decide(0.3), Retention::Skip);
    }

    #[test]
    fn missing_monitor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut mon = CheckpointMonitor::new("test_change_f1", dir.path(), 1);
        let err = mon.observe(0, &metrics(0.3), &ckpt(0)).unwrap_err();
        assert!(matches!(err, HarnessError::MissingMonitor(name) if name == "test_change_f1"));
    }
}
