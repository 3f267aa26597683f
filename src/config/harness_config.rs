use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::data::DatasetSpec;
use crate::error::{HarnessError, Result};
use crate::loss::LossSpec;
use crate::metrics::{MetricSpec, MetricTask, CHANGE_CLASS};
use crate::model::ModelSpec;
use crate::optim::OptimizerConfig;

/// Epoch-level scalars a checkpoint monitor may watch.
pub const MONITORABLE: [&str; 7] = [
    "val_change_f1",
    "test_change_f1",
    "val_f1",
    "val_miou",
    "val_oa",
    "tr_change_f1",
    "val_loss_epoch",
];

/// How often the learning rate is written to the metric stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingInterval {
    Step,
    Epoch,
}

/// Everything a run needs, loaded from one JSON file.
///
/// Unknown keys are rejected and every section without a default must be
/// present, so a broken file fails before any data is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    pub exp_name: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Total number of epochs.
    pub epoch: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Requested accelerator ids. Execution is CPU-only; the list is
    /// validated and logged.
    #[serde(default)]
    pub gpus: Vec<usize>,
    pub model_config: ModelSpec,
    pub loss_config: LossSpec,
    pub dataset_config: DatasetSpec,
    pub optimizer_config: OptimizerConfig,
    /// Overall-accuracy metric parameters.
    pub metric_cfg1: MetricSpec,
    /// Per-class metric parameters.
    pub metric_cfg2: MetricSpec,
    pub monitor1: String,
    pub monitor2: String,
    pub save_top_k: i64,
    pub logging_interval: LoggingInterval,
    #[serde(default)]
    pub resume_ckpt_path: Option<PathBuf>,
    #[serde(default = "default_sanity_steps")]
    pub sanity_val_steps: usize,
    #[serde(default = "default_true")]
    pub progress_bar: bool,
}

fn default_work_dir() -> PathBuf { PathBuf::from("work_dirs") }
fn default_seed() -> u64 { 1234 }
fn default_sanity_steps() -> usize { 2 }
fn default_true() -> bool { true }

impl HarnessConfig {
    /// Reads and validates a config file.
    pub fn load_json(path: &Path) -> Result<HarnessConfig> {
        let file = File::open(path).map_err(|e| HarnessError::io(path, e))?;
        let config: HarnessConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<HarnessConfig> {
        let config: HarnessConfig =
            serde_json::from_str(text).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| HarnessError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Number of classes shared by the model and both metric configs.
    pub fn num_classes(&self) -> usize {
        self.metric_cfg2.num_classes
    }

    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(HarnessError::Config(msg));

        if self.exp_name.trim().is_empty() {
            return fail("exp_name must not be empty".into());
        }
        if self.epoch == 0 {
            return fail("epoch must be at least 1".into());
        }
        if self.dataset_config.batch_size == 0 || self.dataset_config.eval_batch_size == Some(0) {
            return fail("batch sizes must be at least 1".into());
        }

        let classes = self.model_config.num_classes();
        if classes <= CHANGE_CLASS {
            return fail(format!("need at least {} classes to have a change class, got {}", CHANGE_CLASS + 1, classes));
        }
        for (name, spec) in [("metric_cfg1", &self.metric_cfg1), ("metric_cfg2", &self.metric_cfg2)] {
            if spec.num_classes != classes {
                return fail(format!("{}.num_classes is {} but the model has {} classes", name, spec.num_classes, classes));
            }
            if spec.task == MetricTask::Binary && classes != 2 {
                return fail(format!("{} is binary but the model has {} classes", name, classes));
            }
        }
        if self.metric_cfg1.ignore_index != self.metric_cfg2.ignore_index {
            return fail("metric_cfg1 and metric_cfg2 disagree on ignore_index".into());
        }

        let LossSpec::CrossEntropy { class_weights, ignore_index } = &self.loss_config;
        if *ignore_index != self.metric_cfg2.ignore_index {
            return fail(format!(
                "loss_config.ignore_index {:?} differs from the metrics' ignore_index {:?}",
                ignore_index, self.metric_cfg2.ignore_index
            ));
        }
        if let Some(w) = class_weights {
            if w.len() != classes {
                return fail(format!("loss_config has {} class weights for {} classes", w.len(), classes));
            }
            if w.iter().any(|&x| !(x.is_finite() && x >= 0.0)) {
                return fail("class weights must be finite and non-negative".into());
            }
        }

        if !(self.optimizer_config.optimizer.lr() > 0.0) {
            return fail("optimizer lr must be positive".into());
        }

        for (name, monitor) in [("monitor1", &self.monitor1), ("monitor2", &self.monitor2)] {
            if !MONITORABLE.contains(&monitor.as_str()) {
                return fail(format!("{} `{}` is not one of {:?}", name, monitor, MONITORABLE));
            }
        }
        if self.save_top_k < -1 {
            return fail(format!("save_top_k must be -1 or more, got {}", self.save_top_k));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "exp_name": "unit",
            "epoch": 3,
            "gpus": [0],
            "model_config": { "type": "pixel_mlp", "in_channels": 3, "hidden": [8], "num_classes": 2 },
            "loss_config": { "type": "cross_entropy" },
            "dataset_config": { "root": "data/LEVIR-CD", "batch_size": 4 },
            "optimizer_config": {
                "optimizer": { "type": "sgd", "lr": 0.01, "momentum": 0.9 },
                "scheduler": { "type": "cosine_warm_restarts", "t_0": 15, "t_mult": 2, "eta_min": 1e-5 }
            },
            "metric_cfg1": { "task": "binary", "num_classes": 2 },
            "metric_cfg2": { "task": "multiclass", "num_classes": 2 },
            "monitor1": "val_change_f1",
            "monitor2": "test_change_f1",
            "save_top_k": 3,
            "logging_interval": "epoch",
            "resume_ckpt_path": null
        }"#
        .to_string()
    }

    #[test]
    fn parses_with_defaults() {
        let cfg = HarnessConfig::from_json_str(&sample_json()).unwrap();
        assert_eq!(cfg.seed, 1234);
        assert_eq!(cfg.work_dir, PathBuf::from("work_dirs"));
        assert_eq!(cfg.sanity_val_steps, 2);
        assert_eq!(cfg.dataset_config.train_split, "train");
        assert!(cfg.dataset_config.binarize_labels);
    }

    #[test]
    fn missing_section_is_a_config_error() {
        let text = sample_json().replace(r#""monitor2": "test_change_f1","#, "");
        assert!(matches!(HarnessConfig::from_json_str(&text), Err(HarnessError::Config(_))));
    }

    #[test]
    fn unknown_monitor_is_rejected() {
        let text = sample_json().replace(r#""monitor1": "val_change_f1""#, r#""monitor1": "val_acc""#);
        assert!(matches!(HarnessConfig::from_json_str(&text), Err(HarnessError::Config(_))));
    }

    #[test]
    fn class_count_mismatch_is_rejected() {
        let text = sample_json().replace(
            r#"{ "task": "multiclass", "num_classes": 2 }"#,
            r#"{ "task": "multiclass", "num_classes": 3 }"#,
        );
        assert!(HarnessConfig::from_json_str(&text).is_err());
    }

    #[test]
    fn loss_and_metric_ignore_index_must_agree() {
        let text = sample_json().replace(
            r#"{ "type": "cross_entropy" }"#,
            r#"{ "type": "cross_entropy", "ignore_index": 255 }"#,
        );
        let err = HarnessConfig::from_json_str(&text).unwrap_err();
        assert!(matches!(err, HarnessError::Config(msg) if msg.contains("ignore_index")));

        let agreed = text
            .replace(r#""task": "binary", "num_classes": 2"#, r#""task": "binary", "num_classes": 2, "ignore_index": 255"#)
            .replace(
                r#""task": "multiclass", "num_classes": 2"#,
                r#""task": "multiclass", "num_classes": 2, "ignore_index": 255"#,
            );
        assert!(HarnessConfig::from_json_str(&agreed).is_ok());
    }

    #[test]
    fn zero_epochs_is_rejected() {
        let text = sample_json().replace(r#""epoch": 3"#, r#""epoch": 0"#);
        assert!(HarnessConfig::from_json_str(&text).is_err());
    }
}
