use std::path::Path;
use std::sync::mpsc;

use rand::{rngs::StdRng, SeedableRng};

use crate::checkpoint::{Checkpoint, CheckpointMonitor};
use crate::config::{HarnessConfig, RunDir};
use crate::data::{DataLoader, Dataset, FolderDataset, Split};
use crate::error::{HarnessError, Result};
use crate::model::{ChangeModel, PixelNet};
use crate::report::ReportWriter;
use crate::telemetry::JsonlSink;
use crate::train::controller::{EpochController, Loaders, OptimSetup};
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

/// Runs `epochs` epochs through an `EpochController` and hands every
/// epoch's scalars to the checkpoint monitors.
pub struct Driver<M: ChangeModel> {
    controller: EpochController<M>,
    monitors: Vec<CheckpointMonitor>,
    start_epoch: usize,
    resumed: bool,
}

impl<M: ChangeModel> Driver<M> {
    pub fn new(controller: EpochController<M>, monitors: Vec<CheckpointMonitor>) -> Self {
        Driver { controller, monitors, start_epoch: 0, resumed: false }
    }

    pub fn controller(&self) -> &EpochController<M> {
        &self.controller
    }

    pub fn monitors(&self) -> &[CheckpointMonitor] {
        &self.monitors
    }

    /// First epoch `run` will execute.
    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    /// Loads `path` and continues after the epoch it was taken at.
    pub fn resume_from(&mut self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint::load_json(path)?;
        self.controller.restore(&checkpoint)?;
        self.start_epoch = checkpoint.epoch + 1;
        self.resumed = true;
        log::info!(
            "resumed from {} (epoch {}, step {})",
            path.display(),
            checkpoint.epoch,
            checkpoint.global_step
        );
        log::warn!("best-so-far trackers are not part of a checkpoint and restart from scratch");
        Ok(())
    }

    /// Sanity check (fresh runs only), then every remaining epoch. Each
    /// epoch's checkpoint is offered to every monitor.
    pub fn run(&mut self) -> Result<Vec<EpochStats>> {
        let total = self.controller.config().epochs;
        if !self.resumed {
            self.controller.sanity_check()?;
        }
        if self.start_epoch >= total {
            log::warn!("nothing to do: start epoch {} is past the last epoch {}", self.start_epoch, total);
        }

        let mut history = Vec::with_capacity(total.saturating_sub(self.start_epoch));
        for epoch in self.start_epoch..total {
            let stats = self.controller.run_epoch(epoch)?;
            let checkpoint = self.controller.checkpoint(epoch)?;
            for monitor in &mut self.monitors {
                monitor.observe(epoch, &stats.logged, &checkpoint)?;
            }
            log::info!(
                "epoch {}/{}: tr_loss {:.4} val_loss {:.4} val_change_f1 {:.4} test_change_f1 {:.4} lr {:.2e} ({} ms)",
                epoch + 1,
                total,
                stats.train_loss,
                stats.val_loss,
                stats.val_change_f1,
                stats.test_change_f1,
                stats.learning_rate,
                stats.elapsed_ms
            );
            history.push(stats);
        }
        Ok(history)
    }
}

impl Driver<PixelNet> {
    /// Builds a complete run from `config`, reading the three splits from
    /// `dataset_config.root`.
    pub fn from_config(config: &HarnessConfig, progress_tx: Option<mpsc::Sender<EpochStats>>) -> Result<Self> {
        check_resume_path(config)?;
        let spec = &config.dataset_config;
        let open = |split: Split| -> Result<Box<dyn Dataset>> {
            Ok(Box::new(FolderDataset::open(&spec.root, spec.split_name(split), spec.binarize_labels)?))
        };
        let (train, val, test) = (open(Split::Train)?, open(Split::Val)?, open(Split::Test)?);
        Self::from_datasets(config, train, val, test, progress_tx)
    }

    /// Same as `from_config` with the three splits supplied directly.
    pub fn from_datasets(
        config: &HarnessConfig,
        train: Box<dyn Dataset>,
        val: Box<dyn Dataset>,
        test: Box<dyn Dataset>,
        progress_tx: Option<mpsc::Sender<EpochStats>>,
    ) -> Result<Self> {
        check_resume_path(config)?;
        for (name, data) in [("train", &train), ("val", &val), ("test", &test)] {
            if data.is_empty() {
                return Err(HarnessError::Config(format!("{} split has no samples", name)));
            }
        }
        if !config.gpus.is_empty() {
            log::warn!("accelerators {:?} requested; running on the CPU", config.gpus);
        }

        let run = RunDir::create(&config.work_dir, &config.exp_name)?;
        config.save_json(&run.config_copy())?;
        log::info!("run directory {}", run.root.display());

        let mut rng = StdRng::seed_from_u64(config.seed);
        let model = config.model_config.build(&mut rng);
        let (optimizer, scheduler) = config.optimizer_config.build();
        let setup = OptimSetup { loss: config.loss_config.build(), optimizer, scheduler };

        let spec = &config.dataset_config;
        let loaders = Loaders {
            train: DataLoader::new(
                train,
                spec.batch_size_for(Split::Train),
                spec.shuffle,
                spec.drop_last,
                config.seed,
            ),
            val: DataLoader::sequential(val, spec.batch_size_for(Split::Val)),
            test: DataLoader::sequential(test, spec.batch_size_for(Split::Test)),
        };

        let sink = JsonlSink::create(&run.metrics_stream())?;
        let train_config = TrainConfig {
            epochs: config.epoch,
            logging_interval: config.logging_interval,
            sanity_val_steps: config.sanity_val_steps,
            progress_bar: config.progress_bar,
            progress_tx,
        };
        let controller = EpochController::new(
            model,
            setup,
            loaders,
            &config.metric_cfg2,
            ReportWriter::new(run.root.clone(), config.epoch),
            Box::new(sink),
            train_config,
        );
        let monitors = vec![
            CheckpointMonitor::new(&config.monitor1, run.val_ckpt_dir(), config.save_top_k),
            CheckpointMonitor::new(&config.monitor2, run.test_ckpt_dir(), config.save_top_k),
        ];

        let mut driver = Driver::new(controller, monitors);
        if let Some(path) = &config.resume_ckpt_path {
            driver.resume_from(path)?;
        }
        Ok(driver)
    }
}

/// A configured resume checkpoint must exist before anything else happens.
fn check_resume_path(config: &HarnessConfig) -> Result<()> {
    match &config.resume_ckpt_path {
        Some(path) if !path.is_file() => Err(HarnessError::ResumeCheckpointMissing(path.clone())),
        _ => Ok(()),
    }
}
