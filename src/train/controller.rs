use std::collections::BTreeMap;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::checkpoint::{Checkpoint, RunningBest};
use crate::config::LoggingInterval;
use crate::data::DataLoader;
use crate::error::{HarnessError, Result};
use crate::loss::PixelLoss;
use crate::metrics::{AggregateMetrics, ClassMetrics, ConfusionAccumulator, MetricSpec};
use crate::model::ChangeModel;
use crate::optim::{LrScheduler, Optimizer};
use crate::report::ReportWriter;
use crate::telemetry::{MetricRecord, MetricSink};
use crate::train::epoch_stats::EpochStats;
use crate::train::mode::Mode;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// The three loaders a run iterates over. The test loader is never shuffled.
pub struct Loaders {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: DataLoader,
}

/// Objective and update rule.
pub struct OptimSetup {
    pub loss: Box<dyn PixelLoss>,
    pub optimizer: Box<dyn Optimizer>,
    pub scheduler: LrScheduler,
}

/// Which phase of the epoch the controller will accept next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Training,
    ValidationAndEmbeddedTest,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Training => "training",
            Phase::ValidationAndEmbeddedTest => "validation",
        }
    }
}

/// Result of one closed phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub mean_loss: f64,
    pub metrics: ClassMetrics,
    pub aggregate: AggregateMetrics,
    pub change_f1: f64,
}

/// Validation results plus the change F1 of the embedded test pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub val: PhaseOutcome,
    pub test_change_f1: f64,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Runs the per-epoch state machine: a training phase, then validation
/// followed by a full pass over the test split, strictly alternating.
///
/// Each phase owns one `ConfusionAccumulator`. A phase closes by computing
/// its metrics, writing the report, emitting the epoch scalars and resetting
/// the accumulator. A phase that fails part-way leaves its accumulator
/// filled; the next attempt is refused with `DirtyAccumulator` until
/// `reset_accumulators` is called. Once validation has closed for an epoch,
/// a retry of the validation phase for that epoch only repeats the test pass.
pub struct EpochController<M: ChangeModel> {
    model: M,
    loss: Box<dyn PixelLoss>,
    optimizer: Box<dyn Optimizer>,
    scheduler: LrScheduler,
    loaders: Loaders,
    train_metrics: ConfusionAccumulator,
    val_metrics: ConfusionAccumulator,
    test_metrics: ConfusionAccumulator,
    reports: ReportWriter,
    val_best: RunningBest,
    test_best: RunningBest,
    sink: Box<dyn MetricSink>,
    config: TrainConfig,
    global_step: u64,
    next_phase: Phase,
    /// Validation already committed for this epoch while its test pass is
    /// still outstanding.
    closed_val: Option<(usize, PhaseOutcome)>,
    logged: BTreeMap<String, f64>,
}

impl<M: ChangeModel> EpochController<M> {
    pub fn new(
        model: M,
        setup: OptimSetup,
        loaders: Loaders,
        metric: &MetricSpec,
        reports: ReportWriter,
        sink: Box<dyn MetricSink>,
        config: TrainConfig,
    ) -> Self {
        EpochController {
            model,
            loss: setup.loss,
            optimizer: setup.optimizer,
            scheduler: setup.scheduler,
            loaders,
            train_metrics: ConfusionAccumulator::from_spec(metric),
            val_metrics: ConfusionAccumulator::from_spec(metric),
            test_metrics: ConfusionAccumulator::from_spec(metric),
            reports,
            val_best: RunningBest::new(),
            test_best: RunningBest::new(),
            sink,
            config,
            global_step: 0,
            next_phase: Phase::Training,
            closed_val: None,
            logged: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn next_phase(&self) -> Phase {
        self.next_phase
    }

    /// Best validation change F1 seen by this controller.
    pub fn val_best(&self) -> &RunningBest {
        &self.val_best
    }

    /// Best test change F1 seen by this controller.
    pub fn test_best(&self) -> &RunningBest {
        &self.test_best
    }

    pub fn accumulator(&self, mode: Mode) -> &ConfusionAccumulator {
        match mode {
            Mode::Train => &self.train_metrics,
            Mode::Val => &self.val_metrics,
            Mode::Test => &self.test_metrics,
        }
    }

    fn accumulator_mut(&mut self, mode: Mode) -> &mut ConfusionAccumulator {
        match mode {
            Mode::Train => &mut self.train_metrics,
            Mode::Val => &mut self.val_metrics,
            Mode::Test => &mut self.test_metrics,
        }
    }

    /// Clears all three accumulators, e.g. after a failed phase.
    pub fn reset_accumulators(&mut self) {
        self.train_metrics.reset();
        self.val_metrics.reset();
        self.test_metrics.reset();
    }

    fn ensure_phase(&self, requested: Phase) -> Result<()> {
        if self.next_phase != requested {
            return Err(HarnessError::PhaseOrder {
                expected: self.next_phase.name(),
                requested: requested.name(),
            });
        }
        Ok(())
    }

    fn ensure_clean(&self, mode: Mode) -> Result<()> {
        if !self.accumulator(mode).is_empty() {
            return Err(HarnessError::DirtyAccumulator(mode.label()));
        }
        Ok(())
    }

    /// Emits an epoch-level scalar and remembers it for the checkpoint
    /// monitors.
    fn log_epoch(&mut self, name: String, value: f64, epoch: usize) -> Result<()> {
        emit(self.sink.as_mut(), name.clone(), value, self.global_step, epoch)?;
        self.logged.insert(name, value);
        Ok(())
    }

    fn lr_key(&self) -> String {
        format!("lr-{}", self.optimizer.name())
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Runs up to `sanity_val_steps` validation batches and discards the
    /// result. Nothing is reported or emitted.
    pub fn sanity_check(&mut self) -> Result<()> {
        let steps = self.config.sanity_val_steps;
        if steps == 0 {
            return Ok(());
        }
        self.ensure_clean(Mode::Val)?;

        let mut ran = 0;
        for batch in self.loaders.val.iter().take(steps) {
            let batch = batch?;
            let scores = self.model.predict(&batch.image_a, &batch.image_b)?;
            self.loss.loss(&scores, &batch.mask)?;
            self.val_metrics.update(&scores.argmax(), &batch.mask)?;
            ran += 1;
        }
        self.val_metrics.reset();
        log::info!("sanity check passed on {} validation batch(es)", ran);
        Ok(())
    }

    pub fn run_training_phase(&mut self, epoch: usize) -> Result<PhaseOutcome> {
        self.ensure_phase(Phase::Training)?;
        self.ensure_clean(Mode::Train)?;
        self.logged.clear();

        let lr_key = self.lr_key();
        let per_step_lr = self.config.logging_interval == LoggingInterval::Step;
        let bar = progress_bar(self.config.progress_bar, self.loaders.train.len() as u64, "train");
        let mut mean = RunningMean::default();

        for batch in self.loaders.train.iter() {
            let batch = batch?;
            let scores = self.model.forward(&batch.image_a, &batch.image_b)?;
            let loss = self.loss.loss(&scores, &batch.mask)?;
            self.train_metrics.update(&scores.argmax(), &batch.mask)?;
            emit(self.sink.as_mut(), "tr_loss_step".into(), loss, self.global_step, epoch)?;

            let grad = self.loss.derivative(&scores, &batch.mask)?;
            self.model.backward(&grad, self.optimizer.as_mut())?;
            self.global_step += 1;
            if per_step_lr {
                let lr = self.optimizer.learning_rate();
                emit(self.sink.as_mut(), lr_key.clone(), lr, self.global_step, epoch)?;
            }

            mean.push(loss, batch.len());
            bar.set_message(format!("loss {:.4}", loss));
            bar.inc(1);
        }
        bar.finish_and_clear();

        let outcome = self.close_phase(Mode::Train, epoch, mean.value())?;
        self.next_phase = Phase::ValidationAndEmbeddedTest;
        Ok(outcome)
    }

    /// Validation over the val split, then the embedded test pass. If the
    /// test pass failed on an earlier attempt for the same epoch, the
    /// committed validation result is reused and only the test pass runs.
    pub fn run_validation_phase(&mut self, epoch: usize) -> Result<ValidationOutcome> {
        self.ensure_phase(Phase::ValidationAndEmbeddedTest)?;
        let val = match self.closed_val.take() {
            Some((closed, val)) if closed == epoch => {
                log::info!("epoch {}: validation already reported; repeating the test pass", epoch);
                val
            }
            _ => self.run_val_pass(epoch)?,
        };
        self.closed_val = Some((epoch, val.clone()));

        let test_change_f1 = self.run_test_pass(epoch)?;
        self.closed_val = None;
        self.next_phase = Phase::Training;
        Ok(ValidationOutcome { val, test_change_f1 })
    }

    fn run_val_pass(&mut self, epoch: usize) -> Result<PhaseOutcome> {
        self.ensure_clean(Mode::Val)?;

        let bar = progress_bar(self.config.progress_bar, self.loaders.val.len() as u64, "val");
        let mut mean = RunningMean::default();

        for batch in self.loaders.val.iter() {
            let batch = batch?;
            let scores = self.model.predict(&batch.image_a, &batch.image_b)?;
            let loss = self.loss.loss(&scores, &batch.mask)?;
            self.val_metrics.update(&scores.argmax(), &batch.mask)?;
            emit(self.sink.as_mut(), "val_loss_step".into(), loss, self.global_step, epoch)?;
            mean.push(loss, batch.len());
            bar.inc(1);
        }
        bar.finish_and_clear();

        self.close_phase(Mode::Val, epoch, mean.value())
    }

    /// Full pass over the test split with the current weights. Returns the
    /// change-class F1, which is also emitted as `test_change_f1`. Only
    /// reachable from `run_validation_phase`.
    fn run_test_pass(&mut self, epoch: usize) -> Result<f64> {
        self.ensure_clean(Mode::Test)?;

        let bar = progress_bar(self.config.progress_bar, self.loaders.test.len() as u64, "test");
        for batch in self.loaders.test.iter() {
            let batch = batch?;
            let scores = self.model.predict(&batch.image_a, &batch.image_b)?;
            self.test_metrics.update(&scores.argmax(), &batch.mask)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        let outcome = self.close_phase(Mode::Test, epoch, None)?;
        Ok(outcome.change_f1)
    }

    /// compute → report → emit → reset.
    fn close_phase(&mut self, mode: Mode, epoch: usize, mean_loss: Option<f64>) -> Result<PhaseOutcome> {
        let metrics = self.accumulator(mode).compute();
        let aggregate = metrics.aggregate();
        let change_f1 = metrics.change_f1();

        let new_best = match mode {
            Mode::Train => false,
            Mode::Val => self.val_best.observe(change_f1),
            Mode::Test => self.test_best.observe(change_f1),
        };
        if new_best {
            log::info!("epoch {}: new best {} = {:.4}", epoch, mode.change_f1_key(), change_f1);
        }
        self.reports.report(mode, epoch, &metrics, &aggregate, mode == Mode::Test && new_best)?;

        if mode != Mode::Test {
            for (name, value) in aggregate.named(mode.prefix()) {
                self.log_epoch(name, value, epoch)?;
            }
        }
        self.log_epoch(mode.change_f1_key(), change_f1, epoch)?;
        if let Some(loss) = mean_loss {
            self.log_epoch(format!("{}_loss_epoch", mode.prefix()), loss, epoch)?;
        }

        self.accumulator_mut(mode).reset();
        Ok(PhaseOutcome { mean_loss: mean_loss.unwrap_or(0.0), metrics, aggregate, change_f1 })
    }

    /// One full epoch: training, validation with the embedded test pass,
    /// then one scheduler step driven by `val_change_f1`.
    pub fn run_epoch(&mut self, epoch: usize) -> Result<EpochStats> {
        let started = Instant::now();
        self.ensure_phase(Phase::Training)?;

        if self.config.logging_interval == LoggingInterval::Epoch {
            let lr = self.optimizer.learning_rate();
            let key = self.lr_key();
            emit(self.sink.as_mut(), key, lr, self.global_step, epoch)?;
        }
        let train = self.run_training_phase(epoch)?;
        let validation = self.run_validation_phase(epoch)?;

        let signal = self.scheduler.needs_signal().then_some(validation.val.change_f1);
        let lr = self.scheduler.step(signal);
        self.optimizer.set_learning_rate(lr);
        self.sink.flush()?;

        let stats = EpochStats {
            epoch,
            total_epochs: self.config.epochs,
            train_loss: train.mean_loss,
            val_loss: validation.val.mean_loss,
            train: train.aggregate,
            val: validation.val.aggregate,
            train_change_f1: train.change_f1,
            val_change_f1: validation.val.change_f1,
            test_change_f1: validation.test_change_f1,
            learning_rate: lr,
            elapsed_ms: started.elapsed().as_millis() as u64,
            logged: self.logged.clone(),
        };

        if let Some(tx) = &self.config.progress_tx {
            if tx.send(stats.clone()).is_err() {
                log::debug!("progress receiver dropped; no further epoch summaries are sent");
                self.config.progress_tx = None;
            }
        }
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Snapshot taken after `epoch` completed.
    pub fn checkpoint(&self, epoch: usize) -> Result<Checkpoint> {
        Ok(Checkpoint {
            epoch,
            global_step: self.global_step,
            model: self.model.state()?,
            optimizer: self.optimizer.state()?,
            scheduler: self.scheduler.state()?,
        })
    }

    /// Restores weights, optimizer and scheduler. Accumulators are cleared
    /// and the next phase is training.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.model.load_state(checkpoint.model.clone())?;
        self.optimizer.load_state(checkpoint.optimizer.clone())?;
        self.scheduler.load_state(checkpoint.scheduler.clone())?;
        self.optimizer.set_learning_rate(self.scheduler.lr());
        self.global_step = checkpoint.global_step;
        self.next_phase = Phase::Training;
        self.closed_val = None;
        self.reset_accumulators();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn emit(sink: &mut dyn MetricSink, name: String, value: f64, step: u64, epoch: usize) -> Result<()> {
    sink.emit(MetricRecord { name, value, step, epoch })
}

/// Sample-weighted mean of per-batch losses.
#[derive(Default)]
struct RunningMean {
    total: f64,
    count: usize,
}

impl RunningMean {
    fn push(&mut self, loss: f64, samples: usize) {
        self.total += loss * samples as f64;
        self.count += samples;
    }

    /// `None` when no batch was seen.
    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

fn progress_bar(enabled: bool, len: u64, label: &'static str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{prefix:>5} [{bar:30}] {pos}/{len} {elapsed_precise} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let bar = ProgressBar::new(len).with_style(style);
    bar.set_prefix(label);
    bar
}
