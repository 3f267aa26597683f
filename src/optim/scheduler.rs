use std::f64::consts::PI;

use serde::{Serialize, Deserialize};

use crate::error::Result;

/// Learning-rate schedule, stepped once per epoch after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum SchedulerSpec {
    #[default]
    Constant,
    /// Cosine annealing with warm restarts: the first cycle lasts `t_0`
    /// epochs and each following cycle is `t_mult` times longer.
    CosineWarmRestarts {
        t_0: usize,
        #[serde(default = "default_t_mult")]
        t_mult: usize,
        #[serde(default)]
        eta_min: f64,
    },
    /// Multiplies the rate by `factor` after `patience` epochs without a
    /// relative improvement of `threshold` in the monitored scalar (mode max).
    ReduceOnPlateau {
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default = "default_patience")]
        patience: usize,
        #[serde(default)]
        min_lr: f64,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

fn default_t_mult() -> usize { 1 }
fn default_factor() -> f64 { 0.1 }
fn default_patience() -> usize { 10 }
fn default_threshold() -> f64 { 1e-4 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrScheduler {
    spec: SchedulerSpec,
    base_lr: f64,
    lr: f64,
    // cosine cycle position
    t_cur: usize,
    t_i: usize,
    // plateau tracking
    best: Option<f64>,
    bad_epochs: usize,
}

impl LrScheduler {
    pub fn new(spec: SchedulerSpec, base_lr: f64) -> Self {
        let t_i = match &spec {
            SchedulerSpec::CosineWarmRestarts { t_0, .. } => (*t_0).max(1),
            _ => 1,
        };
        LrScheduler { spec, base_lr, lr: base_lr, t_cur: 0, t_i, best: None, bad_epochs: 0 }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Whether `step` expects the monitored validation scalar.
    pub fn needs_signal(&self) -> bool {
        matches!(self.spec, SchedulerSpec::ReduceOnPlateau { .. })
    }

    /// Advances one epoch and returns the learning rate for the next one.
    pub fn step(&mut self, signal: Option<f64>) -> f64 {
        match self.spec {
            SchedulerSpec::Constant => {}
            SchedulerSpec::CosineWarmRestarts { t_mult, eta_min, .. } => {
                self.t_cur += 1;
                if self.t_cur >= self.t_i {
                    self.t_cur -= self.t_i;
                    self.t_i *= t_mult.max(1);
                }
                let progress = self.t_cur as f64 / self.t_i as f64;
                self.lr = eta_min + (self.base_lr - eta_min) * (1.0 + (PI * progress).cos()) / 2.0;
            }
            SchedulerSpec::ReduceOnPlateau { factor, patience, min_lr, threshold } => {
                if let Some(value) = signal {
                    let improved = match self.best {
                        None => true,
                        Some(best) => value > best * (1.0 + threshold),
                    };
                    if improved {
                        self.best = Some(value);
                        self.bad_epochs = 0;
                    } else {
                        self.bad_epochs += 1;
                    }
                    if self.bad_epochs > patience {
                        let reduced = (self.lr * factor).max(min_lr);
                        if reduced < self.lr {
                            log::info!("reducing learning rate to {:.3e}", reduced);
                        }
                        self.lr = reduced;
                        self.bad_epochs = 0;
                    }
                }
            }
        }
        self.lr
    }

    pub fn state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn load_state(&mut self, state: serde_json::Value) -> Result<()> {
        *self = serde_json::from_value(state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cosine_restarts_after_t0() {
        let mut s = LrScheduler::new(SchedulerSpec::CosineWarmRestarts { t_0: 2, t_mult: 1, eta_min: 0.0 }, 1.0);
        assert_abs_diff_eq!(s.step(None), 0.5, epsilon = 1e-12); // halfway through the cycle
        assert_abs_diff_eq!(s.step(None), 1.0, epsilon = 1e-12); // restart
        assert_abs_diff_eq!(s.step(None), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn cosine_cycles_grow_with_t_mult() {
        let mut s = LrScheduler::new(SchedulerSpec::CosineWarmRestarts { t_0: 1, t_mult: 2, eta_min: 0.0 }, 1.0);
        assert_abs_diff_eq!(s.step(None), 1.0, epsilon = 1e-12); // restart, cycle now 2 epochs
        assert_abs_diff_eq!(s.step(None), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.step(None), 1.0, epsilon = 1e-12); // restart, cycle now 4 epochs
    }

    #[test]
    fn plateau_reduces_after_patience() {
        let spec = SchedulerSpec::ReduceOnPlateau { factor: 0.5, patience: 1, min_lr: 0.0, threshold: 0.0 };
        let mut s = LrScheduler::new(spec, 1.0);
        assert_eq!(s.step(Some(0.5)), 1.0);
        assert_eq!(s.step(Some(0.4)), 1.0);
        assert_eq!(s.step(Some(0.4)), 0.5);
        assert_eq!(s.step(Some(0.9)), 0.5);
    }

    #[test]
    fn constant_never_moves() {
        let mut s = LrScheduler::new(SchedulerSpec::Constant, 0.01);
        for _ in 0..5 {
            assert_eq!(s.step(Some(0.1)), 0.01);
        }
    }
}
