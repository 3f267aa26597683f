use serde::{Serialize, Deserialize};

use crate::optim::adamw::AdamW;
use crate::optim::optimizer::Optimizer;
use crate::optim::scheduler::{LrScheduler, SchedulerSpec};
use crate::optim::sgd::Sgd;

/// Optimizer section of the harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub scheduler: SchedulerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum OptimizerSpec {
    Sgd {
        lr: f64,
        #[serde(default)]
        momentum: f64,
        #[serde(default)]
        weight_decay: f64,
    },
    #[serde(rename = "adamw")]
    AdamW {
        lr: f64,
        #[serde(default = "default_betas")]
        betas: (f64, f64),
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_adamw_decay")]
        weight_decay: f64,
    },
}

fn default_betas() -> (f64, f64) { (0.9, 0.999) }
fn default_eps() -> f64 { 1e-8 }
fn default_adamw_decay() -> f64 { 1e-2 }

impl OptimizerSpec {
    pub fn lr(&self) -> f64 {
        match self {
            OptimizerSpec::Sgd { lr, .. } | OptimizerSpec::AdamW { lr, .. } => *lr,
        }
    }
}

impl OptimizerConfig {
    /// Builds the optimizer and its scheduler.
    pub fn build(&self) -> (Box<dyn Optimizer>, LrScheduler) {
        let optimizer: Box<dyn Optimizer> = match self.optimizer {
            OptimizerSpec::Sgd { lr, momentum, weight_decay } => {
                Box::new(Sgd::with_momentum(lr, momentum, weight_decay))
            }
            OptimizerSpec::AdamW { lr, betas, eps, weight_decay } => {
                Box::new(AdamW::new(lr, betas.0, betas.1, eps, weight_decay))
            }
        };
        let scheduler = LrScheduler::new(self.scheduler.clone(), self.optimizer.lr());
        (optimizer, scheduler)
    }
}
