use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::math::Matrix;
use crate::optim::optimizer::{slot_buffer, Optimizer};

/// SGD with optional momentum and L2 weight decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    velocity: Vec<Option<Matrix>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd::with_momentum(learning_rate, 0.0, 0.0)
    }

    pub fn with_momentum(learning_rate: f64, momentum: f64, weight_decay: f64) -> Sgd {
        Sgd { learning_rate, momentum, weight_decay, velocity: Vec::new() }
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &'static str {
        "SGD"
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }

    fn step(&mut self, slot: usize, param: &mut Matrix, grad: &Matrix) {
        let lr = self.learning_rate;
        let wd = self.weight_decay;
        if self.momentum == 0.0 {
            for (w, g) in param.data.iter_mut().zip(&grad.data) {
                *w -= lr * (g + wd * *w);
            }
            return;
        }
        let mu = self.momentum;
        let v = slot_buffer(&mut self.velocity, slot, param);
        for ((w, g), v) in param.data.iter_mut().zip(&grad.data).zip(v.data.iter_mut()) {
            *v = mu * *v + g + wd * *w;
            *w -= lr * *v;
        }
    }

    fn state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn load_state(&mut self, state: serde_json::Value) -> Result<()> {
        *self = serde_json::from_value(state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_step_moves_against_gradient() {
        let mut sgd = Sgd::new(0.1);
        let mut w = Matrix::from_vec(1, 2, vec![1.0, -1.0]).unwrap();
        sgd.step(0, &mut w, &Matrix::from_vec(1, 2, vec![1.0, -2.0]).unwrap());
        assert_eq!(w.data, vec![0.9, -0.8]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut sgd = Sgd::with_momentum(1.0, 0.5, 0.0);
        let mut w = Matrix::zeros(1, 1);
        let g = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
        sgd.step(0, &mut w, &g);
        sgd.step(0, &mut w, &g);
        // v1 = 1, v2 = 1.5
        assert_eq!(w.data, vec![-2.5]);
    }

    #[test]
    fn state_round_trips_velocity() {
        let mut sgd = Sgd::with_momentum(0.1, 0.9, 0.0);
        let mut w = Matrix::zeros(1, 1);
        sgd.step(3, &mut w, &Matrix::from_vec(1, 1, vec![1.0]).unwrap());
        let mut restored = Sgd::new(0.5);
        restored.load_state(sgd.state().unwrap()).unwrap();
        assert_eq!(restored.learning_rate, 0.1);
        assert_eq!(restored.velocity.len(), 4);
    }
}
