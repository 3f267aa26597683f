use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::math::Matrix;
use crate::optim::optimizer::{slot_buffer, Optimizer};

/// Adam with decoupled weight decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamW {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
    first_moment: Vec<Option<Matrix>>,
    second_moment: Vec<Option<Matrix>>,
    steps: Vec<u64>,
}

impl AdamW {
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, eps: f64, weight_decay: f64) -> AdamW {
        AdamW {
            learning_rate,
            beta1,
            beta2,
            eps,
            weight_decay,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
            steps: Vec::new(),
        }
    }
}

impl Optimizer for AdamW {
    fn name(&self) -> &'static str {
        "AdamW"
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }

    fn step(&mut self, slot: usize, param: &mut Matrix, grad: &Matrix) {
        if self.steps.len() <= slot {
            self.steps.resize(slot + 1, 0);
        }
        self.steps[slot] += 1;
        let t = self.steps[slot] as i32;

        let (lr, b1, b2, eps) = (self.learning_rate, self.beta1, self.beta2, self.eps);
        let decay = 1.0 - lr * self.weight_decay;
        let bias1 = 1.0 - b1.powi(t);
        let bias2 = 1.0 - b2.powi(t);

        let first = slot_buffer(&mut self.first_moment, slot, param);
        for (m, g) in first.data.iter_mut().zip(&grad.data) {
            *m = b1 * *m + (1.0 - b1) * g;
        }
        let second = slot_buffer(&mut self.second_moment, slot, param);
        for (v, g) in second.data.iter_mut().zip(&grad.data) {
            *v = b2 * *v + (1.0 - b2) * g * g;
        }

        let (Some(Some(m)), Some(Some(v))) = (self.first_moment.get(slot), self.second_moment.get(slot)) else {
            return;
        };
        for ((w, m), v) in param.data.iter_mut().zip(&m.data).zip(&v.data) {
            let m_hat = m / bias1;
            let v_hat = v / bias2;
            *w = *w * decay - lr * m_hat / (v_hat.sqrt() + eps);
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
    use approx::assert_abs_diff_eq;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut opt = AdamW::new(0.01, 0.9, 0.999, 1e-8, 0.0);
        let mut w = Matrix::from_vec(1, 2, vec![1.0, 1.0]).unwrap();
        opt.step(0, &mut w, &Matrix::from_vec(1, 2, vec![0.3, -4.0]).unwrap());
        // bias-corrected m/sqrt(v) = sign(g) on the first step
        assert_abs_diff_eq!(w.data[0], 0.99, epsilon = 1e-6);
        assert_abs_diff_eq!(w.data[1], 1.01, epsilon = 1e-6);
    }

    #[test]
    fn decoupled_decay_shrinks_weights_without_gradient() {
        let mut opt = AdamW::new(0.1, 0.9, 0.999, 1e-8, 0.5);
        let mut w = Matrix::from_vec(1, 1, vec![2.0]).unwrap();
        opt.step(0, &mut w, &Matrix::zeros(1, 1));
        assert_abs_diff_eq!(w.data[0], 2.0 * (1.0 - 0.05), epsilon = 1e-9);
    }
}
