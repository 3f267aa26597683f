use serde::{Serialize, Deserialize};
use std::f64::consts::E;

/// Activation applied after a dense layer's affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    LeakyRelu { alpha: f64 },
    Sigmoid,
    Tanh,
    Identity,
    /// Row-wise softmax over the class columns. Applied at the layer level in
    /// `Dense::forward`; it is always the head of the network and is paired
    /// with cross-entropy, whose gradient is already taken w.r.t. the logits.
    Softmax,
}

impl Activation {
    /// Element-wise activation. `Softmax` is handled by `apply_rows`.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => if x > 0.0 { x } else { 0.0 },
            Activation::LeakyRelu { alpha } => if x > 0.0 { x } else { alpha * x },
            Activation::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            Activation::Tanh => x.tanh(),
            Activation::Identity | Activation::Softmax => x,
        }
    }

    /// Element-wise derivative evaluated at the pre-activation `x`.
    ///
    /// `Softmax` returns 1.0 so the combined softmax + cross-entropy delta
    /// passes through unchanged.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => if x > 0.0 { 1.0 } else { 0.0 },
            Activation::LeakyRelu { alpha } => if x > 0.0 { 1.0 } else { *alpha },
            Activation::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::Identity | Activation::Softmax => 1.0,
        }
    }

    /// Applies the activation to one row of pre-activations in place.
    pub fn apply_row(&self, row: &mut [f64]) {
        match self {
            Activation::Softmax => {
                let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for x in row.iter_mut() {
                    *x = (*x - max).exp();
                    sum += *x;
                }
                for x in row.iter_mut() {
                    *x /= sum;
                }
            }
            _ => {
                for x in row.iter_mut() {
                    *x = self.function(*x);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_row_sums_to_one_and_is_stable() {
        let mut row = [1000.0, 1001.0, 999.0];
        Activation::Softmax.apply_row(&mut row);
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(row[1] > row[0] && row[0] > row[2]);
    }

    #[test]
    fn relu_derivative_is_step() {
        assert_eq!(Activation::Relu.derivative(-0.5), 0.0);
        assert_eq!(Activation::Relu.derivative(0.5), 1.0);
    }
}
