use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{activation::Activation, math::Matrix};

/// Fully connected layer over a batch of rows (one row per pixel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Matrix, // input × output
    pub biases: Matrix,  // 1 × output
    pub activation: Activation,
    #[serde(skip)]
    cache: Option<ForwardCache>,
}

#[derive(Debug, Clone)]
struct ForwardCache {
    input: Matrix,
    pre_activation: Matrix, // z = xW + b, needed for σ'(z)
}

/// Gradients for one layer, in the same shapes as its parameters.
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl Dense {
    pub fn new<R: Rng>(input_size: usize, size: usize, activation: Activation, rng: &mut R) -> Dense {
        Dense {
            weights: Matrix::he(input_size, size, rng),
            biases: Matrix::zeros(1, size),
            activation,
            cache: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn size(&self) -> usize {
        self.weights.cols
    }

    /// Inference pass; leaves the layer untouched.
    pub fn infer(&self, input: &Matrix) -> Matrix {
        let mut out = input.matmul(&self.weights).add_row(&self.biases);
        for r in 0..out.rows {
            self.activation.apply_row(out.row_mut(r));
        }
        out
    }

    /// Training pass; caches what `backward` needs.
    pub fn forward(&mut self, input: Matrix) -> Matrix {
        let z = input.matmul(&self.weights).add_row(&self.biases);
        let mut a = z.clone();
        for r in 0..a.rows {
            self.activation.apply_row(a.row_mut(r));
        }
        self.cache = Some(ForwardCache { input, pre_activation: z });
        a
    }

    /// Back-propagates `delta` (∂L/∂a for this layer's output).
    /// Returns the parameter gradients and ∂L/∂a for the previous layer.
    /// Returns `None` when no forward pass has been cached.
    pub fn backward(&mut self, delta: &Matrix) -> Option<(DenseGrads, Matrix)> {
        let cache = self.cache.take()?;
        let act_derivative = cache.pre_activation.map(|x| self.activation.derivative(x));
        // δ = error ⊙ σ'(z)
        let layer_delta = delta.hadamard(&act_derivative);

        let grads = DenseGrads {
            weights: cache.input.transpose().matmul(&layer_delta),
            biases: layer_delta.sum_rows(),
        };
        let upstream = layer_delta.matmul(&self.weights.transpose());
        Some((grads, upstream))
    }
}
