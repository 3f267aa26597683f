use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::Activation;
use crate::data::{ClassScores, PixelTensor};
use crate::error::{HarnessError, Result};
use crate::layers::Dense;
use crate::math::Matrix;
use crate::model::change_model::ChangeModel;
use crate::optim::Optimizer;

/// Reference change-detection model: every pixel is classified on its own
/// from `[a_c, b_c, |a_c - b_c|]` for each channel `c`, through a stack of
/// dense layers ending in a softmax over the classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelNet {
    pub in_channels: usize,
    pub num_classes: usize,
    pub layers: Vec<Dense>,
}

impl PixelNet {
    pub fn new<R: Rng>(
        in_channels: usize,
        hidden: &[usize],
        activation: Activation,
        num_classes: usize,
        rng: &mut R,
    ) -> PixelNet {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut input_size = 3 * in_channels;
        for &size in hidden {
            layers.push(Dense::new(input_size, size, activation, rng));
            input_size = size;
        }
        layers.push(Dense::new(input_size, num_classes, Activation::Softmax, rng));
        PixelNet { in_channels, num_classes, layers }
    }

    /// One feature row per pixel, ordered image, row, column.
    fn features(&self, a: &PixelTensor, b: &PixelTensor) -> Result<Matrix> {
        if (a.batch, a.channels, a.height, a.width) != (b.batch, b.channels, b.height, b.width) {
            return Err(HarnessError::MalformedBatch("image A and image B differ in shape".into()));
        }
        if a.channels != self.in_channels {
            return Err(HarnessError::MalformedBatch(format!(
                "model expects {} channels, got {}",
                self.in_channels, a.channels
            )));
        }

        let plane = a.pixels_per_image();
        let c = a.channels;
        let mut x = Matrix::zeros(a.batch * plane, 3 * c);
        for n in 0..a.batch {
            for p in 0..plane {
                let (yy, xx) = (p / a.width, p % a.width);
                let row = x.row_mut(n * plane + p);
                for ch in 0..c {
                    let va = a.get(n, ch, yy, xx);
                    let vb = b.get(n, ch, yy, xx);
                    row[3 * ch] = va;
                    row[3 * ch + 1] = vb;
                    row[3 * ch + 2] = (va - vb).abs();
                }
            }
        }
        Ok(x)
    }

    /// Pixel-major `P × K` probabilities → NCHW scores.
    fn to_scores(&self, out: &Matrix, like: &PixelTensor) -> Result<ClassScores> {
        let plane = like.pixels_per_image();
        let k = self.num_classes;
        let mut data = vec![0.0; like.batch * k * plane];
        for n in 0..like.batch {
            for p in 0..plane {
                let row = out.row(n * plane + p);
                for (class, &v) in row.iter().enumerate() {
                    data[(n * k + class) * plane + p] = v;
                }
            }
        }
        ClassScores::new(like.batch, k, like.height, like.width, data)
    }

    /// NCHW gradient → pixel-major `P × K` matrix.
    fn from_scores(grad: &ClassScores) -> Matrix {
        let plane = grad.height * grad.width;
        let mut m = Matrix::zeros(grad.batch * plane, grad.classes);
        for n in 0..grad.batch {
            for k in 0..grad.classes {
                for p in 0..plane {
                    m.set(n * plane + p, k, grad.get(n, k, p));
                }
            }
        }
        m
    }
}

impl ChangeModel for PixelNet {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn predict(&self, image_a: &PixelTensor, image_b: &PixelTensor) -> Result<ClassScores> {
        let mut current = self.features(image_a, image_b)?;
        for layer in &self.layers {
            current = layer.infer(&current);
        }
        self.to_scores(&current, image_a)
    }

    fn forward(&mut self, image_a: &PixelTensor, image_b: &PixelTensor) -> Result<ClassScores> {
        let mut current = self.features(image_a, image_b)?;
        for layer in &mut self.layers {
            current = layer.forward(current);
        }
        self.to_scores(&current, image_a)
    }

    fn backward(&mut self, grad: &ClassScores, optimizer: &mut dyn Optimizer) -> Result<()> {
        if grad.classes != self.num_classes {
            return Err(HarnessError::MalformedBatch(format!(
                "gradient has {} classes, model has {}",
                grad.classes, self.num_classes
            )));
        }
        let mut delta = Self::from_scores(grad);

        // Compute gradients → propagate delta → apply step, last layer first.
        for i in (0..self.layers.len()).rev() {
            let (grads, upstream) = self.layers[i].backward(&delta).ok_or_else(|| {
                HarnessError::ModelState("backward called without a preceding forward".into())
            })?;
            delta = upstream;
            optimizer.step(2 * i, &mut self.layers[i].weights, &grads.weights);
            optimizer.step(2 * i + 1, &mut self.layers[i].biases, &grads.biases);
        }
        Ok(())
    }

    fn state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn load_state(&mut self, state: serde_json::Value) -> Result<()> {
        let restored: PixelNet = serde_json::from_value(state)?;
        if restored.in_channels != self.in_channels || restored.num_classes != self.num_classes {
            return Err(HarnessError::ModelState(format!(
                "checkpoint model is {} channels / {} classes, configured model is {} / {}",
                restored.in_channels, restored.num_classes, self.in_channels, self.num_classes
            )));
        }
        *self = restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LabelMask;
    use crate::loss::{CrossEntropyLoss, PixelLoss};
    use crate::optim::Sgd;
    use rand::{rngs::StdRng, SeedableRng};

    fn pair() -> (PixelTensor, PixelTensor, LabelMask) {
        // 1 image, 1 channel, 2x2; the right column changes.
        let a = PixelTensor::new(1, 1, 2, 2, vec![0.2, 0.2, 0.2, 0.2]).unwrap();
        let b = PixelTensor::new(1, 1, 2, 2, vec![0.2, 0.9, 0.2, 0.9]).unwrap();
        let mask = LabelMask::new(1, 2, 2, vec![0, 1, 0, 1]).unwrap();
        (a, b, mask)
    }

    #[test]
    fn scores_are_per_pixel_distributions() {
        let net = PixelNet::new(1, &[4], Activation::Relu, 2, &mut StdRng::seed_from_u64(3));
        let (a, b, _) = pair();
        let scores = net.predict(&a, &b).unwrap();
        assert_eq!((scores.batch, scores.classes, scores.height, scores.width), (1, 2, 2, 2));
        for p in 0..4 {
            let s = scores.get(0, 0, p) + scores.get(0, 1, p);
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn training_reduces_loss_on_a_toy_pair() {
        let mut net = PixelNet::new(1, &[8], Activation::Tanh, 2, &mut StdRng::seed_from_u64(11));
        let mut sgd = Sgd::new(0.5);
        let loss = CrossEntropyLoss::default();
        let (a, b, mask) = pair();

        let before = loss.loss(&net.predict(&a, &b).unwrap(), &mask).unwrap();
        for _ in 0..200 {
            let scores = net.forward(&a, &b).unwrap();
            let grad = loss.derivative(&scores, &mask).unwrap();
            net.backward(&grad, &mut sgd).unwrap();
        }
        let after = loss.loss(&net.predict(&a, &b).unwrap(), &mask).unwrap();
        assert!(after < before, "loss went from {} to {}", before, after);
        assert_eq!(net.predict(&a, &b).unwrap().argmax(), mask);
    }

    #[test]
    fn backward_without_forward_is_an_error() {
        let mut net = PixelNet::new(1, &[2], Activation::Relu, 2, &mut StdRng::seed_from_u64(0));
        let grad = ClassScores::new(1, 2, 1, 1, vec![0.0, 0.0]).unwrap();
        assert!(net.backward(&grad, &mut Sgd::new(0.1)).is_err());
    }

    #[test]
    fn state_round_trip_preserves_predictions() {
        let net = PixelNet::new(1, &[3], Activation::Relu, 2, &mut StdRng::seed_from_u64(5));
        let mut other = PixelNet::new(1, &[3], Activation::Relu, 2, &mut StdRng::seed_from_u64(6));
        other.load_state(net.state().unwrap()).unwrap();
        let (a, b, _) = pair();
        assert_eq!(net.predict(&a, &b).unwrap(), other.predict(&a, &b).unwrap());
    }

    #[test]
    fn wrong_channel_count_is_malformed() {
        let net = PixelNet::new(3, &[2], Activation::Relu, 2, &mut StdRng::seed_from_u64(0));
        let (a, b, _) = pair();
        assert!(matches!(net.predict(&a, &b), Err(HarnessError::MalformedBatch(_))));
    }
}
