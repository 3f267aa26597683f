use crate::data::{ClassScores, LabelMask};
use crate::error::{HarnessError, Result};
use crate::loss::pixel_loss::PixelLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

/// Pixel-wise categorical cross-entropy for a softmax head.
///
/// With class weights the loss is the weighted mean
///   L = Σ_i w[y_i] · -log(p_i[y_i]) / Σ_i w[y_i]
/// over non-ignored pixels.
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    class_weights: Option<Vec<f64>>,
    ignore_index: Option<usize>,
}

impl CrossEntropyLoss {
    pub fn new(class_weights: Option<Vec<f64>>, ignore_index: Option<usize>) -> Self {
        CrossEntropyLoss { class_weights, ignore_index }
    }

    fn weight(&self, class: usize) -> f64 {
        self.class_weights.as_ref().map_or(1.0, |w| w[class])
    }

    /// Yields `(image, pixel, label)` for every counted pixel after checking
    /// shape and label range.
    fn counted_pixels<'a>(
        &'a self,
        scores: &ClassScores,
        target: &'a LabelMask,
    ) -> Result<impl Iterator<Item = (usize, usize, usize)> + 'a> {
        scores.check_aligned(target)?;
        if let Some(w) = &self.class_weights {
            if w.len() != scores.classes {
                return Err(HarnessError::Config(format!(
                    "loss has {} class weights for {} classes",
                    w.len(),
                    scores.classes
                )));
            }
        }
        for &t in &target.data {
            if t >= scores.classes && Some(t) != self.ignore_index {
                return Err(HarnessError::LabelOutOfRange { which: "target", label: t, num_classes: scores.classes });
            }
        }

        let plane = target.height * target.width;
        let ignore = self.ignore_index;
        Ok(target
            .data
            .iter()
            .enumerate()
            .filter(move |&(_, &t)| Some(t) != ignore)
            .map(move |(i, &t)| (i / plane, i % plane, t)))
    }
}

impl PixelLoss for CrossEntropyLoss {
    fn loss(&self, scores: &ClassScores, target: &LabelMask) -> Result<f64> {
        let mut total = 0.0;
        let mut norm = 0.0;
        for (n, p, t) in self.counted_pixels(scores, target)? {
            let w = self.weight(t);
            total += -w * (scores.get(n, t, p) + EPS).ln();
            norm += w;
        }
        Ok(if norm > 0.0 { total / norm } else { 0.0 })
    }

    /// Combined softmax + cross-entropy gradient:
    ///   ∂L/∂z_k = w[y] · (p_k - 1[k = y]) / Σ w
    /// Ignored pixels get a zero gradient.
    fn derivative(&self, scores: &ClassScores, target: &LabelMask) -> Result<ClassScores> {
        let pixels: Vec<_> = self.counted_pixels(scores, target)?.collect();
        let norm: f64 = pixels.iter().map(|&(_, _, t)| self.weight(t)).sum();
        let mut grad = ClassScores::zeros_like(scores);
        if norm == 0.0 {
            return Ok(grad);
        }
        for (n, p, t) in pixels {
            let scale = self.weight(t) / norm;
            for k in 0..scores.classes {
                let idx = scores.index(n, k, p);
                let onehot = if k == t { 1.0 } else { 0.0 };
                grad.data[idx] = scale * (scores.data[idx] - onehot);
            }
        }
        Ok(grad)
    }
}
