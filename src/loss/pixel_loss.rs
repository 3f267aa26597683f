use crate::data::{ClassScores, LabelMask};
use crate::error::Result;

/// Per-pixel segmentation loss over softmax class scores.
pub trait PixelLoss {
    /// Scalar loss for one batch.
    fn loss(&self, scores: &ClassScores, target: &LabelMask) -> Result<f64>;

    /// Gradient w.r.t. the pre-softmax logits, in the layout of `scores`.
    fn derivative(&self, scores: &ClassScores, target: &LabelMask) -> Result<ClassScores>;
}
