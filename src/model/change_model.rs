use crate::data::{ClassScores, PixelTensor};
use crate::error::Result;
use crate::optim::Optimizer;

/// A change-detection network as seen by the epoch controller.
///
/// `predict` borrows the model immutably, so validation and test passes
/// cannot touch the weights; only `forward` + `backward` in the training
/// phase mutate them.
pub trait ChangeModel {
    fn num_classes(&self) -> usize;

    /// Inference over an image pair; returns per-pixel class scores.
    fn predict(&self, image_a: &PixelTensor, image_b: &PixelTensor) -> Result<ClassScores>;

    /// Training forward pass; keeps whatever `backward` needs.
    fn forward(&mut self, image_a: &PixelTensor, image_b: &PixelTensor) -> Result<ClassScores>;

    /// Back-propagates the loss gradient of the last `forward` and lets
    /// `optimizer` update every parameter.
    fn backward(&mut self, grad: &ClassScores, optimizer: &mut dyn Optimizer) -> Result<()>;

    fn state(&self) -> Result<serde_json::Value>;

    fn load_state(&mut self, state: serde_json::Value) -> Result<()>;
}
