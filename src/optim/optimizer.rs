use crate::error::Result;
use crate::math::Matrix;

/// Parameter update rule. Models address their tensors by a stable slot
/// index so stateful optimizers can keep per-tensor buffers.
pub trait Optimizer {
    /// Short name used in the `lr-<name>` telemetry scalar.
    fn name(&self) -> &'static str;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);

    /// Updates `param` in place from its gradient.
    fn step(&mut self, slot: usize, param: &mut Matrix, grad: &Matrix);

    fn state(&self) -> Result<serde_json::Value>;

    fn load_state(&mut self, state: serde_json::Value) -> Result<()>;
}

/// Grows `buffers` so `slot` is addressable and returns that buffer,
/// zero-initialised to `like`'s shape on first use.
pub(crate) fn slot_buffer<'a>(buffers: &'a mut Vec<Option<Matrix>>, slot: usize, like: &Matrix) -> &'a mut Matrix {
    if buffers.len() <= slot {
        buffers.resize(slot + 1, None);
    }
    buffers[slot].get_or_insert_with(|| Matrix::zeros(like.rows, like.cols))
}
