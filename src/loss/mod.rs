pub mod pixel_loss;
pub mod cross_entropy;
pub mod loss_type;

pub use pixel_loss::PixelLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::LossSpec;
