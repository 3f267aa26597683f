pub mod change_model;
pub mod pixel_net;
pub mod spec;

pub use change_model::ChangeModel;
pub use pixel_net::PixelNet;
pub use spec::ModelSpec;
