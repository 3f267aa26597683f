pub mod dense;

pub use dense::{Dense, DenseGrads};
