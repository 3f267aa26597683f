pub mod tensor;
pub mod batch;
pub mod dataset;
pub mod loader;

pub use tensor::{PixelTensor, LabelMask, ClassScores};
pub use batch::{Batch, Sample, collate};
pub use dataset::{Dataset, DatasetSpec, FolderDataset, InMemoryDataset, Split};
pub use loader::DataLoader;
