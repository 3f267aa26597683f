use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::data::batch::Sample;
use crate::error::{HarnessError, Result};

/// Random-access source of samples.
pub trait Dataset {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Result<Sample>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which slice of the data a loader serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

/// Dataset section of the harness configuration.
///
/// The folder layout follows the common change-detection benchmarks:
/// `<root>/<split>/A/<name>`, `<root>/<split>/B/<name>`,
/// `<root>/<split>/label/<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSpec {
    pub root: PathBuf,
    #[serde(default = "default_train_split")]
    pub train_split: String,
    #[serde(default = "default_val_split")]
    pub val_split: String,
    #[serde(default = "default_test_split")]
    pub test_split: String,
    pub batch_size: usize,
    /// Batch size for validation and test; falls back to `batch_size`.
    #[serde(default)]
    pub eval_batch_size: Option<usize>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default)]
    pub drop_last: bool,
    /// Map every non-zero label pixel to the change class (1).
    /// When false the raw grey value is the class index.
    #[serde(default = "default_true")]
    pub binarize_labels: bool,
}

fn default_train_split() -> String { "train".into() }
fn default_val_split() -> String { "val".into() }
fn default_test_split() -> String { "test".into() }
fn default_true() -> bool { true }

impl DatasetSpec {
    pub fn split_name(&self, split: Split) -> &str {
        match split {
            Split::Train => &self.train_split,
            Split::Val => &self.val_split,
            Split::Test => &self.test_split,
        }
    }

    pub fn batch_size_for(&self, split: Split) -> usize {
        match split {
            Split::Train => self.batch_size,
            Split::Val | Split::Test => self.eval_batch_size.unwrap_or(self.batch_size),
        }
    }
}

/// Samples held in memory. Used by tests and small synthetic runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        InMemoryDataset { samples }
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        self.samples.get(index).cloned().ok_or_else(|| {
            HarnessError::MalformedBatch(format!("sample index {} out of range", index))
        })
    }
}

/// Image pairs decoded lazily from disk with the `image` crate.
#[derive(Debug, Clone)]
pub struct FolderDataset {
    dir: PathBuf,
    names: Vec<String>,
    binarize_labels: bool,
}

impl FolderDataset {
    /// Indexes `<root>/<split>`. Every file in `A/` must have a counterpart
    /// with the same name in `B/` and `label/`.
    pub fn open(root: &Path, split: &str, binarize_labels: bool) -> Result<Self> {
        let dir = root.join(split);
        let a_dir = dir.join("A");
        let entries = fs::read_dir(&a_dir).map_err(|e| HarnessError::io(&a_dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HarnessError::io(&a_dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            for sub in ["B", "label"] {
                let twin = dir.join(sub).join(&name);
                if !twin.is_file() {
                    return Err(HarnessError::Config(format!(
                        "{} has no counterpart at {}",
                        a_dir.join(&name).display(),
                        twin.display()
                    )));
                }
            }
            names.push(name);
        }
        names.sort();
        log::info!("indexed {} image pairs under {}", names.len(), dir.display());
        Ok(FolderDataset { dir, names, binarize_labels })
    }

    fn load_rgb(path: &Path) -> Result<(u32, u32, Vec<f64>)> {
        let img = image::open(path)?.to_rgb8();
        let (w, h) = img.dimensions();
        let plane = (w * h) as usize;
        let mut chw = vec![0.0; 3 * plane];
        for (i, px) in img.pixels().enumerate() {
            for c in 0..3 {
                chw[c * plane + i] = px[c] as f64 / 255.0;
            }
        }
        Ok((w, h, chw))
    }
}

impl Dataset for FolderDataset {
    fn len(&self) -> usize {
        self.names.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let name = self.names.get(index).ok_or_else(|| {
            HarnessError::MalformedBatch(format!("sample index {} out of range", index))
        })?;

        let (wa, ha, image_a) = Self::load_rgb(&self.dir.join("A").join(name))?;
        let (wb, hb, image_b) = Self::load_rgb(&self.dir.join("B").join(name))?;
        let label = image::open(self.dir.join("label").join(name))?.to_luma8();

        if (wa, ha) != (wb, hb) || (wa, ha) != label.dimensions() {
            return Err(HarnessError::MalformedBatch(format!(
                "{}: A is {}x{}, B is {}x{}, label is {}x{}",
                name, wa, ha, wb, hb, label.width(), label.height()
            )));
        }

        let mask = label
            .pixels()
            .map(|p| {
                let v = p[0] as usize;
                if self.binarize_labels { usize::from(v > 0) } else { v }
            })
            .collect();

        Ok(Sample {
            image_a,
            image_b,
            mask,
            channels: 3,
            height: ha as usize,
            width: wa as usize,
        })
    }
}
