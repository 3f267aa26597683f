use crate::error::{HarnessError, Result};

/// Image batch in NCHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl PixelTensor {
    pub fn new(batch: usize, channels: usize, height: usize, width: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != batch * channels * height * width {
            return Err(HarnessError::MalformedBatch(format!(
                "image buffer holds {} values, expected {}x{}x{}x{}",
                data.len(), batch, channels, height, width
            )));
        }
        Ok(PixelTensor { batch, channels, height, width, data })
    }

    pub fn pixels_per_image(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn get(&self, n: usize, c: usize, y: usize, x: usize) -> f64 {
        self.data[((n * self.channels + c) * self.height + y) * self.width + x]
    }
}

/// Discrete per-pixel class labels in NHW layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMask {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<usize>,
}

impl LabelMask {
    pub fn new(batch: usize, height: usize, width: usize, data: Vec<usize>) -> Result<Self> {
        if data.len() != batch * height * width {
            return Err(HarnessError::MalformedBatch(format!(
                "mask holds {} labels, expected {}x{}x{}",
                data.len(), batch, height, width
            )));
        }
        Ok(LabelMask { batch, height, width, data })
    }

    /// Single-image, single-row mask; handy for flat label lists.
    pub fn from_flat(labels: Vec<usize>) -> Self {
        LabelMask { batch: 1, height: 1, width: labels.len(), data: labels }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.batch, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-pixel class scores in NCHW layout (C = number of classes).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub batch: usize,
    pub classes: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl ClassScores {
    pub fn new(batch: usize, classes: usize, height: usize, width: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != batch * classes * height * width {
            return Err(HarnessError::MalformedBatch(format!(
                "score buffer holds {} values, expected {}x{}x{}x{}",
                data.len(), batch, classes, height, width
            )));
        }
        Ok(ClassScores { batch, classes, height, width, data })
    }

    pub fn zeros_like(other: &ClassScores) -> Self {
        ClassScores { data: vec![0.0; other.data.len()], ..other.clone() }
    }

    #[inline]
    pub fn index(&self, n: usize, k: usize, pixel: usize) -> usize {
        (n * self.classes + k) * self.height * self.width + pixel
    }

    #[inline]
    pub fn get(&self, n: usize, k: usize, pixel: usize) -> f64 {
        self.data[self.index(n, k, pixel)]
    }

    /// Checks that these scores cover exactly the pixels of `mask`.
    pub fn check_aligned(&self, mask: &LabelMask) -> Result<()> {
        if (self.batch, self.height, self.width) != mask.shape() {
            return Err(HarnessError::MalformedBatch(format!(
                "scores are {}x{}x{} pixels but mask is {}x{}x{}",
                self.batch, self.height, self.width, mask.batch, mask.height, mask.width
            )));
        }
        Ok(())
    }

    /// Arg-max over the class dimension. Ties resolve to the lowest class.
    pub fn argmax(&self) -> LabelMask {
        let plane = self.height * self.width;
        let mut labels = Vec::with_capacity(self.batch * plane);
        for n in 0..self.batch {
            for p in 0..plane {
                let mut best = 0;
                let mut best_score = self.get(n, 0, p);
                for k in 1..self.classes {
                    let s = self.get(n, k, p);
                    if s > best_score {
                        best = k;
                        best_score = s;
                    }
                }
                labels.push(best);
            }
        }
        LabelMask { batch: self.batch, height: self.height, width: self.width, data: labels }
    }
}
