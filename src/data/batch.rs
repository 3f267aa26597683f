use crate::data::tensor::{LabelMask, PixelTensor};
use crate::error::{HarnessError, Result};

/// One co-registered image pair and its change mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image_a: Vec<f64>, // CHW
    pub image_b: Vec<f64>, // CHW
    pub mask: Vec<usize>,  // HW
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Sample {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }
}

/// A collated (imageA, imageB, label-mask) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub image_a: PixelTensor,
    pub image_b: PixelTensor,
    pub mask: LabelMask,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.mask.batch
    }

    pub fn is_empty(&self) -> bool {
        self.mask.batch == 0
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.image_a;
        let b = &self.image_b;
        if (a.batch, a.channels, a.height, a.width) != (b.batch, b.channels, b.height, b.width) {
            return Err(HarnessError::MalformedBatch(format!(
                "image A is {}x{}x{}x{} but image B is {}x{}x{}x{}",
                a.batch, a.channels, a.height, a.width, b.batch, b.channels, b.height, b.width
            )));
        }
        if (a.batch, a.height, a.width) != self.mask.shape() {
            return Err(HarnessError::MalformedBatch(format!(
                "images are {}x{}x{} pixels but mask is {}x{}x{}",
                a.batch, a.height, a.width, self.mask.batch, self.mask.height, self.mask.width
            )));
        }
        Ok(())
    }
}

/// Stacks samples into one batch. All samples must share a shape.
pub fn collate(samples: &[Sample]) -> Result<Batch> {
    let first = samples
        .first()
        .ok_or_else(|| HarnessError::MalformedBatch("cannot collate an empty sample list".into()))?;
    let (channels, height, width) = first.shape();

    let mut image_a = Vec::with_capacity(samples.len() * channels * height * width);
    let mut image_b = Vec::with_capacity(image_a.capacity());
    let mut mask = Vec::with_capacity(samples.len() * height * width);

    for (i, sample) in samples.iter().enumerate() {
        if sample.shape() != (channels, height, width) {
            return Err(HarnessError::MalformedBatch(format!(
                "sample {} is {:?}, expected {:?}",
                i,
                sample.shape(),
                (channels, height, width)
            )));
        }
        image_a.extend_from_slice(&sample.image_a);
        image_b.extend_from_slice(&sample.image_b);
        mask.extend_from_slice(&sample.mask);
    }

    let n = samples.len();
    let batch = Batch {
        image_a: PixelTensor::new(n, channels, height, width, image_a)?,
        image_b: PixelTensor::new(n, channels, height, width, image_b)?,
        mask: LabelMask::new(n, height, width, mask)?,
    };
    batch.validate()?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(h: usize, w: usize) -> Sample {
        Sample {
            image_a: vec![0.5; h * w],
            image_b: vec![0.25; h * w],
            mask: vec![1; h * w],
            channels: 1,
            height: h,
            width: w,
        }
    }

    #[test]
    fn collate_stacks_samples() {
        let batch = collate(&[sample(2, 2), sample(2, 2)]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.mask.data.len(), 8);
    }

    #[test]
    fn collate_rejects_mixed_shapes_and_empty_input() {
        assert!(collate(&[sample(2, 2), sample(3, 2)]).is_err());
        assert!(collate(&[]).is_err());
    }
}
