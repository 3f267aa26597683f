use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batch::{collate, Batch};
use crate::data::dataset::Dataset;
use crate::error::Result;

/// Groups dataset samples into batches, reshuffling every pass when asked.
pub struct DataLoader {
    dataset: Box<dyn Dataset>,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(dataset: Box<dyn Dataset>, batch_size: usize, shuffle: bool, drop_last: bool, seed: u64) -> Self {
        DataLoader {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            drop_last,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sequential, unshuffled loader.
    pub fn sequential(dataset: Box<dyn Dataset>, batch_size: usize) -> Self {
        DataLoader::new(dataset, batch_size, false, false, 0)
    }

    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    /// Batches per pass.
    pub fn len(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts one pass over the data.
    pub fn iter(&mut self) -> BatchIter<'_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let mut groups: Vec<Vec<usize>> = order.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        if self.drop_last && groups.last().is_some_and(|g| g.len() < self.batch_size) {
            groups.pop();
        }
        BatchIter { dataset: self.dataset.as_ref(), groups: groups.into_iter() }
    }
}

pub struct BatchIter<'a> {
    dataset: &'a dyn Dataset,
    groups: std::vec::IntoIter<Vec<usize>>,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let group = self.groups.next()?;
        let samples: Result<Vec<_>> = group.iter().map(|&i| self.dataset.get(i)).collect();
        Some(samples.and_then(|s| collate(&s)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batch::Sample;
    use crate::data::dataset::InMemoryDataset;

    fn dataset(n: usize) -> Box<dyn Dataset> {
        let samples = (0..n)
            .map(|i| Sample {
                image_a: vec![i as f64],
                image_b: vec![0.0],
                mask: vec![i % 2],
                channels: 1,
                height: 1,
                width: 1,
            })
            .collect();
        Box::new(InMemoryDataset::new(samples))
    }

    #[test]
    fn partial_last_batch_is_kept_unless_dropped() {
        let mut keep = DataLoader::new(dataset(5), 2, false, false, 0);
        assert_eq!(keep.len(), 3);
        assert_eq!(keep.iter().count(), 3);

        let mut drop = DataLoader::new(dataset(5), 2, false, true, 0);
        assert_eq!(drop.len(), 2);
        assert_eq!(drop.iter().count(), 2);
    }

    #[test]
    fn shuffled_pass_still_visits_every_sample_once() {
        let mut loader = DataLoader::new(dataset(7), 3, true, false, 1234);
        let mut seen: Vec<usize> = loader
            .iter()
            .flat_map(|b| b.unwrap().image_a.data)
            .map(|v| v as usize)
            .collect();
        seen.sort();
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }
}
