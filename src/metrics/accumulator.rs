use serde::{Serialize, Deserialize};

use crate::data::LabelMask;
use crate::error::{HarnessError, Result};
use crate::metrics::class_metrics::ClassMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricTask {
    Binary,
    Multiclass,
}

/// Metric constructor parameters (`metric_cfg1` / `metric_cfg2`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSpec {
    pub task: MetricTask,
    pub num_classes: usize,
    /// Ground-truth value whose pixels are left out of every statistic.
    #[serde(default)]
    pub ignore_index: Option<usize>,
}

/// Streaming confusion matrix for one phase.
///
/// Counts are plain sums, so the order in which batches arrive does not
/// change `compute()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionAccumulator {
    num_classes: usize,
    ignore_index: Option<usize>,
    counts: Vec<u64>, // row = truth, col = prediction
    total: u64,
}

impl ConfusionAccumulator {
    pub fn new(num_classes: usize, ignore_index: Option<usize>) -> Self {
        ConfusionAccumulator {
            num_classes,
            ignore_index,
            counts: vec![0; num_classes * num_classes],
            total: 0,
        }
    }

    pub fn from_spec(spec: &MetricSpec) -> Self {
        ConfusionAccumulator::new(spec.num_classes, spec.ignore_index)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// True when no pixel has been counted since the last reset.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Pixels counted since the last reset.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Raw matrix, row-major, rows = truth, columns = prediction.
    pub fn confusion(&self) -> &[u64] {
        &self.counts
    }

    /// Folds one batch of discrete predictions into the running counts.
    ///
    /// The batch is checked in full first; on error nothing is counted.
    pub fn update(&mut self, predicted: &LabelMask, truth: &LabelMask) -> Result<()> {
        if predicted.shape() != truth.shape() {
            return Err(HarnessError::MalformedBatch(format!(
                "prediction shape {:?} does not match target shape {:?}",
                predicted.shape(),
                truth.shape()
            )));
        }

        for (&p, &t) in predicted.data.iter().zip(&truth.data) {
            if Some(t) == self.ignore_index {
                continue;
            }
            if t >= self.num_classes {
                return Err(HarnessError::LabelOutOfRange { which: "target", label: t, num_classes: self.num_classes });
            }
            if p >= self.num_classes {
                return Err(HarnessError::LabelOutOfRange { which: "predicted", label: p, num_classes: self.num_classes });
            }
        }

        for (&p, &t) in predicted.data.iter().zip(&truth.data) {
            if Some(t) == self.ignore_index {
                continue;
            }
            self.counts[t * self.num_classes + p] += 1;
            self.total += 1;
        }
        Ok(())
    }

    /// Current per-class metrics; does not touch the counts.
    ///
    /// Any ratio with a zero denominator is reported as 0.0.
    pub fn compute(&self) -> ClassMetrics {
        let c = self.num_classes;
        let mut precision = Vec::with_capacity(c);
        let mut recall = Vec::with_capacity(c);
        let mut f1 = Vec::with_capacity(c);
        let mut iou = Vec::with_capacity(c);
        let mut correct = 0u64;

        for k in 0..c {
            let tp = self.counts[k * c + k];
            let predicted_k: u64 = (0..c).map(|t| self.counts[t * c + k]).sum();
            let actual_k: u64 = self.counts[k * c..(k + 1) * c].iter().sum();
            let fp = predicted_k - tp;
            let fn_ = actual_k - tp;
            correct += tp;

            precision.push(ratio(tp, tp + fp));
            recall.push(ratio(tp, tp + fn_));
            f1.push(ratio(2 * tp, 2 * tp + fp + fn_));
            iou.push(ratio(tp, tp + fp + fn_));
        }

        ClassMetrics { precision, recall, f1, iou, oa: ratio(correct, self.total) }
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|x| *x = 0);
        self.total = 0;
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
