use serde::{Serialize, Deserialize};

/// Index of the foreground ("changed") class.
pub const CHANGE_CLASS: usize = 1;

/// Per-class metric vectors plus pooled overall accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub f1: Vec<f64>,
    pub iou: Vec<f64>,
    pub oa: f64,
}

impl ClassMetrics {
    pub fn num_classes(&self) -> usize {
        self.f1.len()
    }

    /// F1 of the change class, the gating signal for checkpoints and
    /// the plateau scheduler. 0.0 when the class does not exist.
    pub fn change_f1(&self) -> f64 {
        self.f1.get(CHANGE_CLASS).copied().unwrap_or(0.0)
    }

    /// Class-mean of every vector, plus OA.
    pub fn aggregate(&self) -> AggregateMetrics {
        AggregateMetrics {
            oa: self.oa,
            prec: mean(&self.precision),
            recall: mean(&self.recall),
            f1: mean(&self.f1),
            miou: mean(&self.iou),
        }
    }

    /// Columns in report order: precision, recall, F1, IoU.
    pub fn columns(&self) -> [&[f64]; 4] {
        [&self.precision, &self.recall, &self.f1, &self.iou]
    }
}

/// The five scalars reported per mode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub oa: f64,
    pub prec: f64,
    pub recall: f64,
    pub f1: f64,
    pub miou: f64,
}

impl AggregateMetrics {
    /// `(name, value)` pairs in report order, e.g. `val_oa`, `val_prec`, ...
    pub fn named(&self, prefix: &str) -> [(String, f64); 5] {
        [
            (format!("{}_oa", prefix), self.oa),
            (format!("{}_prec", prefix), self.prec),
            (format!("{}_recall", prefix), self.recall),
            (format!("{}_f1", prefix), self.f1),
            (format!("{}_miou", prefix), self.miou),
        ]
    }

    pub fn values(&self) -> [f64; 5] {
        [self.oa, self.prec, self.recall, self.f1, self.miou]
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
