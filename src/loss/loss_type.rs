use serde::{Serialize, Deserialize};

use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::pixel_loss::PixelLoss;

/// Loss section of the harness configuration.
///
/// - `CrossEntropy`: pixel-wise categorical cross-entropy; pair with a
///   Softmax head. Optional per-class weights counter the usual imbalance
///   between unchanged and changed pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum LossSpec {
    CrossEntropy {
        #[serde(default)]
        class_weights: Option<Vec<f64>>,
        #[serde(default)]
        ignore_index: Option<usize>,
    },
}

impl LossSpec {
    pub fn build(&self) -> Box<dyn PixelLoss> {
        match self {
            LossSpec::CrossEntropy { class_weights, ignore_index } => {
                Box::new(CrossEntropyLoss::new(class_weights.clone(), *ignore_index))
            }
        }
    }
}
