use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::Activation;
use crate::model::pixel_net::PixelNet;

/// Model section of the harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ModelSpec {
    /// Siamese per-pixel MLP over `[a, b, |a - b|]` features.
    PixelMlp {
        in_channels: usize,
        hidden: Vec<usize>,
        #[serde(default = "default_activation")]
        activation: Activation,
        num_classes: usize,
    },
}

fn default_activation() -> Activation {
    Activation::Relu
}

impl ModelSpec {
    pub fn num_classes(&self) -> usize {
        match self {
            ModelSpec::PixelMlp { num_classes, .. } => *num_classes,
        }
    }

    pub fn build<R: Rng>(&self, rng: &mut R) -> PixelNet {
        match self {
            ModelSpec::PixelMlp { in_channels, hidden, activation, num_classes } => {
                PixelNet::new(*in_channels, hidden, *activation, *num_classes, rng)
            }
        }
    }
}
