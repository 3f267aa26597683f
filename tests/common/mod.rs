#![allow(dead_code)]

use std::path::Path;

use ferrite_cd::activation::Activation;
use ferrite_cd::data::{DataLoader, InMemoryDataset, Sample};
use ferrite_cd::loss::CrossEntropyLoss;
use ferrite_cd::metrics::{MetricSpec, MetricTask};
use ferrite_cd::optim::{LrScheduler, SchedulerSpec, Sgd};
use ferrite_cd::telemetry::MemorySink;
use ferrite_cd::train::{EpochController, Loaders, OptimSetup, TrainConfig};
use ferrite_cd::{PixelNet, ReportWriter};
use rand::{rngs::StdRng, SeedableRng};

/// 1-channel 2x2 pair where the pixels listed in `changed` differ.
pub fn sample(changed: &[usize]) -> Sample {
    let image_a = vec![0.2; 4];
    let mut image_b = image_a.clone();
    let mut mask = vec![0; 4];
    for &p in changed {
        image_b[p] = 0.9;
        mask[p] = 1;
    }
    Sample { image_a, image_b, mask, channels: 1, height: 2, width: 2 }
}

pub fn toy_samples() -> Vec<Sample> {
    vec![sample(&[1, 3]), sample(&[0]), sample(&[]), sample(&[2, 3])]
}

pub fn binary_spec() -> MetricSpec {
    MetricSpec { task: MetricTask::Multiclass, num_classes: 2, ignore_index: None }
}

pub fn loader(samples: Vec<Sample>, batch_size: usize) -> DataLoader {
    DataLoader::sequential(Box::new(InMemoryDataset::new(samples)), batch_size)
}

/// Controller over in-memory splits writing reports to `dir`.
pub fn controller(
    dir: &Path,
    train: Vec<Sample>,
    config: TrainConfig,
    sink: MemorySink,
) -> EpochController<PixelNet> {
    controller_with_test(dir, train, toy_samples(), config, sink)
}

/// Same as `controller` with a custom test split.
pub fn controller_with_test(
    dir: &Path,
    train: Vec<Sample>,
    test: Vec<Sample>,
    config: TrainConfig,
    sink: MemorySink,
) -> EpochController<PixelNet> {
    let model = PixelNet::new(1, &[6], Activation::Tanh, 2, &mut StdRng::seed_from_u64(7));
    let setup = OptimSetup {
        loss: Box::new(CrossEntropyLoss::default()),
        optimizer: Box::new(Sgd::new(0.3)),
        scheduler: LrScheduler::new(SchedulerSpec::Constant, 0.3),
    };
    let loaders = Loaders {
        train: loader(train, 2),
        val: loader(toy_samples(), 2),
        test: loader(test, 3),
    };
    let reports = ReportWriter::new(dir, config.epochs).quiet();
    EpochController::new(model, setup, loaders, &binary_spec(), reports, Box::new(sink), config)
}
