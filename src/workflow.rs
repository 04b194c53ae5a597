use std::path::Path;

use dfdx::data::ExactSizeDataset;
#[cfg(feature = "cuda")]
use dfdx::prelude::Cuda;
use dfdx::prelude::Cpu;
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use crate::{
    config::Config,
    datasets::{cifar10::LABEL_NAMES, Cifar10, SampleFolder, Test, Train},
    error::Result,
    evaluate::{evaluate, Accuracy},
    loader::DataLoader,
    model::{select_device, AlexNetModel, ComputeDevice, Network},
    train::train,
    transform::Preprocess,
};

/// Fine-tunes the pretrained baseline on CIFAR-10, saves it and reports its
/// accuracy on the test split.
pub fn run_train(cfg: &Config, epochs: usize) -> Result<Accuracy> {
    match select_device(cfg.seed) {
        ComputeDevice::Cpu(dev) => train_on::<AlexNetModel<Cpu>>(&dev, cfg, epochs),
        #[cfg(feature = "cuda")]
        ComputeDevice::Cuda(dev) => train_on::<AlexNetModel<Cuda>>(&dev, cfg, epochs),
    }
}

/// Evaluates the model saved at `model_path` on a prefix-labelled folder.
/// The folder is indexed before any model is loaded.
pub fn run_test(cfg: &Config, model_path: &Path, data_dir: &Path) -> Result<Accuracy> {
    let data = SampleFolder::new(data_dir, Preprocess::default())?;
    info!(root = %data_dir.display(), samples = data.len(), "indexed test folder");

    match select_device(cfg.seed) {
        ComputeDevice::Cpu(dev) => test_on::<AlexNetModel<Cpu>>(&dev, cfg, model_path, &data),
        #[cfg(feature = "cuda")]
        ComputeDevice::Cuda(dev) => test_on::<AlexNetModel<Cuda>>(&dev, cfg, model_path, &data),
    }
}

fn train_on<M: Network>(dev: &M::Device, cfg: &Config, epochs: usize) -> Result<Accuracy> {
    let mut model = M::pretrained(dev, &cfg.pretrained_weights)?;

    let preprocess = Preprocess::default();
    let train_data = Cifar10::<Train>::new(&cfg.dataset_root, preprocess)?;
    let test_data = Cifar10::<Test>::new(&cfg.dataset_root, preprocess)?;
    info!(classes = ?LABEL_NAMES, "cifar10 classes");

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let train_loader = DataLoader::new(&train_data, cfg.train.loader);
    {
        let mut trainer = model.sgd(cfg.train.learning_rate, cfg.train.momentum);
        let report = train(
            &mut trainer,
            &train_loader,
            epochs,
            cfg.train.report_every,
            &mut rng,
        )?;
        info!(epochs = report.epochs, steps = report.steps, "training finished");
    }

    model.save(&cfg.model_path)?;
    info!("Model saved at: {}", cfg.model_path.display());

    evaluate(&model, DataLoader::new(&test_data, cfg.eval).sequential())
}

fn test_on<M: Network>(
    dev: &M::Device,
    cfg: &Config,
    model_path: &Path,
    data: &SampleFolder,
) -> Result<Accuracy> {
    let model = M::load(dev, model_path)?;
    info!(path = %model_path.display(), "loaded model");

    evaluate(&model, DataLoader::new(data, cfg.custom).sequential())
}
