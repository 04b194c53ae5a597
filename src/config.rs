use std::path::PathBuf;

use crate::loader::LoaderConfig;

/// Hyperparameters and filesystem layout for a run. There is no config file;
/// the defaults below are the values the tool runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub train: TrainConfig,
    /// Loader for the benchmark test split evaluated after training.
    pub eval: LoaderConfig,
    /// Loader for a custom sample folder in test mode.
    pub custom: LoaderConfig,
    pub seed: u64,
    /// CIFAR-10 is unpacked into `<dataset_root>/cifar10`.
    pub dataset_root: PathBuf,
    /// Where the fine-tuned network is written.
    pub model_path: PathBuf,
    /// npz weights of the pretrained baseline.
    pub pretrained_weights: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub learning_rate: f32,
    pub momentum: f32,
    pub loader: LoaderConfig,
    /// Mini-batches per running-loss report.
    pub report_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            momentum: 0.9,
            loader: LoaderConfig {
                batch_size: 4,
                shuffle: true,
            },
            report_every: 2000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            train: TrainConfig::default(),
            eval: LoaderConfig {
                batch_size: 4,
                shuffle: false,
            },
            custom: LoaderConfig {
                batch_size: 3,
                shuffle: false,
            },
            seed: 0,
            dataset_root: PathBuf::from("./../datasets/alexnet"),
            model_path: PathBuf::from("./../models/alexnet/model.npz"),
            pretrained_weights: PathBuf::from("./../models/alexnet/pretrained.npz"),
        }
    }
}
