use std::path::Path;

use dfdx::{
    optim::{Momentum, Optimizer, Sgd, SgdConfig},
    prelude::*,
    tensor_ops::Device,
};
use tracing::info;
#[cfg(feature = "cuda")]
use tracing::warn;

use crate::{
    error::{Error, Result},
    evaluate::Classifier,
    loader::Batch,
    train::TrainStep,
    transform::{CHANNELS, CROP, IMAGE_LEN},
};

/// Width of the classifier head. Kept at the ImageNet size so published
/// weights load unchanged; dataset labels only use the low indices.
pub const NUM_CLASSES: usize = 1000;

type Features = (
    (Conv2D<3, 64, 11, 4, 2>, ReLU, MaxPool2D<3, 2>),
    (Conv2D<64, 192, 5, 1, 2>, ReLU, MaxPool2D<3, 2>),
    (Conv2D<192, 384, 3, 1, 1>, ReLU),
    (Conv2D<384, 256, 3, 1, 1>, ReLU),
    (Conv2D<256, 256, 3, 1, 1>, ReLU, MaxPool2D<3, 2>),
);

type Head<const N: usize> = (
    (Dropout, Linear<9216, 4096>, ReLU),
    (Dropout, Linear<4096, 4096>, ReLU),
    Linear<4096, N>,
);

pub type AlexNet<const N: usize> = (Features, Flatten2D, Head<N>);

type Net<D> = <AlexNet<NUM_CLASSES> as BuildOnDevice<D, f32>>::Built;
type Images<D> = Tensor<(usize, Const<CHANNELS>, Const<CROP>, Const<CROP>), f32, D>;
type Targets<D> = Tensor<(usize, Const<NUM_CLASSES>), f32, D>;

pub enum ComputeDevice {
    Cpu(Cpu),
    #[cfg(feature = "cuda")]
    Cuda(Cuda),
}

/// Picks the first CUDA device when built with `cuda` and one is present,
/// otherwise the CPU. Called once per run.
pub fn select_device(seed: u64) -> ComputeDevice {
    #[cfg(feature = "cuda")]
    match Cuda::try_build(0, seed) {
        Ok(dev) => {
            info!(device = "cuda:0", "selected compute device");
            return ComputeDevice::Cuda(dev);
        }
        Err(e) => warn!(error = ?e, "cuda unavailable, falling back to cpu"),
    }
    info!(device = "cpu", "selected compute device");
    ComputeDevice::Cpu(Cpu::seed_from_u64(seed))
}

/// A classifier that can be built, persisted and fine-tuned on one device.
pub trait Network: Classifier + Sized {
    type Device;
    type Trainer<'m>: TrainStep
    where
        Self: 'm;

    fn fresh(dev: &Self::Device) -> Self;
    fn load_weights(&mut self, path: &Path) -> Result<()>;
    fn save(&self, path: &Path) -> Result<()>;
    fn sgd(&mut self, lr: f32, momentum: f32) -> Self::Trainer<'_>;

    fn load(dev: &Self::Device, path: &Path) -> Result<Self> {
        let mut model = Self::fresh(dev);
        model.load_weights(path)?;
        Ok(model)
    }

    /// The baseline to fine-tune from. Training never starts from random
    /// weights, so a missing file is an error.
    fn pretrained(dev: &Self::Device, weights: &Path) -> Result<Self> {
        if !weights.is_file() {
            return Err(Error::PretrainedWeightsNotFound {
                path: weights.to_path_buf(),
            });
        }
        let model = Self::load(dev, weights)?;
        info!(path = %weights.display(), "loaded pretrained alexnet");
        Ok(model)
    }
}

pub struct AlexNetModel<D: Device<f32>>
where
    AlexNet<NUM_CLASSES>: BuildOnDevice<D, f32>,
{
    dev: D,
    net: Net<D>,
}

/// Plain SGD with classic momentum over cross-entropy loss.
pub struct SgdTrainer<'m, D: Device<f32>>
where
    AlexNet<NUM_CLASSES>: BuildOnDevice<D, f32>,
{
    model: &'m mut AlexNetModel<D>,
    opt: Sgd<Net<D>, f32, D>,
    grads: Option<Gradients<f32, D>>,
}

fn persistence_error<E: std::fmt::Debug>(path: &Path, e: E) -> Error {
    Error::Persistence {
        path: path.to_path_buf(),
        message: format!("{e:?}"),
    }
}

fn images<D: Device<f32>>(dev: &D, batch: &Batch) -> Result<Images<D>> {
    let expected = batch.len() * IMAGE_LEN;
    if batch.images.len() != expected {
        return Err(Error::InputShape {
            expected,
            found: batch.images.len(),
        });
    }
    Ok(dev.tensor_from_vec(
        batch.images.clone(),
        (batch.len(), Const::<CHANNELS>, Const::<CROP>, Const::<CROP>),
    ))
}

fn one_hot<D: Device<f32>>(dev: &D, labels: &[usize]) -> Result<Targets<D>> {
    let mut data = vec![0.0; labels.len() * NUM_CLASSES];
    for (row, &lbl) in labels.iter().enumerate() {
        if lbl >= NUM_CLASSES {
            return Err(Error::LabelOutOfRange {
                found: lbl,
                max: NUM_CLASSES - 1,
            });
        }
        data[row * NUM_CLASSES + lbl] = 1.0;
    }
    Ok(dev.tensor_from_vec(data, (labels.len(), Const::<NUM_CLASSES>)))
}

macro_rules! impl_network {
    ($dev:ty) => {
        impl Network for AlexNetModel<$dev> {
            type Device = $dev;
            type Trainer<'m> = SgdTrainer<'m, $dev>;

            fn fresh(dev: &$dev) -> Self {
                Self {
                    dev: dev.clone(),
                    net: dev.build_module::<AlexNet<NUM_CLASSES>, f32>(),
                }
            }

            fn load_weights(&mut self, path: &Path) -> Result<()> {
                self.net.load(path).map_err(|e| persistence_error(path, e))
            }

            fn save(&self, path: &Path) -> Result<()> {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                self.net.save(path).map_err(|e| persistence_error(path, e))
            }

            fn sgd(&mut self, lr: f32, momentum: f32) -> SgdTrainer<'_, $dev> {
                let opt = Sgd::new(
                    &self.net,
                    SgdConfig {
                        lr,
                        momentum: Some(Momentum::Classic(momentum)),
                        weight_decay: None,
                    },
                );
                SgdTrainer {
                    model: self,
                    opt,
                    grads: None,
                }
            }
        }

        impl Classifier for AlexNetModel<$dev> {
            fn num_classes(&self) -> usize {
                NUM_CLASSES
            }

            fn logits(&self, batch: &Batch) -> Result<Vec<f32>> {
                let x = images(&self.dev, batch)?;
                Ok(self.net.forward(x).as_vec())
            }
        }

        impl TrainStep for SgdTrainer<'_, $dev> {
            fn train_step(&mut self, batch: &Batch) -> Result<f32> {
                let targets = one_hot(&self.model.dev, &batch.labels)?;
                let x = images(&self.model.dev, batch)?;

                let grads = match self.grads.take() {
                    Some(grads) => grads,
                    None => self.model.net.alloc_grads(),
                };
                let logits = self.model.net.forward_mut(x.traced(grads));
                let loss = cross_entropy_with_logits_loss(logits, targets);
                let loss_val = loss.array();

                let mut grads = loss.backward();
                self.opt
                    .update(&mut self.model.net, &grads)
                    .map_err(|e| Error::Optimizer(format!("{e:?}")))?;
                self.model.net.zero_grads(&mut grads);
                self.grads = Some(grads);
                Ok(loss_val)
            }
        }
    };
}

impl_network!(Cpu);
#[cfg(feature = "cuda")]
impl_network!(Cuda);

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn one_hot_rejects_labels_past_the_head() {
        let dev = Cpu::seed_from_u64(0);
        assert!(matches!(
            one_hot(&dev, &[0, NUM_CLASSES]),
            Err(Error::LabelOutOfRange { found, max }) if found == NUM_CLASSES && max == NUM_CLASSES - 1
        ));
        let ok = one_hot(&dev, &[2, 0]).unwrap().as_vec();
        assert_eq!(ok[2], 1.0);
        assert_eq!(ok[NUM_CLASSES], 1.0);
        assert_eq!(ok.iter().sum::<f32>(), 2.0);
    }

    #[test]
    fn mis_sized_batch_is_rejected_before_the_forward_pass() {
        let dev = Cpu::seed_from_u64(0);
        let batch = Batch {
            images: vec![0.0; 10],
            labels: vec![0],
        };
        assert!(matches!(
            images(&dev, &batch),
            Err(Error::InputShape { found: 10, .. })
        ));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn cpu_is_selected_without_cuda() {
        assert!(matches!(select_device(0), ComputeDevice::Cpu(_)));
    }

    #[test]
    fn missing_pretrained_weights_are_an_error() {
        let dev = Cpu::seed_from_u64(0);
        let dir = TempDir::new().unwrap();
        let weights = dir.path().join("none.npz");
        match AlexNetModel::<Cpu>::pretrained(&dev, &weights) {
            Err(Error::PretrainedWeightsNotFound { path }) => assert_eq!(path, weights),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("missing weights must not yield a model"),
        }
    }

    #[test]
    fn loading_a_missing_model_fails() {
        let dev = Cpu::seed_from_u64(0);
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            AlexNetModel::<Cpu>::load(&dev, &dir.path().join("model.npz")),
            Err(Error::Persistence { .. })
        ));
    }

    #[test]
    fn saved_model_reloads_with_identical_logits() {
        let dev = Cpu::seed_from_u64(0);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("model.npz");

        let model = AlexNetModel::<Cpu>::fresh(&dev);
        model.save(&path).unwrap();
        let reloaded = AlexNetModel::<Cpu>::load(&Cpu::seed_from_u64(1), &path).unwrap();

        let batch = Batch {
            images: vec![0.5; IMAGE_LEN],
            labels: vec![0],
        };
        let before = model.logits(&batch).unwrap();
        assert_eq!(before.len(), NUM_CLASSES);
        assert_eq!(before, reloaded.logits(&batch).unwrap());
    }
}
