pub mod cifar10;
#[cfg(feature = "download")]
pub(crate) mod download;
pub mod folder;
pub mod labeling;
pub mod split;

pub use cifar10::Cifar10;
pub use folder::SampleFolder;
pub use labeling::{LabelRule, ReservedClassSkip};
pub use split::{Split, Test, Train};

/// One preprocessed image (channel-major, see [`crate::transform`]) and its
/// class index.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: Vec<f32>,
    pub label: usize,
}
