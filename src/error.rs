use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("directory not found or unreadable: {}", path.display())]
    DirectoryNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("filename {name:?} does not start with a 4 digit numeric prefix")]
    MalformedFilename { name: String },

    #[error("failed to decode image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("evaluation saw zero samples")]
    EmptyDataset,

    /// A label that does not fit the classifier head.
    #[error("label {found} exceeds the largest class index {max}")]
    LabelOutOfRange { found: usize, max: usize },

    #[error("batch holds {found} values, the network expects {expected}")]
    InputShape { expected: usize, found: usize },

    #[cfg(feature = "download")]
    #[error(transparent)]
    Download(#[from] crate::datasets::download::DownloadError),

    #[error("pretrained weights not found at {}", path.display())]
    PretrainedWeightsNotFound { path: PathBuf },

    #[error("model persistence failed for {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("optimizer update failed: {0}")]
    Optimizer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_names_the_bounds() {
        let err = Error::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(
            err.to_string(),
            "index 7 out of range for dataset of length 3"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
