use std::{io::Read, path::Path};

use curl::easy::Easy;
use thiserror::Error;
use tracing::info;

/// Fetches `url` into memory, checks it against `md5` and returns the
/// gunzipped bytes. `root` is created so callers can unpack into it.
pub(crate) fn download_to<P: AsRef<Path>>(
    root: P,
    url: &str,
    md5: &str,
) -> Result<Vec<u8>, DownloadError> {
    let root = root.as_ref();
    std::fs::create_dir_all(root)?;

    let mut compressed = Vec::new();
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.progress(true)?;

    info!(url, "downloading");
    {
        let mut dl = easy.transfer();
        let pb = indicatif::ProgressBar::new(1);
        dl.progress_function(move |total_dl, cur_dl, _, _| {
            pb.set_length(total_dl as u64);
            pb.set_position(cur_dl as u64);
            true
        })?;
        dl.write_function(|data| {
            compressed.extend_from_slice(data);
            Ok(data.len())
        })?;
        dl.perform()?;
    }

    info!(md5, "verifying hash");
    let digest = format!("{:?}", md5::compute(&compressed));
    if digest != md5 {
        return Err(DownloadError::Md5Mismatch {
            expected: md5.to_owned(),
            found: digest,
        });
    }

    info!(bytes = compressed.len(), "deflating");
    let mut uncompressed = Vec::new();
    let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
    decoder.read_to_end(&mut uncompressed)?;
    Ok(uncompressed)
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("download transfer error: {0}")]
    CurlError(#[from] curl::Error),
    #[error("md5 mismatch: expected {expected}, found {found}")]
    Md5Mismatch { expected: String, found: String },
}
