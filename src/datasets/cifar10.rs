use std::{
    fs::File,
    io::{BufReader, Read},
    marker::PhantomData,
    path::Path,
};

use dfdx::data::ExactSizeDataset;
use image::{Rgb, RgbImage};
use tracing::info;

#[cfg(feature = "download")]
use super::download::download_to;
use super::{
    split::{Split, Test, Train},
    Sample,
};
use crate::{
    error::{Error, Result},
    transform::Preprocess,
};

pub struct Cifar10<S> {
    data: Vec<(RgbImage, usize)>,
    preprocess: Preprocess,
    split: PhantomData<S>,
}

impl<S: Split> ExactSizeDataset for Cifar10<S> {
    type Item<'a> = Result<Sample> where Self: 'a;

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Self::Item<'_> {
        let (img, label) = self.data.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.data.len(),
        })?;
        Ok(Sample {
            image: self.preprocess.apply(img),
            label: *label,
        })
    }
}

impl Cifar10<Train> {
    pub fn new<P: AsRef<Path>>(root: P, preprocess: Preprocess) -> Result<Self> {
        Self::load(root, preprocess, &TRAIN_FILES)
    }
}

impl Cifar10<Test> {
    pub fn new<P: AsRef<Path>>(root: P, preprocess: Preprocess) -> Result<Self> {
        Self::load(root, preprocess, &TEST_FILES)
    }
}

impl<S: Split> Cifar10<S> {
    fn load<P: AsRef<Path>>(
        root: P,
        preprocess: Preprocess,
        files: &[&str],
    ) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.ends_with("cifar10") {
            root.to_path_buf()
        } else {
            root.join("cifar10")
        };

        if !root.exists() || files.iter().any(|f| !root.join(f).exists()) {
            fetch(&root)?;
        }
        let mut data = Vec::new();
        for &f in files {
            load_bin(root.join(f), &mut data)?;
        }
        info!(split = S::NAME, samples = data.len(), "loaded cifar10");

        Ok(Self {
            data,
            preprocess,
            split: PhantomData,
        })
    }
}

#[cfg(feature = "download")]
fn fetch(root: &Path) -> Result<()> {
    let uncompressed = download_to(root, URL, MD5)?;
    let mut archive = tar::Archive::new(&uncompressed[..]);
    archive.unpack(root)?;
    Ok(())
}

#[cfg(not(feature = "download"))]
fn fetch(root: &Path) -> Result<()> {
    Err(Error::DirectoryNotFound {
        path: root.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "cifar10 batches missing and the `download` feature is disabled",
        ),
    })
}

#[cfg(feature = "download")]
const URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
#[cfg(feature = "download")]
const MD5: &str = "c32a1d4ab5d03f1284b67883e8d87530";
const TRAIN_FILES: [&str; 5] = [
    "cifar-10-batches-bin/data_batch_1.bin",
    "cifar-10-batches-bin/data_batch_2.bin",
    "cifar-10-batches-bin/data_batch_3.bin",
    "cifar-10-batches-bin/data_batch_4.bin",
    "cifar-10-batches-bin/data_batch_5.bin",
];
const TEST_FILES: [&str; 1] = ["cifar-10-batches-bin/test_batch.bin"];

const IMAGES_PER_FILE: usize = 10_000;
/// One label byte followed by a 32x32 image stored plane by plane.
const RECORD_LEN: usize = 1 + 3 * 32 * 32;

fn load_bin<P: AsRef<Path>>(path: P, data: &mut Vec<(RgbImage, usize)>) -> Result<()> {
    let f = File::open(path)?;
    let found = f.metadata()?.len();
    if found != (RECORD_LEN * IMAGES_PER_FILE) as u64 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "cifar10 batch has {found} bytes, expected {}",
                RECORD_LEN * IMAGES_PER_FILE
            ),
        )
        .into());
    }

    let mut r = BufReader::new(f);
    for _ in 0..IMAGES_PER_FILE {
        data.push(read_record(&mut r)?);
    }
    Ok(())
}

fn read_record<R: Read>(r: &mut R) -> std::io::Result<(RgbImage, usize)> {
    let mut lbl_buf = [0u8; 1];
    r.read_exact(&mut lbl_buf)?;
    let lbl = lbl_buf[0] as usize;

    let mut img_buf = vec![0u8; RECORD_LEN - 1];
    r.read_exact(&mut img_buf)?;
    let img = RgbImage::from_fn(32, 32, |x, y| {
        let x = x as usize;
        let y = y as usize;
        Rgb([
            img_buf[y * 32 + x],
            img_buf[32 * 32 + y * 32 + x],
            img_buf[2 * 32 * 32 + y * 32 + x],
        ])
    });
    Ok((img, lbl))
}

pub const LABEL_NAMES: [&str; 10] = [
    "Airplane",
    "Automobile",
    "Bird",
    "Cat",
    "Deer",
    "Dog",
    "Frog",
    "Horse",
    "Ship",
    "Truck",
];
