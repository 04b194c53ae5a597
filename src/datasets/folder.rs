use std::{
    fs::DirEntry,
    path::{Path, PathBuf},
};

use dfdx::data::ExactSizeDataset;
use tracing::debug;

use super::{
    labeling::{parse_prefix, LabelRule, ReservedClassSkip},
    Sample,
};
use crate::{
    error::{Error, Result},
    transform::Preprocess,
};

/// Decides whether a directory entry is a sample at all.
pub type EntryFilter = fn(&DirEntry) -> bool;

/// Drops hidden entries such as `.ipynb_checkpoints` and anything that is
/// not a file once symlinks are followed.
pub fn skip_housekeeping(entry: &DirEntry) -> bool {
    let hidden = entry.file_name().to_string_lossy().starts_with('.');
    !hidden && entry.path().is_file()
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    prefix: u32,
}

/// Images whose class is encoded in a 4 digit filename prefix, ordered by
/// that prefix once at construction.
pub struct SampleFolder<L = ReservedClassSkip> {
    root: PathBuf,
    entries: Vec<Entry>,
    labels: L,
    preprocess: Preprocess,
}

impl SampleFolder<ReservedClassSkip> {
    pub fn new<P: AsRef<Path>>(root: P, preprocess: Preprocess) -> Result<Self> {
        Self::with_rule(root, preprocess, ReservedClassSkip::default())
    }
}

impl<L: LabelRule> SampleFolder<L> {
    pub fn with_rule<P: AsRef<Path>>(root: P, preprocess: Preprocess, labels: L) -> Result<Self> {
        Self::with_filter(root, preprocess, labels, skip_housekeeping)
    }

    pub fn with_filter<P: AsRef<Path>>(
        root: P,
        preprocess: Preprocess,
        labels: L,
        keep: EntryFilter,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let not_found = |source| Error::DirectoryNotFound {
            path: root.clone(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(not_found)? {
            let entry = entry.map_err(not_found)?;
            if !keep(&entry) {
                debug!(name = ?entry.file_name(), "skipping non-sample entry");
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let prefix = parse_prefix(&name).ok_or_else(|| Error::MalformedFilename {
                name: name.clone(),
            })?;
            entries.push(Entry { name, prefix });
        }
        // ties broken by name so the order does not depend on the listing
        entries.sort_by(|a, b| a.prefix.cmp(&b.prefix).then_with(|| a.name.cmp(&b.name)));

        debug!(root = %root.display(), samples = entries.len(), "indexed sample folder");
        Ok(Self {
            root,
            entries,
            labels,
            preprocess,
        })
    }

    fn entry(&self, index: usize) -> Result<&Entry> {
        self.entries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }
}

impl<L: LabelRule> ExactSizeDataset for SampleFolder<L> {
    type Item<'a> = Result<Sample> where Self: 'a;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Self::Item<'_> {
        let entry = self.entry(index)?;
        let path = self.root.join(&entry.name);
        let img = image::open(&path)
            .map_err(|source| Error::ImageDecode { path, source })?
            .into_rgb8();
        Ok(Sample {
            image: self.preprocess.apply(&img),
            label: self.labels.label(entry.prefix),
        })
    }
}
