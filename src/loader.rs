use dfdx::data::{Collate, ExactSizeDataset, IteratorBatchExt};
use rand::Rng;

use crate::{datasets::Sample, error::Result};

/// Samples of one mini-batch with their images laid out back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub images: Vec<f32>,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub shuffle: bool,
}

pub type Batches<'r> = Box<dyn Iterator<Item = Result<Batch>> + 'r>;

pub struct DataLoader<'a, D> {
    dataset: &'a D,
    cfg: LoaderConfig,
}

impl<'a, D> DataLoader<'a, D>
where
    D: ExactSizeDataset<Item<'a> = Result<Sample>>,
{
    pub fn new(dataset: &'a D, cfg: LoaderConfig) -> Self {
        Self { dataset, cfg }
    }

    fn batch_size(&self) -> usize {
        self.cfg.batch_size.max(1)
    }

    pub fn num_batches(&self) -> usize {
        (self.dataset.len() + self.batch_size() - 1) / self.batch_size()
    }

    /// One pass over the dataset, shuffled with `rng` when configured to.
    pub fn epoch<R: Rng>(&self, rng: &mut R) -> Batches<'a> {
        if self.cfg.shuffle {
            batched(self.dataset.shuffled(rng), self.batch_size())
        } else {
            self.sequential()
        }
    }

    /// One pass in index order.
    pub fn sequential(&self) -> Batches<'a> {
        let dataset = self.dataset;
        batched((0..dataset.len()).map(move |i| dataset.get(i)), self.batch_size())
    }
}

fn batched<'r, I>(samples: I, batch_size: usize) -> Batches<'r>
where
    I: Iterator<Item = Result<Sample>> + 'r,
{
    Box::new(samples.batch_with_last(batch_size).map(collate))
}

fn collate(samples: Vec<Result<Sample>>) -> Result<Batch> {
    let pairs: Vec<(Vec<f32>, usize)> = samples
        .into_iter()
        .map(|s| s.map(|s| (s.image, s.label)))
        .collect::<Result<_>>()?;
    let (images, labels): (Vec<Vec<f32>>, Vec<usize>) = pairs.collated();
    Ok(Batch {
        images: images.concat(),
        labels,
    })
}
