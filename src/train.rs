use dfdx::data::ExactSizeDataset;
use rand::Rng;
use tracing::info;

use crate::{
    datasets::Sample,
    error::Result,
    loader::{Batch, DataLoader},
};

/// One optimisation step: forward, loss, backward, parameter update.
pub trait TrainStep {
    /// Returns the scalar loss of `batch` before the update.
    fn train_step(&mut self, batch: &Batch) -> Result<f32>;
}

/// Running mean of the loss, emitted and reset every `every` mini-batches.
#[derive(Debug, Clone)]
pub struct LossTracker {
    every: usize,
    sum: f32,
}

impl LossTracker {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            sum: 0.0,
        }
    }

    /// Records the loss of the `i`-th (zero based) mini-batch of an epoch.
    pub fn record(&mut self, i: usize, loss: f32) -> Option<f32> {
        self.sum += loss;
        if i % self.every == self.every - 1 {
            let avg = self.sum / self.every as f32;
            self.sum = 0.0;
            Some(avg)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub epochs: usize,
    pub steps: usize,
    /// `(epoch, batch, average loss)` for each emitted report, one based.
    pub losses: Vec<(usize, usize, f32)>,
}

pub fn train<'a, M, D, R>(
    model: &mut M,
    loader: &DataLoader<'a, D>,
    epochs: usize,
    report_every: usize,
    rng: &mut R,
) -> Result<TrainReport>
where
    M: TrainStep,
    D: ExactSizeDataset<Item<'a> = Result<Sample>>,
    R: Rng,
{
    let mut report = TrainReport {
        epochs,
        ..Default::default()
    };
    let mut tracker = LossTracker::new(report_every);

    for e in 0..epochs {
        tracker.reset();
        let pb = indicatif::ProgressBar::new(loader.num_batches() as u64);
        for (i, batch) in loader.epoch(rng).enumerate() {
            let loss = model.train_step(&batch?)?;
            report.steps += 1;
            pb.inc(1);
            if let Some(avg) = tracker.record(i, loss) {
                pb.suspend(|| info!("[{}, {:5}] loss: {:.3}", e + 1, i + 1, avg));
                report.losses.push((e + 1, i + 1, avg));
            }
        }
        pb.finish_and_clear();
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, loader::LoaderConfig};
    use rand::{rngs::StdRng, SeedableRng};

    struct Fixed(usize);

    impl ExactSizeDataset for Fixed {
        type Item<'a> = Result<Sample> where Self: 'a;

        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize) -> Self::Item<'_> {
            Ok(Sample {
                image: vec![index as f32],
                label: 0,
            })
        }
    }

    /// Loss equals the number of steps taken so far.
    #[derive(Default)]
    struct Counter {
        seen: Vec<usize>,
    }

    impl TrainStep for Counter {
        fn train_step(&mut self, batch: &Batch) -> Result<f32> {
            self.seen.push(batch.len());
            Ok(self.seen.len() as f32)
        }
    }

    fn loader_cfg(batch_size: usize) -> LoaderConfig {
        LoaderConfig {
            batch_size,
            shuffle: true,
        }
    }

    #[test]
    fn tracker_reports_on_cadence() {
        let mut t = LossTracker::new(3);
        assert_eq!(t.record(0, 1.0), None);
        assert_eq!(t.record(1, 2.0), None);
        assert_eq!(t.record(2, 3.0), Some(2.0));
        assert_eq!(t.record(3, 6.0), None);
        assert_eq!(t.record(4, 6.0), None);
        assert_eq!(t.record(5, 6.0), Some(6.0));
    }

    #[test]
    fn every_batch_of_every_epoch_is_stepped() {
        let data = Fixed(10);
        let loader = DataLoader::new(&data, loader_cfg(4));
        let mut model = Counter::default();
        let mut rng = StdRng::seed_from_u64(0);

        let report = train(&mut model, &loader, 2, 2, &mut rng).unwrap();
        assert_eq!(model.seen, vec![4, 4, 2, 4, 4, 2]);
        assert_eq!(report.steps, 6);
        // batches 1..=2 of each epoch form one report; the odd third never does
        assert_eq!(report.losses, vec![(1, 2, 1.5), (2, 2, 4.5)]);
    }

    #[test]
    fn zero_epochs_leaves_model_untouched() {
        let data = Fixed(3);
        let loader = DataLoader::new(&data, loader_cfg(1));
        let mut model = Counter::default();
        let mut rng = StdRng::seed_from_u64(0);
        let report = train(&mut model, &loader, 0, 2000, &mut rng).unwrap();
        assert!(model.seen.is_empty());
        assert_eq!(report.steps, 0);
    }

    struct Exploding;

    impl TrainStep for Exploding {
        fn train_step(&mut self, _: &Batch) -> Result<f32> {
            Err(Error::Optimizer("nan".into()))
        }
    }

    #[test]
    fn step_failures_abort_the_run() {
        let data = Fixed(3);
        let loader = DataLoader::new(&data, loader_cfg(1));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            train(&mut Exploding, &loader, 1, 1, &mut rng),
            Err(Error::Optimizer(_))
        ));
    }
}
