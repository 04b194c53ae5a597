use tracing::info;

use crate::{
    error::{Error, Result},
    loader::Batch,
};

/// Inference only; implementations must not track gradients.
pub trait Classifier {
    fn num_classes(&self) -> usize;

    /// Class scores for every sample of `batch`, row major
    /// (`batch.len() x num_classes()`).
    fn logits(&self, batch: &Batch) -> Result<Vec<f32>>;

    fn predict(&self, batch: &Batch) -> Result<Vec<usize>> {
        let logits = self.logits(batch)?;
        Ok(logits
            .chunks(self.num_classes().max(1))
            .map(argmax)
            .collect())
    }
}

/// Index of the largest score; the first one wins ties.
fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    /// `100 * correct / total`, truncated.
    pub fn percent(&self) -> usize {
        100 * self.correct / self.total.max(1)
    }
}

/// Runs `model` over every batch and counts arg-max hits. A source that
/// yields no samples is an error rather than a 0/0 accuracy.
pub fn evaluate<C, I>(model: &C, batches: I) -> Result<Accuracy>
where
    C: Classifier + ?Sized,
    I: IntoIterator<Item = Result<Batch>>,
{
    let mut acc = Accuracy::default();
    for batch in batches {
        let batch = batch?;
        let predicted = model.predict(&batch)?;
        acc.total += batch.labels.len();
        acc.correct += predicted
            .iter()
            .zip(&batch.labels)
            .filter(|(p, l)| p == l)
            .count();
    }
    if acc.total == 0 {
        return Err(Error::EmptyDataset);
    }
    info!(
        "Accuracy of the network on the {} test images: {} %",
        acc.total,
        acc.percent()
    );
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores the class stored in the first pixel of each image highest.
    struct Oracle {
        classes: usize,
    }

    impl Classifier for Oracle {
        fn num_classes(&self) -> usize {
            self.classes
        }

        fn logits(&self, batch: &Batch) -> Result<Vec<f32>> {
            let mut out = vec![0.0; batch.len() * self.classes];
            for (row, px) in batch.images.iter().enumerate() {
                out[row * self.classes + *px as usize] = 1.0;
            }
            Ok(out)
        }
    }

    fn batch(classes: &[usize], labels: &[usize]) -> Result<Batch> {
        Ok(Batch {
            images: classes.iter().map(|&c| c as f32).collect(),
            labels: labels.to_vec(),
        })
    }

    #[test]
    fn perfect_predictions_score_100() {
        let model = Oracle { classes: 10 };
        let batches = vec![batch(&[1, 2, 3], &[1, 2, 3]), batch(&[9], &[9])];
        let acc = evaluate(&model, batches).unwrap();
        assert_eq!(acc, Accuracy { correct: 4, total: 4 });
        assert_eq!(acc.percent(), 100);
    }

    #[test]
    fn percent_is_truncated() {
        let model = Oracle { classes: 4 };
        let batches = vec![batch(&[0, 1, 2], &[0, 1, 3])];
        let acc = evaluate(&model, batches).unwrap();
        assert_eq!(acc.percent(), 66);
    }

    #[test]
    fn no_batches_is_an_error() {
        let model = Oracle { classes: 4 };
        let res = evaluate(&model, Vec::<Result<Batch>>::new());
        assert!(matches!(res, Err(Error::EmptyDataset)));
    }

    #[test]
    fn batch_errors_propagate() {
        let model = Oracle { classes: 4 };
        let batches = vec![batch(&[0], &[0]), Err(Error::IndexOutOfRange { index: 9, len: 1 })];
        assert!(matches!(
            evaluate(&model, batches),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[-3.0, -1.0]), 1);
    }
}
