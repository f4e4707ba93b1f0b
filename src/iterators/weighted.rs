use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::Rng;

use crate::dataloader::error::DataLoaderError;

use super::random::seeded_rng;
use super::{lock_state, SampleIterator};

/// Samples indices with replacement, index `i` with probability
/// `|w_i| / sum(|w|)`.
pub struct WeightedRandomIterator {
    cumulative: Vec<f64>,
    seed: Option<u64>,
    rng: Mutex<StdRng>,
}

impl WeightedRandomIterator {
    pub fn new(len: usize, weights: Vec<f64>, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        if len == 0 {
            return Err(DataLoaderError::EmptyDataset);
        }
        if weights.len() != len {
            return Err(DataLoaderError::WeightMismatch {
                weights: weights.len(),
                elements: len,
            });
        }

        Ok(WeightedRandomIterator {
            cumulative: cumulative_distribution(&weights)?,
            seed,
            rng: Mutex::new(seeded_rng(seed)),
        })
    }
}

fn cumulative_distribution(weights: &[f64]) -> Result<Vec<f64>, DataLoaderError> {
    let total: f64 = weights.iter().map(|w| w.abs()).sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(DataLoaderError::InvalidWeights(total));
    }

    let mut running = 0.0;
    Ok(weights
        .iter()
        .map(|w| {
            running += w.abs() / total;
            running
        })
        .collect())
}

impl SampleIterator for WeightedRandomIterator {
    fn next(&self) -> Result<usize, DataLoaderError> {
        if self.cumulative.is_empty() {
            return Err(DataLoaderError::EmptyDataset);
        }

        let u: f64 = lock_state(&self.rng)?.gen();
        let index = self.cumulative.partition_point(|&c| c <= u);
        // Rounding can leave the last bucket slightly below 1
        Ok(index.min(self.cumulative.len() - 1))
    }

    fn reset(&self) -> Result<(), DataLoaderError> {
        *lock_state(&self.rng)? = seeded_rng(self.seed);
        Ok(())
    }

    fn len(&self) -> usize {
        self.cumulative.len()
    }
}
