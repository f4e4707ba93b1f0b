use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataloader::error::DataLoaderError;

use super::{lock_state, SampleIterator};

struct Permutation {
    indices: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl Permutation {
    fn new(len: usize, seed: Option<u64>) -> Self {
        let mut permutation = Permutation {
            indices: (0..len).collect(),
            cursor: 0,
            rng: seeded_rng(seed),
        };
        permutation.shuffle();
        permutation
    }

    fn shuffle(&mut self) {
        self.indices.shuffle(&mut self.rng);
        self.cursor = 0;
    }
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Visits every index once per epoch in shuffled order, reshuffling when the
/// permutation is exhausted.
pub struct RandomIterator {
    len: usize,
    seed: Option<u64>,
    state: Mutex<Permutation>,
}

impl RandomIterator {
    /// Without a seed every reshuffle and reset draws from system entropy.
    pub fn new(len: usize, seed: Option<u64>) -> Self {
        RandomIterator {
            len,
            seed,
            state: Mutex::new(Permutation::new(len, seed)),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl SampleIterator for RandomIterator {
    fn next(&self) -> Result<usize, DataLoaderError> {
        if self.len == 0 {
            return Err(DataLoaderError::EmptyDataset);
        }

        let mut state = lock_state(&self.state)?;
        if state.cursor >= state.indices.len() {
            state.shuffle();
        }
        let index = state.indices[state.cursor];
        state.cursor += 1;
        Ok(index)
    }

    fn reset(&self) -> Result<(), DataLoaderError> {
        *lock_state(&self.state)? = Permutation::new(self.len, self.seed);
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }
}
