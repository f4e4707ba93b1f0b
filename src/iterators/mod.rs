//! Sampling policies over dataset indices.
//!
//! Every iterator guards its cursor and generator with a single mutex, so one
//! instance can be shared by all workers filling a batch. The lock is only held
//! for the index draw itself.

use std::sync::{Mutex, MutexGuard};

use crate::dataloader::error::DataLoaderError;

pub mod random;
pub mod sequential;
pub mod weighted;

pub use random::RandomIterator;
pub use sequential::SequentialIterator;
pub use weighted::WeightedRandomIterator;

pub trait SampleIterator: Send + Sync {
    /// Draws the next dataset index.
    fn next(&self) -> Result<usize, DataLoaderError>;

    /// Restarts the ordering from its initial state.
    fn reset(&self) -> Result<(), DataLoaderError>;

    /// Number of elements iterated over.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn lock_state<T>(state: &Mutex<T>) -> Result<MutexGuard<'_, T>, DataLoaderError> {
    state
        .lock()
        .map_err(|_| DataLoaderError::LockPoisoned("iterator state"))
}
