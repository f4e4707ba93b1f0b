use std::sync::Mutex;

use crate::dataloader::error::DataLoaderError;

use super::{lock_state, SampleIterator};

/// Yields 0, 1, ..., len - 1 and wraps around.
pub struct SequentialIterator {
    len: usize,
    cursor: Mutex<usize>,
}

impl SequentialIterator {
    pub fn new(len: usize) -> Self {
        SequentialIterator {
            len,
            cursor: Mutex::new(0),
        }
    }
}

impl SampleIterator for SequentialIterator {
    fn next(&self) -> Result<usize, DataLoaderError> {
        if self.len == 0 {
            return Err(DataLoaderError::EmptyDataset);
        }

        let mut cursor = lock_state(&self.cursor)?;
        if *cursor >= self.len {
            *cursor = 0;
        }
        let index = *cursor;
        *cursor += 1;
        Ok(index)
    }

    fn reset(&self) -> Result<(), DataLoaderError> {
        *lock_state(&self.cursor)? = 0;
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }
}
