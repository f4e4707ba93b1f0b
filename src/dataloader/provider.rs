//! Background batch assembly.
//!
//! A provider owns one prefetch thread. The thread builds a batch on a rayon
//! pool, then offers it through a zero-capacity channel and blocks until the
//! consumer takes it. It only starts on the next batch after the handoff, so at
//! most one finished batch exists between the two sides.
//!
//! `reset()` takes the build lock, so it waits for a batch that is being built,
//! and then bumps the generation. Batches from an older generation are dropped
//! by the consumer instead of being returned.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::augment::Augmentor;
use crate::iterators::SampleIterator;
use crate::loaders::PairLoader;

use super::config::ProviderConfig;
use super::data_batch::{encode_onehot, replace_nans, write_planar, DataBatch};
use super::datasource::{Dataset, FilenamePair, ImageTargetPair, PixelType};
use super::error::DataLoaderError;
use super::info::log_provider_info;

struct Tagged {
    generation: u64,
    result: Result<DataBatch, DataLoaderError>,
}

struct BatchBuilder {
    dataset: Dataset,
    iterator: Arc<dyn SampleIterator>,
    loader: PairLoader,
    augmentor: Option<Arc<dyn Augmentor>>,
    batch_size: usize,
    num_classes: usize,
    image_size: (u32, u32),
    target_size: (u32, u32),
    pool: ThreadPool,
}

impl BatchBuilder {
    fn load(&self, filenames: &FilenamePair) -> Result<ImageTargetPair, DataLoaderError> {
        let mut pair = self.loader.load(filenames)?;
        if let Some(augmentor) = &self.augmentor {
            augmentor.augment(&mut pair)?;
        }
        Ok(pair)
    }

    fn check_pair(&self, pair: &ImageTargetPair, filenames: &FilenamePair) -> Result<(), DataLoaderError> {
        check_size("image", &filenames.image, pair.image.dimensions(), self.image_size)?;
        check_size("target", &filenames.target, pair.target.dimensions(), self.target_size)?;
        if pair.image.pixel_type() != PixelType::F32 {
            return Err(DataLoaderError::TypeMismatch {
                expected: PixelType::F32,
                found: pair.image.pixel_type(),
            });
        }
        Ok(())
    }

    fn fill_slot(&self, image_dst: &mut [f32], target_dst: &mut [f32]) -> Result<usize, DataLoaderError> {
        // The only shared draw; loading and augmenting run unlocked
        let index = self.iterator.next()?;
        let filenames = &self.dataset[index];

        let pair = self.load(filenames)?;
        self.check_pair(&pair, filenames)?;

        encode_onehot(&pair.target, self.num_classes, target_dst)?;
        write_planar(pair.image.as_f32()?, image_dst);
        Ok(index)
    }

    fn build(&self, batch_number: usize) -> Result<DataBatch, DataLoaderError> {
        let mut batch = DataBatch::new(
            self.batch_size,
            self.num_classes,
            self.image_size,
            self.target_size,
            batch_number,
        );
        let image_stride = batch.image_stride();
        let target_stride = batch.target_stride();

        let (images, targets) = (&mut batch.images, &mut batch.targets);
        let indices = self.pool.install(|| {
            images
                .par_chunks_mut(image_stride)
                .zip(targets.par_chunks_mut(target_stride))
                .map(|(image_dst, target_dst)| self.fill_slot(image_dst, target_dst))
                .collect::<Result<Vec<usize>, DataLoaderError>>()
        })?;
        batch.indices = indices;

        let images = &mut batch.images;
        let replaced: usize = self
            .pool
            .install(|| images.par_chunks_mut(image_stride).map(replace_nans).sum());
        if replaced > 0 {
            tracing::trace!(batch_number, replaced, "replaced NaN image values");
        }

        Ok(batch)
    }
}

fn check_size(
    what: &'static str,
    path: &Path,
    (width, height): (u32, u32),
    (expected_width, expected_height): (u32, u32),
) -> Result<(), DataLoaderError> {
    if (width, height) != (expected_width, expected_height) {
        return Err(DataLoaderError::ShapeMismatch {
            what,
            path: path.to_owned(),
            expected_width,
            expected_height,
            width,
            height,
        });
    }
    Ok(())
}

fn run_prefetch(
    builder: BatchBuilder,
    sender: Sender<Tagged>,
    shutdown: Receiver<()>,
    build_lock: Arc<Mutex<()>>,
    generation: Arc<AtomicU64>,
) {
    let mut batch_number = 0;

    loop {
        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        let message = match build_lock.lock() {
            Ok(_guard) => {
                let generation = generation.load(Ordering::SeqCst);
                let result = builder.build(batch_number);
                Tagged { generation, result }
            }
            Err(_) => Tagged {
                generation: generation.load(Ordering::SeqCst),
                result: Err(DataLoaderError::LockPoisoned("batch build lock")),
            },
        };

        match &message.result {
            Ok(batch) => tracing::debug!(batch_number, indices = ?batch.indices, "batch ready"),
            Err(err) => tracing::error!(batch_number, error = %err, "failed to build batch"),
        }
        batch_number += 1;

        select! {
            send(sender, message) -> res => {
                if res.is_err() {
                    break;
                }
            }
            recv(shutdown) -> _ => break,
        }
    }

    tracing::debug!("batch prefetch thread stopped");
}

/// Hands out one-hot encoded batches assembled on a background thread.
pub struct DataProvider {
    dataset_len: usize,
    batch_size: usize,
    num_classes: usize,
    image_size: (u32, u32),
    target_size: (u32, u32),
    iterator: Arc<dyn SampleIterator>,
    receiver: Receiver<Tagged>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    build_lock: Arc<Mutex<()>>,
    generation: Arc<AtomicU64>,
}

impl DataProvider {
    /// Probes one sample to fix the batch geometry, rewinds the iterator and
    /// starts prefetching.
    pub fn new(
        dataset: Dataset,
        iterator: Arc<dyn SampleIterator>,
        loader: PairLoader,
        augmentor: Option<Arc<dyn Augmentor>>,
        config: ProviderConfig,
    ) -> Result<Self, DataLoaderError> {
        let config = config.build()?;
        if dataset.is_empty() {
            return Err(DataLoaderError::EmptyDataset);
        }
        if iterator.len() != dataset.len() {
            return Err(DataLoaderError::IteratorMismatch {
                iterator: iterator.len(),
                dataset: dataset.len(),
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("batch-worker-{}", i))
            .build()?;

        let mut builder = BatchBuilder {
            dataset,
            iterator: Arc::clone(&iterator),
            loader,
            augmentor,
            batch_size: config.batch_size,
            num_classes: config.num_classes,
            image_size: (0, 0),
            target_size: (0, 0),
            pool,
        };

        // The batch shape has to be known before workers write into it
        let probe_index = iterator.next()?;
        let probe = builder.load(&builder.dataset[probe_index])?;
        if probe.image.pixel_type() != PixelType::F32 {
            return Err(DataLoaderError::TypeMismatch {
                expected: PixelType::F32,
                found: probe.image.pixel_type(),
            });
        }
        builder.image_size = probe.image.dimensions();
        builder.target_size = probe.target.dimensions();
        iterator.reset()?;

        log_provider_info(builder.dataset.len(), &config, builder.image_size, builder.target_size);

        let (sender, receiver) = bounded(0);
        let (shutdown_sender, shutdown_receiver) = bounded(0);
        let build_lock = Arc::new(Mutex::new(()));
        let generation = Arc::new(AtomicU64::new(0));

        let mut provider = DataProvider {
            dataset_len: builder.dataset.len(),
            batch_size: config.batch_size,
            num_classes: config.num_classes,
            image_size: builder.image_size,
            target_size: builder.target_size,
            iterator,
            receiver,
            shutdown: Some(shutdown_sender),
            worker: None,
            build_lock: Arc::clone(&build_lock),
            generation: Arc::clone(&generation),
        };

        let worker = thread::Builder::new()
            .name("batch-prefetch".into())
            .spawn(move || run_prefetch(builder, sender, shutdown_receiver, build_lock, generation))?;
        provider.worker = Some(worker);

        Ok(provider)
    }

    /// Blocks until the background thread hands over the next batch. A failed
    /// build is returned here in place of that batch.
    pub fn next_batch(&mut self) -> Result<DataBatch, DataLoaderError> {
        loop {
            let message = self
                .receiver
                .recv()
                .map_err(|_| DataLoaderError::ProviderStopped)?;

            if message.generation == self.generation.load(Ordering::SeqCst) {
                return message.result;
            }
            tracing::warn!(generation = message.generation, "discarding batch built before reset");
        }
    }

    /// Rewinds the iterator. Waits for a batch that is currently being built;
    /// anything prefetched before the call is discarded by `next_batch`.
    pub fn reset(&self) -> Result<(), DataLoaderError> {
        let _guard = self
            .build_lock
            .lock()
            .map_err(|_| DataLoaderError::LockPoisoned("batch build lock"))?;
        self.iterator.reset()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Full batches per pass over the dataset; a trailing partial batch is dropped.
    pub fn num_batches(&self) -> usize {
        self.dataset_len / self.batch_size
    }

    pub fn len(&self) -> usize {
        self.dataset_len
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_len == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// `(width, height)` of every image in a batch.
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// `(width, height)` of every target in a batch.
    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    /// Signals the background thread and joins it. A batch that is being built
    /// is finished first.
    pub fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("batch prefetch thread panicked");
            }
        }
    }
}

impl Iterator for DataProvider {
    type Item = Result<DataBatch, DataLoaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Err(DataLoaderError::ProviderStopped) => None,
            other => Some(other),
        }
    }
}

impl Drop for DataProvider {
    fn drop(&mut self) {
        self.stop();
    }
}
