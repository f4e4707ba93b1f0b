//! Randomized transforms applied in place to an image/target pair.
//!
//! Every stochastic augmentor owns its generator behind a mutex. Only the draw
//! happens under the lock, so a single instance can be shared by all workers.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;

use crate::dataloader::datasource::ImageTargetPair;
use crate::dataloader::error::DataLoaderError;
use crate::iterators::random::seeded_rng;

mod color;
pub mod convert;
pub mod crop;
pub mod geometric;
pub mod photometric;
mod resample;

pub use convert::{CastToFloat, CityscapesLabelRemap};
pub use crop::CropAugmentor;
pub use geometric::{RotationAugmentor, SubsampleAugmentor, TranslationAugmentor, ZoomingAugmentor};
pub use photometric::{
    BlurAugmentor, BrightnessAugmentor, GammaAugmentor, HueAugmentor, SaturationAugmentor,
};

pub trait Augmentor: Send + Sync {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError>;
}

/// Applies its children in registration order.
#[derive(Clone, Default)]
pub struct CombinedAugmentor {
    augmentors: Vec<Arc<dyn Augmentor>>,
}

impl CombinedAugmentor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, augmentor: Arc<dyn Augmentor>) {
        self.augmentors.push(augmentor);
    }

    pub fn with(mut self, augmentor: impl Augmentor + 'static) -> Self {
        self.add(Arc::new(augmentor));
        self
    }

    pub fn len(&self) -> usize {
        self.augmentors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.augmentors.is_empty()
    }
}

impl Augmentor for CombinedAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        for augmentor in &self.augmentors {
            augmentor.augment(pair)?;
        }
        Ok(())
    }
}

/// A generator owned by one augmentor.
pub(crate) struct RngCell {
    rng: Mutex<StdRng>,
}

impl RngCell {
    pub(crate) fn new(seed: Option<u64>) -> Self {
        RngCell {
            rng: Mutex::new(seeded_rng(seed)),
        }
    }

    pub(crate) fn draw<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Result<T, DataLoaderError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| DataLoaderError::LockPoisoned("augmentor rng"))?;
        Ok(f(&mut rng))
    }
}
