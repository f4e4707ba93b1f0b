//! Turning files on disk into in-memory image/target pairs.

use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GrayImage};

use crate::dataloader::datasource::{FilenamePair, ImageData, ImageTargetPair};
use crate::dataloader::error::DataLoaderError;

pub mod label;
pub mod rgb;

pub use label::{ColorMapLoader, LabelLoader, ValueMapLoader};
pub use rgb::{RawRgbLoader, RgbLoader};

pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ImageData, DataLoaderError>;
}

pub trait TargetLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<GrayImage, DataLoaderError>;
}

pub(crate) fn open_image(path: &Path) -> Result<DynamicImage, DataLoaderError> {
    image::open(path).map_err(|source| DataLoaderError::ImageLoad {
        path: path.to_owned(),
        source,
    })
}

/// Loads both halves of a [`FilenamePair`].
#[derive(Clone)]
pub struct PairLoader {
    image_loader: Arc<dyn ImageLoader>,
    target_loader: Arc<dyn TargetLoader>,
}

impl PairLoader {
    pub fn new(image_loader: Arc<dyn ImageLoader>, target_loader: Arc<dyn TargetLoader>) -> Self {
        PairLoader {
            image_loader,
            target_loader,
        }
    }

    pub fn load(&self, filenames: &FilenamePair) -> Result<ImageTargetPair, DataLoaderError> {
        Ok(ImageTargetPair {
            image: self.image_loader.load(&filenames.image)?,
            target: self.target_loader.load(&filenames.target)?,
        })
    }
}
