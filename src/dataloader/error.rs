use std::path::PathBuf;

use thiserror::Error;

use super::datasource::PixelType;

#[derive(Error, Debug)]
pub enum DataLoaderError {
    // Dataset and iteration errors
    #[error("No elements found in the dataset")]
    EmptyDataset,

    #[error("Number of weights ({weights}) differs from number of elements ({elements})")]
    WeightMismatch { weights: usize, elements: usize },

    #[error("Sampling weights must sum to a positive finite total, got {0}")]
    InvalidWeights(f64),

    #[error("Iterator covers {iterator} elements but the dataset has {dataset}")]
    IteratorMismatch { iterator: usize, dataset: usize },

    // Loading errors
    #[error("Could not load image '{}': {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Unknown color ({}, {}, {}) in image '{}'", color[0], color[1], color[2], path.display())]
    UnknownColor { color: [u8; 3], path: PathBuf },

    // Shape and type errors
    #[error("Expected {what} of size {expected_width}x{expected_height} for '{}', got {width}x{height}", path.display())]
    ShapeMismatch {
        what: &'static str,
        path: PathBuf,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Expected image of type {expected:?}, got {found:?}")]
    TypeMismatch { expected: PixelType, found: PixelType },

    #[error("Image ({image_width}x{image_height}) and target ({target_width}x{target_height}) must be of the same size for {augmentor}")]
    Alignment {
        augmentor: &'static str,
        image_width: u32,
        image_height: u32,
        target_width: u32,
        target_height: u32,
    },

    #[error("Crop of size {size} does not fit into a {width}x{height} target")]
    CropTooLarge { size: u32, width: u32, height: u32 },

    #[error("Label {value} is neither void (255) nor below the number of classes ({num_classes})")]
    LabelOutOfRange { value: u8, num_classes: usize },

    // Construction errors
    #[error("Invalid parameter for {augmentor}: {reason}")]
    InvalidParameter {
        augmentor: &'static str,
        reason: String,
    },

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    // IO and system errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // Runtime errors
    #[error("Failed to acquire lock on {0}")]
    LockPoisoned(&'static str),

    #[error("Background batch thread has stopped")]
    ProviderStopped,

    #[error("Failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl DataLoaderError {
    pub(crate) fn invalid_parameter(augmentor: &'static str, reason: impl Into<String>) -> Self {
        DataLoaderError::InvalidParameter {
            augmentor,
            reason: reason.into(),
        }
    }
}
