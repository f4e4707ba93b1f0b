use std::ops::Index;
use std::path::PathBuf;
use std::sync::Arc;

use image::{GrayImage, Rgb32FImage, RgbImage};

use super::error::DataLoaderError;

/// Label value marking pixels that belong to no class.
pub const VOID_LABEL: u8 = 255;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilenamePair {
    pub image: PathBuf,
    pub target: PathBuf,
}

impl FilenamePair {
    pub fn new(image: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        FilenamePair {
            image: image.into(),
            target: target.into(),
        }
    }
}

/// The ordered list of image/target files. Cloning shares the list.
#[derive(Clone, Debug)]
pub struct Dataset {
    pairs: Arc<[FilenamePair]>,
}

impl Dataset {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = FilenamePair>,
    {
        Dataset {
            pairs: pairs.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FilenamePair> {
        self.pairs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilenamePair> {
        self.pairs.iter()
    }
}

impl Index<usize> for Dataset {
    type Output = FilenamePair;

    fn index(&self, index: usize) -> &Self::Output {
        &self.pairs[index]
    }
}

impl<A, B> FromIterator<(A, B)> for Dataset
where
    A: Into<PathBuf>,
    B: Into<PathBuf>,
{
    fn from_iter<T: IntoIterator<Item = (A, B)>>(iter: T) -> Self {
        Dataset::new(iter.into_iter().map(|(image, target)| FilenamePair::new(image, target)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
    U8,
    F32,
}

/// The image half of a pair, either as decoded or already normalized.
#[derive(Clone, Debug)]
pub enum ImageData {
    U8(RgbImage),
    F32(Rgb32FImage),
}

impl ImageData {
    pub fn width(&self) -> u32 {
        match self {
            ImageData::U8(img) => img.width(),
            ImageData::F32(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            ImageData::U8(img) => img.height(),
            ImageData::F32(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            ImageData::U8(_) => PixelType::U8,
            ImageData::F32(_) => PixelType::F32,
        }
    }

    pub fn as_f32(&self) -> Result<&Rgb32FImage, DataLoaderError> {
        match self {
            ImageData::F32(img) => Ok(img),
            ImageData::U8(_) => Err(DataLoaderError::TypeMismatch {
                expected: PixelType::F32,
                found: PixelType::U8,
            }),
        }
    }

    pub fn as_f32_mut(&mut self) -> Result<&mut Rgb32FImage, DataLoaderError> {
        match self {
            ImageData::F32(img) => Ok(img),
            ImageData::U8(_) => Err(DataLoaderError::TypeMismatch {
                expected: PixelType::F32,
                found: PixelType::U8,
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageTargetPair {
    pub image: ImageData,
    pub target: GrayImage,
}

impl ImageTargetPair {
    pub fn new(image: ImageData, target: GrayImage) -> Self {
        ImageTargetPair { image, target }
    }

    /// Fails unless image and target cover the same pixel grid.
    pub fn check_aligned(&self, augmentor: &'static str) -> Result<(), DataLoaderError> {
        let (image_width, image_height) = self.image.dimensions();
        let (target_width, target_height) = self.target.dimensions();
        if (image_width, image_height) != (target_width, target_height) {
            return Err(DataLoaderError::Alignment {
                augmentor,
                image_width,
                image_height,
                target_width,
                target_height,
            });
        }
        Ok(())
    }
}
