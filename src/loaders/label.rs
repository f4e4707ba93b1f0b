use std::collections::HashMap;
use std::path::Path;

use image::{GrayImage, Luma};

use crate::dataloader::error::DataLoaderError;

use super::{open_image, TargetLoader};

/// Decodes a single-channel label map as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct LabelLoader;

impl TargetLoader for LabelLoader {
    fn load(&self, path: &Path) -> Result<GrayImage, DataLoaderError> {
        Ok(open_image(path)?.to_luma8())
    }
}

/// Decodes a label map and sends every value through a lookup table.
#[derive(Clone, Debug)]
pub struct ValueMapLoader {
    table: [u8; 256],
}

impl ValueMapLoader {
    pub fn new(table: [u8; 256]) -> Self {
        ValueMapLoader { table }
    }
}

impl TargetLoader for ValueMapLoader {
    fn load(&self, path: &Path) -> Result<GrayImage, DataLoaderError> {
        let mut target = open_image(path)?.to_luma8();
        for pixel in target.pixels_mut() {
            pixel[0] = self.table[pixel[0] as usize];
        }
        Ok(target)
    }
}

/// Decodes a color-coded label image, mapping each exact RGB triple to a class.
#[derive(Clone, Debug)]
pub struct ColorMapLoader {
    colors: HashMap<[u8; 3], u8>,
}

impl ColorMapLoader {
    pub fn new(colors: HashMap<[u8; 3], u8>) -> Self {
        ColorMapLoader { colors }
    }
}

impl TargetLoader for ColorMapLoader {
    fn load(&self, path: &Path) -> Result<GrayImage, DataLoaderError> {
        let image = open_image(path)?.to_rgb8();
        let mut target = GrayImage::new(image.width(), image.height());

        for (src, dst) in image.pixels().zip(target.pixels_mut()) {
            let class = self
                .colors
                .get(&src.0)
                .ok_or_else(|| DataLoaderError::UnknownColor {
                    color: src.0,
                    path: path.to_owned(),
                })?;
            *dst = Luma([*class]);
        }
        Ok(target)
    }
}
