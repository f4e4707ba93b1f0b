use std::path::Path;

use crate::dataloader::datasource::ImageData;
use crate::dataloader::error::DataLoaderError;

use super::{open_image, ImageLoader};

/// Decodes to RGB with intensities scaled into [0, 1].
#[derive(Clone, Copy, Debug, Default)]
pub struct RgbLoader;

impl ImageLoader for RgbLoader {
    fn load(&self, path: &Path) -> Result<ImageData, DataLoaderError> {
        Ok(ImageData::F32(open_image(path)?.to_rgb32f()))
    }
}

/// Decodes to 8-bit RGB. Pair with `CastToFloat` before batching.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawRgbLoader;

impl ImageLoader for RawRgbLoader {
    fn load(&self, path: &Path) -> Result<ImageData, DataLoaderError> {
        Ok(ImageData::U8(open_image(path)?.to_rgb8()))
    }
}
