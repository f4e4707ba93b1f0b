use image::{Rgb, Rgb32FImage};

use crate::dataloader::datasource::{ImageData, ImageTargetPair, VOID_LABEL};
use crate::dataloader::error::DataLoaderError;

use super::Augmentor;

/// Converts 8-bit images to float with intensities in [0, 1].
#[derive(Clone, Copy, Debug, Default)]
pub struct CastToFloat;

impl Augmentor for CastToFloat {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        if let ImageData::U8(image) = &pair.image {
            let float = Rgb32FImage::from_fn(image.width(), image.height(), |x, y| {
                let Rgb([r, g, b]) = *image.get_pixel(x, y);
                Rgb([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
            });
            pair.image = ImageData::F32(float);
        }
        Ok(())
    }
}

const CITYSCAPES_TRAIN_IDS: [u8; 34] = [
    255, 255, 255, 255, 255, 255, 255, // unlabeled .. ground
    0, 1, // road, sidewalk
    255, 255, // parking, rail track
    2, 3, 4, // building, wall, fence
    255, 255, 255, // guard rail, bridge, tunnel
    5, // pole
    255, // polegroup
    6, 7, 8, 9, 10, 11, 12, 13, 14, 15, // traffic light .. truck
    255, 255, // caravan, trailer
    16, 17, 18, // train, motorcycle, bicycle
];

/// Maps raw Cityscapes label ids to the 19 training ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct CityscapesLabelRemap;

impl CityscapesLabelRemap {
    pub fn train_id(label_id: u8) -> u8 {
        CITYSCAPES_TRAIN_IDS
            .get(label_id as usize)
            .copied()
            .unwrap_or(VOID_LABEL)
    }
}

impl Augmentor for CityscapesLabelRemap {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        for pixel in pair.target.pixels_mut() {
            pixel[0] = Self::train_id(pixel[0]);
        }
        Ok(())
    }
}
