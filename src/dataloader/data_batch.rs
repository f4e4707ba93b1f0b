use image::{GrayImage, Rgb32FImage};

use super::datasource::VOID_LABEL;
use super::error::DataLoaderError;

/// A packed batch. `images` is `[batch, 3, height, width]` and `targets` is the
/// one-hot `[batch, classes, height, width]`, both row major.
#[derive(Debug)]
pub struct DataBatch {
    pub images: Box<[f32]>,
    pub targets: Box<[f32]>,
    pub image_shape: [usize; 4],
    pub target_shape: [usize; 4],
    pub indices: Vec<usize>,
    pub batch_number: usize,
}

impl DataBatch {
    pub fn new(
        batch_size: usize,
        num_classes: usize,
        image_size: (u32, u32),
        target_size: (u32, u32),
        batch_number: usize,
    ) -> DataBatch {
        let image_shape = [batch_size, 3, image_size.1 as usize, image_size.0 as usize];
        let target_shape = [
            batch_size,
            num_classes,
            target_size.1 as usize,
            target_size.0 as usize,
        ];

        DataBatch {
            images: vec![0.0; image_shape.iter().product()].into_boxed_slice(),
            targets: vec![0.0; target_shape.iter().product()].into_boxed_slice(),
            image_shape,
            target_shape,
            indices: Vec::with_capacity(batch_size),
            batch_number,
        }
    }

    pub fn len(&self) -> usize {
        self.image_shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn image_stride(&self) -> usize {
        self.image_shape[1..].iter().product()
    }

    pub fn target_stride(&self) -> usize {
        self.target_shape[1..].iter().product()
    }

    pub fn image(&self, slot: usize) -> &[f32] {
        let stride = self.image_stride();
        &self.images[slot * stride..(slot + 1) * stride]
    }

    pub fn target(&self, slot: usize) -> &[f32] {
        let stride = self.target_stride();
        &self.targets[slot * stride..(slot + 1) * stride]
    }
}

/// Copies an interleaved RGB image into three consecutive planes.
pub(crate) fn write_planar(image: &Rgb32FImage, dst: &mut [f32]) {
    let plane = (image.width() * image.height()) as usize;
    debug_assert_eq!(dst.len(), 3 * plane);

    let (red, rest) = dst.split_at_mut(plane);
    let (green, blue) = rest.split_at_mut(plane);
    for (k, pixel) in image.pixels().enumerate() {
        red[k] = pixel[0];
        green[k] = pixel[1];
        blue[k] = pixel[2];
    }
}

/// Writes a one-hot encoding of `target` into `dst`, which must be zeroed.
/// Void pixels leave every class plane at zero.
pub(crate) fn encode_onehot(
    target: &GrayImage,
    num_classes: usize,
    dst: &mut [f32],
) -> Result<(), DataLoaderError> {
    let plane = (target.width() * target.height()) as usize;
    debug_assert_eq!(dst.len(), num_classes * plane);

    for (k, pixel) in target.pixels().enumerate() {
        let value = pixel[0];
        if value == VOID_LABEL {
            continue;
        }
        if value as usize >= num_classes {
            return Err(DataLoaderError::LabelOutOfRange { value, num_classes });
        }
        dst[value as usize * plane + k] = 1.0;
    }
    Ok(())
}

/// Returns the number of replaced values.
pub(crate) fn replace_nans(data: &mut [f32]) -> usize {
    let mut replaced = 0;
    for value in data.iter_mut().filter(|v| v.is_nan()) {
        *value = 0.0;
        replaced += 1;
    }
    replaced
}
