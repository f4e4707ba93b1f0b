use image::{GrayImage, Luma, Rgb, Rgb32FImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::Rng;

use crate::dataloader::datasource::{ImageData, ImageTargetPair, VOID_LABEL};
use crate::dataloader::error::DataLoaderError;

use super::resample::{resize_image, resize_label};
use super::{Augmentor, RngCell};

/// Downsizes by an integer factor. Labels are reduced by majority vote so that
/// no interpolated class ids appear.
pub struct SubsampleAugmentor {
    factor: u32,
}

impl SubsampleAugmentor {
    pub fn new(factor: u32) -> Result<Self, DataLoaderError> {
        if factor == 0 {
            return Err(DataLoaderError::invalid_parameter("subsample", "factor must be positive"));
        }
        Ok(SubsampleAugmentor { factor })
    }

    fn subsample_target(&self, target: &GrayImage) -> GrayImage {
        let f = self.factor;
        let half_block = (f * f / 2) as usize;

        GrayImage::from_fn(target.width() / f, target.height() / f, |x, y| {
            let mut histogram = [0usize; 256];
            for sy in y * f..(y + 1) * f {
                for sx in x * f..(x + 1) * f {
                    histogram[target.get_pixel(sx, sy)[0] as usize] += 1;
                }
            }

            let mut mode = 0;
            for (value, &count) in histogram.iter().enumerate() {
                if count > histogram[mode] {
                    mode = value;
                }
            }

            if histogram[mode] > half_block {
                Luma([mode as u8])
            } else {
                Luma([VOID_LABEL])
            }
        })
    }
}

impl Augmentor for SubsampleAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let image = pair.image.as_f32_mut()?;
        *image = resize_image(image, image.width() / self.factor, image.height() / self.factor);
        pair.target = self.subsample_target(&pair.target);
        Ok(())
    }
}

/// Shifts the pair by a random offset. The image is mirrored at the borders,
/// the label is marked void wherever the source fell outside.
pub struct TranslationAugmentor {
    offset: i64,
    rng: RngCell,
}

impl TranslationAugmentor {
    pub fn new(offset: u32, seed: Option<u64>) -> Self {
        TranslationAugmentor {
            offset: offset as i64,
            rng: RngCell::new(seed),
        }
    }
}

// Mirrors `k` into [0, len); the flag reports whether it was outside.
fn mirror(k: i64, len: u32) -> (u32, bool) {
    let len = len as i64;
    let mirrored = if k < 0 {
        -k
    } else if k >= len {
        2 * len - k - 1
    } else {
        return (k as u32, false);
    };
    (mirrored.clamp(0, len - 1) as u32, true)
}

pub(crate) fn translate(pair: &mut ImageTargetPair, dx: i64, dy: i64) -> Result<(), DataLoaderError> {
    pair.check_aligned("translation")?;
    let image = pair.image.as_f32()?;
    let (width, height) = image.dimensions();

    let mut new_image = Rgb32FImage::new(width, height);
    let mut new_target = GrayImage::new(width, height);
    for y in 0..height {
        let (sy, outside_y) = mirror(y as i64 + dy, height);
        for x in 0..width {
            let (sx, outside_x) = mirror(x as i64 + dx, width);
            new_image.put_pixel(x, y, *image.get_pixel(sx, sy));
            let label = if outside_x || outside_y {
                Luma([VOID_LABEL])
            } else {
                *pair.target.get_pixel(sx, sy)
            };
            new_target.put_pixel(x, y, label);
        }
    }

    pair.image = ImageData::F32(new_image);
    pair.target = new_target;
    Ok(())
}

impl Augmentor for TranslationAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let (dx, dy) = self.rng.draw(|rng| {
            (
                rng.gen_range(-self.offset..=self.offset),
                rng.gen_range(-self.offset..=self.offset),
            )
        })?;
        translate(pair, dx, dy)
    }
}

/// Rescales by a random factor around 1 while keeping the original size.
pub struct ZoomingAugmentor {
    range: f64,
    rng: RngCell,
}

impl ZoomingAugmentor {
    pub fn new(range: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        if !(0.0..1.0).contains(&range) {
            return Err(DataLoaderError::invalid_parameter(
                "zooming",
                format!("range must be in [0, 1), got {}", range),
            ));
        }
        Ok(ZoomingAugmentor {
            range,
            rng: RngCell::new(seed),
        })
    }
}

pub(crate) fn zoom(pair: &mut ImageTargetPair, scale: f64) -> Result<(), DataLoaderError> {
    pair.check_aligned("zooming")?;
    let image = pair.image.as_f32()?;
    let (width, height) = image.dimensions();
    let scaled_width = ((width as f64 * scale) as u32).max(1);
    let scaled_height = ((height as f64 * scale) as u32).max(1);

    let zoomed_image = resize_image(image, scaled_width, scaled_height);
    let zoomed_target = resize_label(&pair.target, scaled_width, scaled_height);

    let mut new_image = Rgb32FImage::new(width, height);
    let mut new_target = GrayImage::from_pixel(width, height, Luma([VOID_LABEL]));

    if scale > 1.0 {
        // Larger than the frame: keep the center
        let x_offset = (scaled_width - width) / 2;
        let y_offset = (scaled_height - height) / 2;
        for y in 0..height {
            for x in 0..width {
                new_image.put_pixel(x, y, *zoomed_image.get_pixel(x + x_offset, y + y_offset));
                new_target.put_pixel(x, y, *zoomed_target.get_pixel(x + x_offset, y + y_offset));
            }
        }
    } else {
        // Smaller than the frame: embed in the center
        let x_offset = width.saturating_sub(scaled_width) / 2;
        let y_offset = height.saturating_sub(scaled_height) / 2;
        for y in 0..scaled_height.min(height) {
            for x in 0..scaled_width.min(width) {
                new_image.put_pixel(x + x_offset, y + y_offset, *zoomed_image.get_pixel(x, y));
                new_target.put_pixel(x + x_offset, y + y_offset, *zoomed_target.get_pixel(x, y));
            }
        }
    }

    pair.image = ImageData::F32(new_image);
    pair.target = new_target;
    Ok(())
}

impl Augmentor for ZoomingAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let scale = self
            .rng
            .draw(|rng| rng.gen_range(1.0 - self.range..=1.0 + self.range))?;
        zoom(pair, scale)
    }
}

/// Rotates about the image center by a random angle in degrees.
pub struct RotationAugmentor {
    max_angle: f64,
    rng: RngCell,
}

impl RotationAugmentor {
    pub fn new(max_angle: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        if !max_angle.is_finite() || max_angle < 0.0 {
            return Err(DataLoaderError::invalid_parameter(
                "rotation",
                format!("max_angle must be non-negative, got {}", max_angle),
            ));
        }
        Ok(RotationAugmentor {
            max_angle,
            rng: RngCell::new(seed),
        })
    }
}

// Integer center so that a half turn maps pixels onto pixels
fn rotation_about_center(width: u32, height: u32, degrees: f64) -> Projection {
    let (cx, cy) = ((width / 2) as f32, (height / 2) as f32);
    Projection::translate(cx, cy)
        * Projection::rotate(degrees.to_radians() as f32)
        * Projection::translate(-cx, -cy)
}

pub(crate) fn rotate(pair: &mut ImageTargetPair, degrees: f64) -> Result<(), DataLoaderError> {
    pair.check_aligned("rotation")?;
    let degrees = degrees.rem_euclid(360.0);
    let image = pair.image.as_f32()?;
    let projection = rotation_about_center(image.width(), image.height(), degrees);

    let rotated = warp(image, &projection, Interpolation::Bilinear, Rgb([0.0; 3]));
    pair.target = warp(&pair.target, &projection, Interpolation::Nearest, Luma([VOID_LABEL]));
    pair.image = ImageData::F32(rotated);
    Ok(())
}

impl Augmentor for RotationAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let angle = self
            .rng
            .draw(|rng| rng.gen_range(-self.max_angle..=self.max_angle))?;
        rotate(pair, angle)
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::augment::test_util::gradient_pair;

    fn labels(pair: &ImageTargetPair) -> Vec<u8> {
        pair.target.as_raw().clone()
    }

    #[test]
    fn subsample_keeps_clear_majorities() {
        // Each 2x2 block: [0,0,0,1] -> 0 and [0,0,1,1] -> void
        let rows: [[u8; 4]; 2] = [[0, 0, 0, 1], [0, 1, 0, 1]];
        let target = GrayImage::from_fn(4, 2, |x, y| Luma([rows[y as usize][x as usize]]));
        let mut pair = ImageTargetPair::new(ImageData::F32(Rgb32FImage::new(4, 2)), target);

        SubsampleAugmentor::new(2).unwrap().augment(&mut pair).unwrap();
        assert_eq!(pair.target.dimensions(), (2, 1));
        assert_eq!(pair.image.dimensions(), (2, 1));
        assert_eq!(labels(&pair), vec![0, VOID_LABEL]);
    }

    #[test]
    fn subsample_by_four_uses_block_area() {
        let mut pair = gradient_pair(4, 4, |x, y| if x == 3 && y < 3 { 1 } else { 0 });
        SubsampleAugmentor::new(4).unwrap().augment(&mut pair).unwrap();
        assert_eq!(labels(&pair), vec![0]);

        let mut pair = gradient_pair(4, 4, |x, _| if x < 2 { 0 } else { 1 });
        SubsampleAugmentor::new(4).unwrap().augment(&mut pair).unwrap();
        assert_eq!(labels(&pair), vec![VOID_LABEL]);
    }

    #[test]
    fn subsample_rejects_zero_factor() {
        assert!(SubsampleAugmentor::new(0).is_err());
    }

    #[test]
    fn translation_voids_labels_but_mirrors_pixels() {
        let mut pair = gradient_pair(4, 3, |x, y| (x + 4 * y) as u8);
        let original = pair.image.as_f32().unwrap().clone();

        translate(&mut pair, 2, 0).unwrap();

        // Columns 0 and 1 read from columns 2 and 3
        assert_eq!(pair.target.get_pixel(0, 1)[0], 6);
        assert_eq!(pair.target.get_pixel(1, 1)[0], 7);
        // Columns 2 and 3 fell outside and mirror back to columns 3 and 2
        for y in 0..3 {
            assert_eq!(pair.target.get_pixel(2, y)[0], VOID_LABEL);
            assert_eq!(pair.target.get_pixel(3, y)[0], VOID_LABEL);
        }
        let image = pair.image.as_f32().unwrap();
        assert_eq!(image.get_pixel(2, 1), original.get_pixel(3, 1));
        assert_eq!(image.get_pixel(3, 1), original.get_pixel(2, 1));
    }

    #[test]
    fn negative_translation_mirrors_from_the_top() {
        let mut pair = gradient_pair(3, 3, |x, y| (x + 3 * y) as u8);
        let original = pair.image.as_f32().unwrap().clone();
        translate(&mut pair, 0, -1).unwrap();

        assert_eq!(pair.target.get_pixel(1, 0)[0], VOID_LABEL);
        assert_eq!(pair.target.get_pixel(1, 1)[0], 1);
        assert_eq!(pair.image.as_f32().unwrap().get_pixel(1, 0), original.get_pixel(1, 1));
    }

    #[test]
    fn translation_requires_alignment() {
        let mut pair = ImageTargetPair::new(ImageData::F32(Rgb32FImage::new(4, 4)), GrayImage::new(2, 2));
        let augmentor = TranslationAugmentor::new(1, Some(0));
        assert!(matches!(
            augmentor.augment(&mut pair),
            Err(DataLoaderError::Alignment { .. })
        ));
    }

    #[test]
    fn zero_offset_translation_is_identity() {
        let mut pair = gradient_pair(5, 4, |x, y| (x * y) as u8);
        let before = labels(&pair);
        TranslationAugmentor::new(0, None).augment(&mut pair).unwrap();
        assert_eq!(labels(&pair), before);
    }

    #[test]
    fn zoom_in_crops_the_center() {
        let mut pair = gradient_pair(8, 8, |x, y| if (2..6).contains(&x) && (2..6).contains(&y) { 1 } else { 0 });
        zoom(&mut pair, 2.0).unwrap();
        assert_eq!(pair.target.dimensions(), (8, 8));
        assert!(pair.target.pixels().all(|p| p[0] == 1));
    }

    #[test]
    fn zoom_out_pads_with_void() {
        let mut pair = gradient_pair(8, 8, |_, _| 2);
        zoom(&mut pair, 0.5).unwrap();
        assert_eq!(pair.target.get_pixel(0, 0)[0], VOID_LABEL);
        assert_eq!(pair.target.get_pixel(7, 7)[0], VOID_LABEL);
        assert_eq!(pair.target.get_pixel(3, 3)[0], 2);
        assert_eq!(pair.image.as_f32().unwrap().get_pixel(0, 0), &Rgb([0.0, 0.0, 0.0]));
    }

    #[test]
    fn zoom_range_is_validated() {
        assert!(ZoomingAugmentor::new(1.0, None).is_err());
        assert!(ZoomingAugmentor::new(-0.1, None).is_err());
        assert!(ZoomingAugmentor::new(0.2, None).is_ok());
    }

    #[test]
    fn rotation_keeps_image_and_label_aligned() {
        // The image's red channel mirrors the label value
        let target = GrayImage::from_fn(7, 7, |x, y| Luma([(x + 7 * y) as u8]));
        let image = Rgb32FImage::from_fn(7, 7, |x, y| Rgb([(x + 7 * y) as f32 / 100.0, 0.0, 0.0]));
        let mut pair = ImageTargetPair::new(ImageData::F32(image), target);

        rotate(&mut pair, 90.0).unwrap();
        let image = pair.image.as_f32().unwrap();
        // Bilinear sampling needs both neighbours, so the border is left out
        for y in 1..6 {
            for x in 1..6 {
                let label = pair.target.get_pixel(x, y)[0];
                assert_ne!(label, VOID_LABEL);
                let expected = label as f32 / 100.0;
                assert!((image.get_pixel(x, y)[0] - expected).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn zero_rotation_keeps_labels() {
        let target = GrayImage::from_fn(5, 4, |x, y| Luma([(x + 5 * y) as u8]));
        let image = Rgb32FImage::new(5, 4);
        let mut pair = ImageTargetPair::new(ImageData::F32(image), target.clone());

        rotate(&mut pair, 360.0).unwrap();
        assert_eq!(pair.target, target);
    }

    #[test]
    fn half_turn_flips_about_center() {
        // Columns left of the center are class 0, right of it class 1
        let target = GrayImage::from_fn(9, 9, |x, _| Luma([if x < 4 { 0 } else if x > 4 { 1 } else { 2 }]));
        let mut pair = ImageTargetPair::new(ImageData::F32(Rgb32FImage::new(9, 9)), target);

        rotate(&mut pair, 180.0).unwrap();
        assert_eq!(pair.target.get_pixel(1, 4)[0], 1);
        assert_eq!(pair.target.get_pixel(7, 4)[0], 0);
        assert_eq!(pair.target.get_pixel(4, 4)[0], 2);
    }

    #[test]
    fn rotation_fills_corners_with_void() {
        let mut pair = gradient_pair(9, 9, |_, _| 1);
        rotate(&mut pair, -45.0).unwrap();
        assert_eq!(pair.target.get_pixel(0, 0)[0], VOID_LABEL);
        assert_eq!(pair.target.get_pixel(4, 4)[0], 1);
        assert_eq!(pair.image.as_f32().unwrap().get_pixel(0, 0), &Rgb([0.0, 0.0, 0.0]));
    }
}
