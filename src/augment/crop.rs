//! Entropy-weighted random crops.
//!
//! Every `size x size` window of the label map gets a score equal to the
//! Shannon entropy of its class histogram scaled by the window area. A window
//! position is drawn with probability proportional to that score, which favours
//! crops with several classes and boundaries over flat background.
//!
//! Histograms for all windows are computed with dynamic programming: the first
//! window directly, the rest of the first row and first column by sliding one
//! step, and every interior window from its up, left and up-left neighbours by
//! inclusion-exclusion plus four corner pixels. Only two rows of histograms are
//! alive at any time.

use image::{imageops, GrayImage};
use rand::Rng;

use crate::dataloader::datasource::{ImageData, ImageTargetPair, VOID_LABEL};
use crate::dataloader::error::DataLoaderError;

use super::{Augmentor, RngCell};

pub struct CropAugmentor {
    size: u32,
    num_classes: usize,
    rng: RngCell,
}

impl CropAugmentor {
    pub fn new(size: u32, num_classes: usize, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        if size == 0 {
            return Err(DataLoaderError::invalid_parameter("crop", "size must be positive"));
        }
        if num_classes == 0 || num_classes > VOID_LABEL as usize {
            return Err(DataLoaderError::invalid_parameter(
                "crop",
                format!("num_classes must be in 1..={}, got {}", VOID_LABEL, num_classes),
            ));
        }
        Ok(CropAugmentor {
            size,
            num_classes,
            rng: RngCell::new(seed),
        })
    }

    /// Picks the top-left corner `(x, y)` of the crop.
    fn sample_position(&self, entropies: &WindowEntropies) -> Result<(u32, u32), DataLoaderError> {
        let total: f64 = entropies.scores.iter().sum();
        let count = entropies.scores.len();

        let index = if total > 0.0 {
            let u: f64 = self.rng.draw(|rng| rng.gen())?;
            let mut cumulative = 0.0;
            entropies
                .scores
                .iter()
                .position(|score| {
                    cumulative += score / total;
                    cumulative > u
                })
                .or_else(|| entropies.scores.iter().rposition(|&score| score > 0.0))
                .unwrap_or(count - 1)
        } else {
            // Flat label map, no window is more informative than another
            self.rng.draw(|rng| rng.gen_range(0..count))?
        };

        let row = index / entropies.cols;
        let col = index % entropies.cols;
        Ok((col as u32, row as u32))
    }
}

pub(crate) struct WindowEntropies {
    /// Row-major over window positions.
    pub(crate) scores: Vec<f64>,
    pub(crate) cols: usize,
}

// Class histograms for one row of window positions, `num_classes` bins each.
struct HistogramRow {
    counts: Vec<i32>,
    num_classes: usize,
}

impl HistogramRow {
    fn new(cols: usize, num_classes: usize) -> Self {
        HistogramRow {
            counts: vec![0; cols * num_classes],
            num_classes,
        }
    }

    fn window(&self, j: usize) -> &[i32] {
        &self.counts[j * self.num_classes..(j + 1) * self.num_classes]
    }

    fn window_mut(&mut self, j: usize) -> &mut [i32] {
        &mut self.counts[j * self.num_classes..(j + 1) * self.num_classes]
    }

    fn add(&mut self, j: usize, label: u8) {
        if label != VOID_LABEL {
            self.counts[j * self.num_classes + label as usize] += 1;
        }
    }

    fn remove(&mut self, j: usize, label: u8) {
        if label != VOID_LABEL {
            self.counts[j * self.num_classes + label as usize] -= 1;
        }
    }
}

fn entropy(histogram: &[i32], area: f64) -> f64 {
    let total: i32 = histogram.iter().sum();
    if total <= 0 {
        return 0.0;
    }

    let total = total as f64;
    let mut entropy = total * total.log2();
    for &count in histogram.iter().filter(|&&c| c > 0) {
        let count = count as f64;
        entropy -= count * count.log2();
    }
    entropy / area
}

pub(crate) fn window_entropies(
    target: &GrayImage,
    size: u32,
    num_classes: usize,
) -> Result<WindowEntropies, DataLoaderError> {
    let (width, height) = target.dimensions();
    if size > width || size > height {
        return Err(DataLoaderError::CropTooLarge { size, width, height });
    }
    if let Some(value) = target
        .pixels()
        .map(|p| p[0])
        .find(|&v| v != VOID_LABEL && v as usize >= num_classes)
    {
        return Err(DataLoaderError::LabelOutOfRange { value, num_classes });
    }

    let s = size as usize;
    let rows = (height - size + 1) as usize;
    let cols = (width - size + 1) as usize;
    let area = (s * s) as f64;
    let label = |i: usize, j: usize| target.get_pixel(j as u32, i as u32)[0];

    let mut previous = HistogramRow::new(cols, num_classes);
    let mut current = HistogramRow::new(cols, num_classes);
    let mut scores = Vec::with_capacity(rows * cols);

    for i in 0..rows {
        if i == 0 {
            for di in 0..s {
                for dj in 0..s {
                    current.add(0, label(di, dj));
                }
            }
        } else {
            // Slide down from the window above
            current.window_mut(0).copy_from_slice(previous.window(0));
            for dj in 0..s {
                current.remove(0, label(i - 1, dj));
                current.add(0, label(i + s - 1, dj));
            }
        }

        for j in 1..cols {
            if i == 0 {
                // Slide right from the window to the left
                let (left, here) = current.counts.split_at_mut(j * num_classes);
                here[..num_classes].copy_from_slice(&left[(j - 1) * num_classes..]);
                for di in 0..s {
                    current.remove(j, label(di, j - 1));
                    current.add(j, label(di, j + s - 1));
                }
            } else {
                for c in 0..num_classes {
                    let up = previous.window(j)[c];
                    let up_left = previous.window(j - 1)[c];
                    let left = current.window(j - 1)[c];
                    current.window_mut(j)[c] = up + left - up_left;
                }
                current.add(j, label(i - 1, j - 1));
                current.remove(j, label(i - 1, j + s - 1));
                current.remove(j, label(i + s - 1, j - 1));
                current.add(j, label(i + s - 1, j + s - 1));
            }
        }

        scores.extend((0..cols).map(|j| entropy(current.window(j), area)));
        std::mem::swap(&mut previous, &mut current);
    }

    Ok(WindowEntropies { scores, cols })
}

impl Augmentor for CropAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        pair.check_aligned("crop")?;
        let entropies = window_entropies(&pair.target, self.size, self.num_classes)?;
        let (x, y) = self.sample_position(&entropies)?;

        let image = match &pair.image {
            ImageData::U8(image) => {
                ImageData::U8(imageops::crop_imm(image, x, y, self.size, self.size).to_image())
            }
            ImageData::F32(image) => {
                ImageData::F32(imageops::crop_imm(image, x, y, self.size, self.size).to_image())
            }
        };
        let target = imageops::crop_imm(&pair.target, x, y, self.size, self.size).to_image();

        pair.image = image;
        pair.target = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::{Luma, Rgb32FImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::augment::test_util::gradient_pair;

    fn brute_force_entropies(target: &GrayImage, size: u32, num_classes: usize) -> Vec<f64> {
        let (width, height) = target.dimensions();
        let mut scores = Vec::new();
        for i in 0..=(height - size) {
            for j in 0..=(width - size) {
                let mut histogram = vec![0i32; num_classes];
                for y in i..i + size {
                    for x in j..j + size {
                        let v = target.get_pixel(x, y)[0];
                        if v != VOID_LABEL {
                            histogram[v as usize] += 1;
                        }
                    }
                }
                scores.push(entropy(&histogram, (size * size) as f64));
            }
        }
        scores
    }

    #[test]
    fn dynamic_histograms_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(17);
        let target = GrayImage::from_fn(23, 17, |_, _| {
            if rng.gen_bool(0.1) {
                Luma([VOID_LABEL])
            } else {
                Luma([rng.gen_range(0..4)])
            }
        });

        for size in [1, 3, 5, 17] {
            let fast = window_entropies(&target, size, 4).unwrap();
            let slow = brute_force_entropies(&target, size, 4);
            assert_eq!(fast.cols, (23 - size + 1) as usize);
            assert_eq!(fast.scores.len(), slow.len());
            for (a, b) in fast.scores.iter().zip(&slow) {
                assert!((a - b).abs() < 1e-9, "size {}: {} != {}", size, a, b);
            }
        }
    }

    #[test]
    fn entropy_is_scaled_by_window_area() {
        // Two classes evenly split: one bit per labelled pixel
        assert!((entropy(&[2, 2], 4.0) - 1.0).abs() < 1e-12);
        assert_eq!(entropy(&[4, 0], 4.0), 0.0);
        assert_eq!(entropy(&[0, 0], 4.0), 0.0);
        // Void pixels lower the score even if the rest is split evenly
        assert!((entropy(&[1, 1], 4.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn crops_land_on_the_informative_patch() {
        // Flat background with a small checkerboard of classes 1 and 2
        let label = |x: u32, y: u32| {
            if (30..34).contains(&x) && (30..34).contains(&y) {
                1 + ((x + y) % 2) as u8
            } else {
                0
            }
        };
        let augmentor = CropAugmentor::new(16, 3, Some(99)).unwrap();

        for _ in 0..200 {
            let mut pair = gradient_pair(64, 64, label);
            augmentor.augment(&mut pair).unwrap();
            assert_eq!(pair.target.dimensions(), (16, 16));
            assert_eq!(pair.image.dimensions(), (16, 16));
            assert!(pair.target.pixels().any(|p| p[0] != 0), "crop missed the patch");
        }
    }

    #[test]
    fn crop_keeps_image_and_label_aligned() {
        let augmentor = CropAugmentor::new(4, 10, Some(1)).unwrap();
        let mut pair = gradient_pair(10, 10, |x, _| (x % 10) as u8);
        augmentor.augment(&mut pair).unwrap();

        let image = pair.image.as_f32().unwrap();
        for (x, y, label) in pair.target.enumerate_pixels() {
            // gradient_pair stores the source column in the red channel
            let column = (image.get_pixel(x, y)[0] * 10.0).round() as u8;
            assert_eq!(column, label[0]);
        }
    }

    #[test]
    fn flat_labels_fall_back_to_uniform_positions() {
        let augmentor = CropAugmentor::new(3, 2, Some(4)).unwrap();
        let mut pair = gradient_pair(8, 8, |_, _| 1);
        augmentor.augment(&mut pair).unwrap();
        assert_eq!(pair.target.dimensions(), (3, 3));
    }

    #[test]
    fn oversized_and_out_of_range_inputs_fail() {
        let augmentor = CropAugmentor::new(8, 2, None).unwrap();
        let mut pair = gradient_pair(4, 4, |_, _| 0);
        assert!(matches!(
            augmentor.augment(&mut pair),
            Err(DataLoaderError::CropTooLarge { size: 8, .. })
        ));

        let augmentor = CropAugmentor::new(2, 2, None).unwrap();
        let mut pair = gradient_pair(4, 4, |x, _| x as u8);
        assert!(matches!(
            augmentor.augment(&mut pair),
            Err(DataLoaderError::LabelOutOfRange { value: 2, num_classes: 2 })
        ));

        let mut pair = ImageTargetPair::new(ImageData::F32(Rgb32FImage::new(5, 5)), GrayImage::new(4, 4));
        assert!(matches!(
            augmentor.augment(&mut pair),
            Err(DataLoaderError::Alignment { .. })
        ));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(CropAugmentor::new(0, 3, None).is_err());
        assert!(CropAugmentor::new(4, 0, None).is_err());
        assert!(CropAugmentor::new(4, 256, None).is_err());
    }
}
