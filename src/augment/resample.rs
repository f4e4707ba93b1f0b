use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, Rgb32FImage};

pub(crate) fn resize_image(image: &Rgb32FImage, width: u32, height: u32) -> Rgb32FImage {
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// Nearest neighbour keeps class ids intact.
pub(crate) fn resize_label(target: &GrayImage, width: u32, height: u32) -> GrayImage {
    imageops::resize(target, width, height, FilterType::Nearest)
}

/// Reflects an out-of-range index without repeating the edge (`dcb|abcd|cba`).
pub(crate) fn reflect_101(index: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut k = index.rem_euclid(period);
    if k >= len {
        k = period - k;
    }
    k as u32
}

/// Normalized Gaussian taps, `3 * ceil(sigma)` wide and rounded up to odd.
pub(crate) fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let mut size = 3 * sigma.ceil() as usize;
    if size % 2 == 0 {
        size += 1;
    }
    let radius = (size / 2) as f64;

    let weights: Vec<f64> = (0..size)
        .map(|k| {
            let d = k as f64 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Separable convolution with reflect-101 borders.
pub(crate) fn gaussian_blur(image: &Rgb32FImage, sigma: f64) -> Rgb32FImage {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let (width, height) = image.dimensions();

    let horizontal = Rgb32FImage::from_fn(width, height, |x, y| {
        let mut out = [0.0f32; 3];
        for (k, weight) in kernel.iter().enumerate() {
            let sx = reflect_101(x as i64 + k as i64 - radius, width);
            let pixel = image.get_pixel(sx, y);
            for c in 0..3 {
                out[c] += weight * pixel[c];
            }
        }
        Rgb(out)
    });

    Rgb32FImage::from_fn(width, height, |x, y| {
        let mut out = [0.0f32; 3];
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect_101(y as i64 + k as i64 - radius, height);
            let pixel = horizontal.get_pixel(x, sy);
            for c in 0..3 {
                out[c] += weight * pixel[c];
            }
        }
        Rgb(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_width_is_odd_and_normalized() {
        assert_eq!(gaussian_kernel(0.4).len(), 3);
        assert_eq!(gaussian_kernel(1.0).len(), 3);
        assert_eq!(gaussian_kernel(1.5).len(), 7);
        assert_eq!(gaussian_kernel(3.0).len(), 9);

        let kernel = gaussian_kernel(2.0);
        let total: f32 = kernel.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(kernel[kernel.len() / 2] > kernel[0]);
    }

    #[test]
    fn reflect_101_mirrors_without_edge() {
        assert_eq!(reflect_101(-1, 4), 1);
        assert_eq!(reflect_101(-2, 4), 2);
        assert_eq!(reflect_101(4, 4), 2);
        assert_eq!(reflect_101(5, 4), 1);
        assert_eq!(reflect_101(2, 4), 2);
        assert_eq!(reflect_101(-3, 1), 0);
    }

    #[test]
    fn blur_preserves_constant_images() {
        let image = Rgb32FImage::from_pixel(6, 6, Rgb([0.3, 0.6, 0.9]));
        let blurred = gaussian_blur(&image, 1.7);
        for pixel in blurred.pixels() {
            assert!((pixel[0] - 0.3).abs() < 1e-5);
            assert!((pixel[2] - 0.9).abs() < 1e-5);
        }
    }
}
