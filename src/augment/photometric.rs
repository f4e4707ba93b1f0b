use std::f64::consts::FRAC_1_SQRT_2;

use rand::Rng;

use crate::dataloader::datasource::ImageTargetPair;
use crate::dataloader::error::DataLoaderError;

use super::color::{hsv_to_rgb, rgb_to_hsv, wrap_hue};
use super::resample::gaussian_blur;
use super::{Augmentor, RngCell};

fn check_range(augmentor: &'static str, min: f64, max: f64) -> Result<(), DataLoaderError> {
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(DataLoaderError::invalid_parameter(
            augmentor,
            format!("expected a finite range with min <= max, got [{}, {}]", min, max),
        ));
    }
    Ok(())
}

/// Random gamma correction bounded to a safe exponent range.
pub struct GammaAugmentor {
    limit: f64,
    rng: RngCell,
}

impl GammaAugmentor {
    pub fn new(strength: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        if !strength.is_finite() || strength < 0.0 {
            return Err(DataLoaderError::invalid_parameter(
                "gamma",
                format!("strength must be non-negative, got {}", strength),
            ));
        }
        Ok(GammaAugmentor {
            // Keeps both log arguments positive and the exponent bounded
            limit: strength.min(0.5),
            rng: RngCell::new(seed),
        })
    }

    /// Maps a draw in (-0.5, 0.5) to a gamma exponent.
    pub fn exponent(g: f64) -> f64 {
        (0.5 + FRAC_1_SQRT_2 * g).ln() / (0.5 - FRAC_1_SQRT_2 * g).ln()
    }
}

impl Augmentor for GammaAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let g = self.rng.draw(|rng| rng.gen_range(-self.limit..=self.limit))?;
        let gamma = Self::exponent(g) as f32;

        for value in pair.image.as_f32_mut()?.iter_mut() {
            *value = value.powf(gamma);
        }
        Ok(())
    }
}

/// Scales HSV saturation by a random factor.
pub struct SaturationAugmentor {
    min: f64,
    max: f64,
    rng: RngCell,
}

impl SaturationAugmentor {
    pub fn new(min: f64, max: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        check_range("saturation", min, max)?;
        Ok(SaturationAugmentor {
            min,
            max,
            rng: RngCell::new(seed),
        })
    }
}

impl Augmentor for SaturationAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let factor = self.rng.draw(|rng| rng.gen_range(self.min..=self.max))? as f32;

        for pixel in pair.image.as_f32_mut()?.pixels_mut() {
            let [h, s, v] = rgb_to_hsv(pixel.0);
            pixel.0 = hsv_to_rgb([h, (s * factor).clamp(0.0, 1.0), v]);
        }
        Ok(())
    }
}

/// Rotates HSV hue by a random offset in degrees.
pub struct HueAugmentor {
    min: f64,
    max: f64,
    rng: RngCell,
}

impl HueAugmentor {
    pub fn new(min: f64, max: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        check_range("hue", min, max)?;
        Ok(HueAugmentor {
            min,
            max,
            rng: RngCell::new(seed),
        })
    }
}

impl Augmentor for HueAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let offset = self.rng.draw(|rng| rng.gen_range(self.min..=self.max))? as f32;

        for pixel in pair.image.as_f32_mut()?.pixels_mut() {
            let [h, s, v] = rgb_to_hsv(pixel.0);
            pixel.0 = hsv_to_rgb([wrap_hue(h + offset), s, v]);
        }
        Ok(())
    }
}

/// Shifts every channel by a random offset.
pub struct BrightnessAugmentor {
    min: f64,
    max: f64,
    rng: RngCell,
}

impl BrightnessAugmentor {
    pub fn new(min: f64, max: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        check_range("brightness", min, max)?;
        Ok(BrightnessAugmentor {
            min,
            max,
            rng: RngCell::new(seed),
        })
    }
}

impl Augmentor for BrightnessAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        let offset = self.rng.draw(|rng| rng.gen_range(self.min..=self.max))? as f32;

        for value in pair.image.as_f32_mut()?.iter_mut() {
            *value = (*value + offset).clamp(0.0, 1.0);
        }
        Ok(())
    }
}

/// Gaussian blur with a random sigma in [0, max_sigma].
pub struct BlurAugmentor {
    max_sigma: f64,
    rng: RngCell,
}

impl BlurAugmentor {
    /// A `max_sigma` of 0 disables the blur.
    pub fn new(max_sigma: f64, seed: Option<u64>) -> Result<Self, DataLoaderError> {
        if !max_sigma.is_finite() || max_sigma < 0.0 {
            return Err(DataLoaderError::invalid_parameter(
                "blur",
                format!("max_sigma must be finite and non-negative, got {}", max_sigma),
            ));
        }
        Ok(BlurAugmentor {
            max_sigma,
            rng: RngCell::new(seed),
        })
    }
}

impl Augmentor for BlurAugmentor {
    fn augment(&self, pair: &mut ImageTargetPair) -> Result<(), DataLoaderError> {
        if self.max_sigma <= 0.0 {
            return Ok(());
        }

        let sigma = self.rng.draw(|rng| rng.gen_range(0.0..=self.max_sigma))?;
        if sigma <= 0.0 {
            return Ok(());
        }

        let image = pair.image.as_f32_mut()?;
        *image = gaussian_blur(image, sigma);
        Ok(())
    }
}
