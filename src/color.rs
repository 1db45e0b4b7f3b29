//! Brightness adjustment for display images
//!
//! Brightness is a plain multiplier on the colour channels: 0 yields black,
//! 1 leaves the image untouched and values above 1 brighten. Results
//! saturate to the 0-255 range instead of wrapping. Alpha is never touched.

use image::RgbaImage;

use crate::error::{EdvError, EdvResult};

/// Pre-computed brightness lookup table (256 entries)
#[derive(Debug, Clone)]
pub struct BrightnessLut {
    lut: [u8; 256],
    /// Whether the LUT is identity (no-op)
    is_identity: bool,
}

impl BrightnessLut {
    /// Build the LUT for a brightness factor
    pub fn new(factor: f64) -> EdvResult<Self> {
        let factor = validate_brightness(factor)?;

        let mut lut = [0u8; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = (i as f64 * factor).round().clamp(0.0, 255.0) as u8;
        }
        let is_identity = lut.iter().enumerate().all(|(i, v)| *v as usize == i);

        Ok(Self { lut, is_identity })
    }

    #[inline]
    pub fn apply(&self, value: u8) -> u8 {
        self.lut[value as usize]
    }

    pub fn is_identity(&self) -> bool {
        self.is_identity
    }
}

/// Brightness factors must be finite and non-negative
pub fn validate_brightness(factor: f64) -> EdvResult<f64> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(EdvError::configuration(format!(
            "brightness must be a finite, non-negative factor, got {}",
            factor
        )));
    }
    Ok(factor)
}

/// Scale the colour channels of an RGBA buffer in place
pub fn apply_brightness(image: &mut RgbaImage, lut: &BrightnessLut) {
    if lut.is_identity() {
        return;
    }

    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = lut.apply(*channel);
        }
    }
}

/// Return a brightness-adjusted copy of `image`
pub fn adjust_brightness(image: &RgbaImage, factor: f64) -> EdvResult<RgbaImage> {
    let lut = BrightnessLut::new(factor)?;
    let mut out = image.clone();
    apply_brightness(&mut out, &lut);
    Ok(out)
}
