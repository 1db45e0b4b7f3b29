//! Masked compositing of the warped display onto a template
//!
//! The display is brightness-adjusted, resampled into base-image space and
//! then blended onto the base. Per-pixel opacity is the product of the
//! template mask and the warped display's own alpha, so the base stays
//! visible outside the warped region even under a fully opaque mask.

use image::{GrayImage, RgbaImage};
use tracing::debug;

use crate::color::{apply_brightness, BrightnessLut};
use crate::error::{EdvError, EdvResult};
use crate::template::Template;
use crate::transform::{warp_into, TransformCoefficients};

/// Full opacity in mask * alpha units (255 * 255)
const FULL: u32 = 255 * 255;

/// Place `display` onto `template` through the inverse map `coeffs`
///
/// The returned image always has the template's base dimensions.
pub fn composite(
    display: &RgbaImage,
    template: &Template,
    coeffs: &TransformCoefficients,
    brightness: Option<f64>,
) -> EdvResult<RgbaImage> {
    let (width, height) = template.dimensions();

    let adjusted;
    let display = match brightness {
        Some(factor) => {
            let lut = BrightnessLut::new(factor)?;
            if lut.is_identity() {
                display
            } else {
                debug!("Adjusting display brightness by {}", factor);
                let mut buf = display.clone();
                apply_brightness(&mut buf, &lut);
                adjusted = buf;
                &adjusted
            }
        }
        None => display,
    };

    let mut warped = RgbaImage::new(width, height);
    warp_into(display, coeffs, &mut warped);

    let mut out = template.base().clone();
    paste_masked(&mut out, &warped, template.mask())?;
    Ok(out)
}

/// Blend `src` over `dst` at offset (0, 0) using `mask` as opacity
///
/// A missing mask counts as 255 everywhere. Every channel, alpha included,
/// is interpolated linearly between the base and the source pixel.
pub fn paste_masked(dst: &mut RgbaImage, src: &RgbaImage, mask: Option<&GrayImage>) -> EdvResult<()> {
    if src.dimensions() != dst.dimensions() {
        return Err(EdvError::configuration(format!(
            "cannot paste a {}x{} image onto {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    if let Some(mask) = mask {
        if mask.dimensions() != dst.dimensions() {
            return Err(EdvError::configuration(format!(
                "mask is {}x{} but base image is {}x{}",
                mask.width(),
                mask.height(),
                dst.width(),
                dst.height()
            )));
        }
    }

    let mut covered = 0usize;
    for (x, y, d) in dst.enumerate_pixels_mut() {
        let s = src.get_pixel(x, y);
        let m = mask.map_or(255, |m| m.get_pixel(x, y).0[0]);
        let weight = u32::from(m) * u32::from(s.0[3]);
        if weight == 0 {
            continue;
        }
        covered += 1;

        for (dc, sc) in d.0.iter_mut().zip(s.0) {
            *dc = blend(*dc, sc, weight);
        }
    }

    debug!(
        "Composited {} of {} pixels",
        covered,
        dst.width() as usize * dst.height() as usize
    );
    Ok(())
}

/// Linear blend with `weight` in 0..=FULL, exact at both ends
#[inline]
fn blend(base: u8, over: u8, weight: u32) -> u8 {
    let v = u32::from(over) * weight + u32::from(base) * (FULL - weight);
    ((v + FULL / 2) / FULL) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Point, Quad};
    use crate::transform::solve;
    use image::{Luma, Rgba};

    fn base_200() -> RgbaImage {
        RgbaImage::from_fn(200, 200, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255]))
    }

    fn display_100() -> RgbaImage {
        RgbaImage::from_fn(100, 100, |x, y| Rgba([(x * 2) as u8, (y * 2) as u8, 250, 255]))
    }

    fn offset_target() -> Quad {
        Quad::new([
            Point::new(10.0, 10.0),
            Point::new(110.0, 10.0),
            Point::new(110.0, 110.0),
            Point::new(10.0, 110.0),
        ])
    }

    fn channel_close(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
        a.0.iter().zip(b.0).all(|(x, y)| (*x as i32 - y as i32).abs() <= 1)
    }

    #[test]
    fn test_blend_endpoints() {
        assert_eq!(blend(17, 200, 0), 17);
        assert_eq!(blend(17, 200, FULL), 200);
        // mask 128 over an opaque source rounds up, FULL / 2 rounds down
        assert_eq!(blend(0, 255, 128 * 255), 128);
        assert_eq!(blend(0, 255, FULL / 2), 127);
    }

    #[test]
    fn test_unscaled_paste_at_offset() {
        let display = display_100();
        let base = base_200();
        let template = Template::new(base.clone(), None, offset_target()).unwrap();
        let coeffs = solve(&Quad::from_size(100, 100), template.target()).unwrap();

        let out = composite(&display, &template, &coeffs, None).unwrap();
        assert_eq!(out.dimensions(), (200, 200));

        for (x, y, p) in out.enumerate_pixels() {
            let inside = (10..110).contains(&x) && (10..110).contains(&y);
            if inside {
                let expected = display.get_pixel(x - 10, y - 10);
                assert!(
                    channel_close(p, expected),
                    "pixel ({}, {}) = {:?}, expected {:?}",
                    x,
                    y,
                    p,
                    expected
                );
            } else {
                assert_eq!(p, base.get_pixel(x, y), "pixel ({}, {}) changed", x, y);
            }
        }
    }

    #[test]
    fn test_opaque_mask_keeps_base_outside_warp() {
        let base = base_200();
        let mask = GrayImage::from_pixel(200, 200, Luma([255]));
        let template = Template::new(base.clone(), Some(mask), offset_target()).unwrap();
        let coeffs = solve(&Quad::from_size(100, 100), template.target()).unwrap();

        let out = composite(&display_100(), &template, &coeffs, None).unwrap();
        for (x, y) in [(0, 0), (5, 150), (199, 199), (150, 50), (9, 9), (110, 110)] {
            assert_eq!(out.get_pixel(x, y), base.get_pixel(x, y));
        }
    }

    #[test]
    fn test_no_mask_equals_full_mask() {
        let base = base_200();
        let target = Quad::new([
            Point::new(30.0, 20.0),
            Point::new(170.0, 40.0),
            Point::new(160.0, 180.0),
            Point::new(25.0, 150.0),
        ]);
        let coeffs = solve(&Quad::from_size(100, 100), &target).unwrap();

        let unmasked = Template::new(base.clone(), None, target).unwrap();
        let full = GrayImage::from_pixel(200, 200, Luma([255]));
        let masked = Template::new(base, Some(full), target).unwrap();

        let a = composite(&display_100(), &unmasked, &coeffs, Some(0.8)).unwrap();
        let b = composite(&display_100(), &masked, &coeffs, Some(0.8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_mask_shows_base_only() {
        let base = base_200();
        let mask = GrayImage::new(200, 200);
        let template = Template::new(base.clone(), Some(mask), offset_target()).unwrap();
        let coeffs = solve(&Quad::from_size(100, 100), template.target()).unwrap();

        let out = composite(&display_100(), &template, &coeffs, None).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_half_mask_blends() {
        let mut dst = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(1, 0, Luma([128]));

        paste_masked(&mut dst, &src, Some(&mask)).unwrap();
        assert_eq!(*dst.get_pixel(0, 0), Rgba([200, 100, 50, 255]));
        assert_eq!(*dst.get_pixel(1, 0), Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn test_zero_brightness_blacks_out_display() {
        let base = base_200();
        let template = Template::new(base, None, offset_target()).unwrap();
        let coeffs = solve(&Quad::from_size(100, 100), template.target()).unwrap();

        let out = composite(&display_100(), &template, &coeffs, Some(0.0)).unwrap();
        assert_eq!(*out.get_pixel(60, 60), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_negative_brightness_rejected() {
        let template = Template::new(base_200(), None, offset_target()).unwrap();
        let coeffs = solve(&Quad::from_size(100, 100), template.target()).unwrap();
        let err = composite(&display_100(), &template, &coeffs, Some(-1.0)).unwrap_err();
        assert!(matches!(err, EdvError::Configuration(_)));
    }

    #[test]
    fn test_paste_size_mismatch() {
        let mut dst = RgbaImage::new(4, 4);
        let src = RgbaImage::new(4, 4);
        let mask = GrayImage::new(3, 4);
        assert!(matches!(
            paste_masked(&mut dst, &src, Some(&mask)),
            Err(EdvError::Configuration(_))
        ));
    }
}
