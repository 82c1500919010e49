// src/engine/alpha.rs
//
// Alpha-channel policy transforms applied between decode and encode.
//
// Positioned here rather than in the encoders so that the policy is
// explicit at the call site: encoding a transparent raster to JPEG
// without one of these produces black (or worse) where the
// transparency was.

use crate::error::Result;
use crate::ops::AlphaPolicy;
use image::{DynamicImage, Rgb, RgbImage};

/// Apply an alpha policy to a decoded raster.
///
/// Rasters without an alpha channel pass through untouched under every
/// policy. Both transforms are pure: each visits every pixel exactly
/// once and the result depends only on the input raster and the policy.
pub fn apply_alpha_policy(img: DynamicImage, policy: AlphaPolicy) -> Result<DynamicImage> {
    if !img.color().has_alpha() {
        return Ok(img);
    }
    match policy {
        AlphaPolicy::Keep => Ok(img),
        AlphaPolicy::FillWithColor(color) => Ok(fill_transparent_pixels(img, color)),
        AlphaPolicy::FlattenToOpaqueRgb => Ok(flatten_to_opaque_rgb(&img)),
    }
}

/// Replace every not-fully-opaque pixel with `color` at full opacity.
/// Already-opaque pixels are unchanged. The raster keeps its alpha
/// channel; it is simply opaque everywhere afterwards.
fn fill_transparent_pixels(img: DynamicImage, color: Rgb<u8>) -> DynamicImage {
    let mut rgba = img.into_rgba8();
    let Rgb([r, g, b]) = color;
    for pixel in rgba.pixels_mut() {
        if pixel.0[3] < u8::MAX {
            pixel.0 = [r, g, b, u8::MAX];
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Composite the raster onto a fresh opaque RGB canvas and drop the
/// alpha channel. Source-over blending against black, matching what
/// drawing onto a newly allocated opaque canvas does: fully
/// transparent pixels come out black, partially transparent ones are
/// scaled by their coverage.
fn flatten_to_opaque_rgb(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let a = a as u16;
        dst.0 = [
            (r as u16 * a / 255) as u8,
            (g as u16 * a / 255) as u8,
            (b as u16 * a / 255) as u8,
        ];
    }
    DynamicImage::ImageRgb8(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::AlphaPolicy;
    use image::{Rgba, RgbaImage};

    fn checker_with_alpha() -> DynamicImage {
        // Left half opaque orange, column 2 half-transparent blue,
        // column 3 fully transparent.
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x == 3 {
                Rgba([10, 20, 30, 0])
            } else if x < 2 {
                Rgba([200, 100, 0, 255])
            } else {
                Rgba([0, 0, 200, 128])
            }
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_opaque_raster_passes_through() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let out = apply_alpha_policy(img.clone(), AlphaPolicy::FlattenToOpaqueRgb).unwrap();
        assert_eq!(out.as_bytes(), img.as_bytes());
    }

    #[test]
    fn test_keep_policy_preserves_alpha() {
        let img = checker_with_alpha();
        let out = apply_alpha_policy(img, AlphaPolicy::Keep).unwrap();
        assert!(out.color().has_alpha());
    }

    #[test]
    fn test_fill_replaces_only_transparent_pixels() {
        let img = checker_with_alpha();
        let out =
            apply_alpha_policy(img, AlphaPolicy::FillWithColor(Rgb([255, 255, 255]))).unwrap();
        let rgba = out.to_rgba8();
        // Opaque pixels untouched
        assert_eq!(rgba.get_pixel(0, 0).0, [200, 100, 0, 255]);
        assert_eq!(rgba.get_pixel(1, 1).0, [200, 100, 0, 255]);
        // Partially transparent and fully transparent both filled
        assert_eq!(rgba.get_pixel(2, 0).0, [255, 255, 255, 255]);
        assert_eq!(rgba.get_pixel(3, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_fill_result_is_fully_opaque_but_keeps_channel() {
        let img = checker_with_alpha();
        let out = apply_alpha_policy(img, AlphaPolicy::fill_white()).unwrap();
        assert!(out.color().has_alpha());
        assert!(out.to_rgba8().pixels().all(|p| p.0[3] == u8::MAX));
    }

    #[test]
    fn test_flatten_drops_alpha_capability() {
        let img = checker_with_alpha();
        let (w, h) = (img.width(), img.height());
        let out = apply_alpha_policy(img, AlphaPolicy::FlattenToOpaqueRgb).unwrap();
        assert!(!out.color().has_alpha());
        assert_eq!((out.width(), out.height()), (w, h));
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_flatten_blends_against_black() {
        let img = checker_with_alpha();
        let out = apply_alpha_policy(img, AlphaPolicy::FlattenToOpaqueRgb).unwrap();
        let rgb = out.to_rgb8();
        // Opaque pixels keep their color
        assert_eq!(rgb.get_pixel(0, 0).0, [200, 100, 0]);
        // Fully transparent pixel becomes black
        assert_eq!(rgb.get_pixel(3, 0).0, [0, 0, 0]);
        // Half-transparent blue is scaled by coverage
        let p = rgb.get_pixel(2, 0).0;
        assert_eq!(p[0], 0);
        assert_eq!(p[1], 0);
        assert!((99..=101).contains(&p[2]));
    }

    #[test]
    fn test_luma_alpha_input_is_handled() {
        let img = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(
            2,
            2,
            image::LumaA([100, 0]),
        ));
        let out = apply_alpha_policy(img, AlphaPolicy::fill_white()).unwrap();
        assert!(out.to_rgba8().pixels().all(|p| p.0[3] == u8::MAX));
    }
}
