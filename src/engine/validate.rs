// src/engine/validate.rs
//
// Read-only raster validation: shape checks and color-model inspection.
// Nothing here mutates a raster.

use crate::error::{ConvertError, Result};
use image::{ColorType, DynamicImage};

/// Pixel layout of a decoded raster, derived from the image crate's
/// color type. `has_alpha()` is the capability flag conversions assert
/// on after an alpha policy ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorLayout {
    Luma8,
    LumaA8,
    Rgb8,
    Rgba8,
    Luma16,
    LumaA16,
    Rgb16,
    Rgba16,
    Rgb32F,
    Rgba32F,
}

impl ColorLayout {
    pub fn of(img: &DynamicImage) -> Self {
        match img.color() {
            ColorType::L8 => Self::Luma8,
            ColorType::La8 => Self::LumaA8,
            ColorType::Rgb8 => Self::Rgb8,
            ColorType::Rgba8 => Self::Rgba8,
            ColorType::L16 => Self::Luma16,
            ColorType::La16 => Self::LumaA16,
            ColorType::Rgb16 => Self::Rgb16,
            ColorType::Rgba16 => Self::Rgba16,
            ColorType::Rgb32F => Self::Rgb32F,
            // ColorType is non_exhaustive; treat anything new as RGBA
            _ => Self::Rgba32F,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            Self::LumaA8 | Self::Rgba8 | Self::LumaA16 | Self::Rgba16 | Self::Rgba32F
        )
    }
}

/// Assert a raster is a valid image: positive width and height and a
/// pixel buffer consistent with its dimensions.
pub fn ensure_valid(img: &DynamicImage) -> Result<()> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(ConvertError::invalid_raster(format!(
            "non-positive dimensions {width}x{height}"
        )));
    }
    let bytes_per_pixel = img.color().bytes_per_pixel() as u64;
    let expected = width as u64 * height as u64 * bytes_per_pixel;
    if img.as_bytes().len() as u64 != expected {
        return Err(ConvertError::invalid_raster(format!(
            "pixel buffer is {} bytes, expected {expected}",
            img.as_bytes().len()
        )));
    }
    Ok(())
}
