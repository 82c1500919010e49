// src/ops.rs
//
// Conversion parameters: target formats and alpha-channel policies.
// These are cheap to create and store - the expensive work happens in
// the pipeline.

use crate::error::{ConvertError, Result};
use image::Rgb;

/// Target format for encoding.
///
/// Format identifiers are lowercase container names; "jpg" is accepted
/// as an alias for "jpeg".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg { quality: u8 },
    Png,
    Gif,
    Tiff,
}

impl TargetFormat {
    pub fn from_name(format: &str, quality: Option<u8>) -> Result<Self> {
        let q = quality.unwrap_or(80);
        match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg { quality: q }),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "tiff" | "tif" => Ok(Self::Tiff),
            other => Err(ConvertError::no_encoder_available(other.to_string(), None)),
        }
    }

    /// Canonical lowercase format identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

    /// File extension used for output naming.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
        }
    }

    /// Whether the container can carry an alpha channel at all.
    pub fn supports_alpha(&self) -> bool {
        match self {
            Self::Jpeg { .. } => false,
            Self::Png | Self::Gif | Self::Tiff => true,
        }
    }
}

/// Policy for rasters that carry an alpha channel.
///
/// JPEG cannot represent transparency; without an explicit policy the
/// transparent region would come out black. The caller picks one of:
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaPolicy {
    /// Pass the raster through untouched. If the encoder cannot carry
    /// alpha it drops the channel and the outcome reports that.
    Keep,
    /// Replace every not-fully-opaque pixel with the given color and
    /// force full opacity. The raster keeps its alpha channel.
    FillWithColor(Rgb<u8>),
    /// Composite onto an opaque RGB raster (source-over against black)
    /// and discard the alpha channel entirely.
    FlattenToOpaqueRgb,
}

impl AlphaPolicy {
    /// White fill, the conventional choice for documents and scans.
    pub fn fill_white() -> Self {
        Self::FillWithColor(Rgb([255, 255, 255]))
    }
}
