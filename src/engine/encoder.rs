// src/engine/encoder.rs
//
// Encoder adapters and the encoder registry.
//
// More than one implementation can be registered under the same format
// name (two JPEG writers, two PNG writers). Callers request a format
// and, optionally, a specific named implementation; selection among
// several is deterministic first-match, never registration-order
// scanning at the call site.

use crate::engine::common::run_with_panic_policy;
use crate::error::{ConvertError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use img_parts::{jpeg::Jpeg, png::Png, ImageICC};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

use crate::engine::MAX_DIMENSION;

/// Result of an encode: the serialized bytes plus what happened to the
/// alpha channel. `alpha_dropped` is true when the source raster had
/// alpha and the chosen encoder cannot carry it - the channel was
/// silently discarded, and tests assert on exactly that.
#[derive(Clone, Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub alpha_dropped: bool,
    pub encoder_name: &'static str,
}

/// A single encoder implementation registered under a format name.
#[derive(Clone, Copy)]
pub struct RegisteredEncoder {
    /// Implementation tag, unique within a format (e.g. "mozjpeg").
    pub name: &'static str,
    /// Lowercase format identifier this encoder serves.
    pub format: &'static str,
    pub mime_type: &'static str,
    /// Whether the produced container carries an alpha channel.
    pub supports_alpha: bool,
    encode_fn: fn(&DynamicImage, u8) -> Result<Vec<u8>>,
}

impl std::fmt::Debug for RegisteredEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredEncoder")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("supports_alpha", &self.supports_alpha)
            .finish()
    }
}

impl RegisteredEncoder {
    pub fn encode(&self, img: &DynamicImage, quality: u8) -> Result<EncodedImage> {
        let alpha_dropped = img.color().has_alpha() && !self.supports_alpha;
        let bytes = (self.encode_fn)(img, quality)?;
        Ok(EncodedImage {
            bytes,
            alpha_dropped,
            encoder_name: self.name,
        })
    }
}

/// Ordered mapping from format identifier to encoder implementations.
#[derive(Clone, Debug)]
pub struct EncoderRegistry {
    entries: Vec<RegisteredEncoder>,
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EncoderRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The built-in encoder set. Per format, the first registration is
    /// the default implementation.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(RegisteredEncoder {
            name: "mozjpeg",
            format: "jpeg",
            mime_type: "image/jpeg",
            supports_alpha: false,
            encode_fn: encode_jpeg_mozjpeg,
        });
        registry.register(RegisteredEncoder {
            name: "image-rs",
            format: "jpeg",
            mime_type: "image/jpeg",
            supports_alpha: false,
            encode_fn: encode_jpeg_baseline,
        });
        registry.register(RegisteredEncoder {
            name: "oxipng",
            format: "png",
            mime_type: "image/png",
            supports_alpha: true,
            encode_fn: encode_png_optimized,
        });
        registry.register(RegisteredEncoder {
            name: "image-rs",
            format: "png",
            mime_type: "image/png",
            supports_alpha: true,
            encode_fn: encode_png_image,
        });
        registry.register(RegisteredEncoder {
            name: "image-rs",
            format: "gif",
            mime_type: "image/gif",
            supports_alpha: true,
            encode_fn: encode_gif_image,
        });
        registry.register(RegisteredEncoder {
            name: "image-rs",
            format: "tiff",
            mime_type: "image/tiff",
            supports_alpha: true,
            encode_fn: encode_tiff_image,
        });
        registry
    }

    pub fn register(&mut self, encoder: RegisteredEncoder) {
        self.entries.push(encoder);
    }

    /// Select an encoder for `format`, optionally pinned to a named
    /// implementation. With no preference the first registered
    /// implementation for the format wins, deterministically.
    pub fn select(&self, format: &str, preferred: Option<&str>) -> Result<&RegisteredEncoder> {
        let format = canonical_format_name(format);
        self.entries
            .iter()
            .filter(|e| e.format == format)
            .find(|e| preferred.map_or(true, |p| e.name == p))
            .ok_or_else(|| {
                ConvertError::no_encoder_available(
                    format.to_string(),
                    preferred.map(|p| Cow::Owned(p.to_string())),
                )
            })
    }

    /// Distinct format names with at least one registered encoder, in
    /// first-registration order.
    pub fn write_formats(&self) -> Vec<&'static str> {
        let mut formats = Vec::new();
        for entry in &self.entries {
            if !formats.contains(&entry.format) {
                formats.push(entry.format);
            }
        }
        formats
    }

    /// Distinct MIME types with at least one registered encoder, in
    /// first-registration order.
    pub fn write_mime_types(&self) -> Vec<&'static str> {
        let mut mimes = Vec::new();
        for entry in &self.entries {
            if !mimes.contains(&entry.mime_type) {
                mimes.push(entry.mime_type);
            }
        }
        mimes
    }

    /// Implementation tags registered for a format, in selection order.
    pub fn implementations(&self, format: &str) -> Vec<&'static str> {
        let format = canonical_format_name(format);
        self.entries
            .iter()
            .filter(|e| e.format == format)
            .map(|e| e.name)
            .collect()
    }
}

fn canonical_format_name(format: &str) -> &str {
    match format {
        "jpg" => "jpeg",
        "tif" => "tiff",
        other => other,
    }
}

/// Encode to JPEG using mozjpeg with progressive scan and optimized
/// coding. Alpha-bearing rasters are converted to RGB first.
pub fn encode_jpeg_mozjpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let quality = quality.min(100);

        // Zero-copy when already RGB8
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(ConvertError::invalid_raster("width or height is zero"));
        }
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(ConvertError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
        }
        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(ConvertError::invalid_raster("pixel buffer size mismatch"));
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);

        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            ConvertError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = w as usize * 3;
        for row in pixels.chunks(stride) {
            writer.write_scanlines(row).map_err(|e| {
                ConvertError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to write scanlines: {e:?}"),
                )
            })?;
        }

        writer.finish().map_err(|e| {
            ConvertError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
        })?;

        Ok(output)
    })
}

/// Encode to baseline JPEG using the image crate.
pub fn encode_jpeg_baseline(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        // The image crate's JPEG encoder rejects alpha-bearing buffers.
        let rgb: Cow<'_, DynamicImage> = if img.color().has_alpha() {
            Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8()))
        } else {
            Cow::Borrowed(img)
        };
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality.min(100));
        rgb.write_with_encoder(encoder)
            .map_err(|e| ConvertError::encode_failed("jpeg", format!("JPEG encode failed: {e}")))?;
        Ok(buf)
    })
}

/// Encode to PNG using the image crate, then recompress losslessly
/// with oxipng.
pub fn encode_png_optimized(img: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let buf = encode_png_plain(img)?;

        let mut options = oxipng::Options::from_preset(2);
        // Keep metadata chunks (in particular ICC)
        options.strip = oxipng::StripChunks::None;

        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            ConvertError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to PNG using the image crate only.
pub fn encode_png_image(img: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || encode_png_plain(img))
}

fn encode_png_plain(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ConvertError::encode_failed("png", format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_gif_image(img: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:gif", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)
            .map_err(|e| ConvertError::encode_failed("gif", format!("GIF encode failed: {e}")))?;
        Ok(buf)
    })
}

fn encode_tiff_image(img: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:tiff", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff)
            .map_err(|e| ConvertError::encode_failed("tiff", format!("TIFF encode failed: {e}")))?;
        Ok(buf)
    })
}

// =============================================================================
// ICC PROFILE PASSTHROUGH
// =============================================================================

/// Extract an ICC profile from JPEG (APP2 marker) or PNG (iCCP chunk)
/// source bytes. Other containers return None.
pub fn extract_icc_profile(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 8 {
        return None;
    }
    if data[0] == 0xFF && data[1] == 0xD8 {
        let jpeg = Jpeg::from_bytes(data.to_vec().into()).ok()?;
        jpeg.icc_profile().map(|icc| icc.to_vec())
    } else if data[0..4] == [0x89, 0x50, 0x4E, 0x47] {
        let png = Png::from_bytes(data.to_vec().into()).ok()?;
        png.icc_profile().map(|icc| icc.to_vec())
    } else {
        None
    }
}

/// Embed an ICC profile into freshly encoded JPEG or PNG bytes.
/// Formats without profile support return the bytes unchanged.
pub fn embed_icc_profile(format: &str, encoded: Vec<u8>, icc: &[u8]) -> Result<Vec<u8>> {
    match canonical_format_name(format) {
        "jpeg" => run_with_panic_policy("encode:jpeg:embed_icc", || {
            let mut jpeg = Jpeg::from_bytes(encoded.into()).map_err(|e| {
                ConvertError::encode_failed("jpeg", format!("failed to parse JPEG for ICC: {e}"))
            })?;
            jpeg.set_icc_profile(Some(icc.to_vec().into()));
            let mut output = Vec::new();
            jpeg.encoder().write_to(&mut output).map_err(|e| {
                ConvertError::encode_failed("jpeg", format!("failed to write JPEG with ICC: {e}"))
            })?;
            Ok(output)
        }),
        "png" => run_with_panic_policy("encode:png:embed_icc", || {
            let mut png = Png::from_bytes(encoded.into()).map_err(|e| {
                ConvertError::encode_failed("png", format!("failed to parse PNG for ICC: {e}"))
            })?;
            png.set_icc_profile(Some(icc.to_vec().into()));
            let mut output = Vec::new();
            png.encoder().write_to(&mut output).map_err(|e| {
                ConvertError::encode_failed("png", format!("failed to write PNG with ICC: {e}"))
            })?;
            Ok(output)
        }),
        _ => Ok(encoded),
    }
}
