// src/engine/decoder.rs
//
// Decoder adapters: JPEG (mozjpeg, including CMYK), PNG (zune-png),
// GIF/TIFF via the image crate.

use crate::engine::common::run_with_panic_policy;
use crate::error::{ConvertError, Result};
use image::error::ImageError;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use mozjpeg::decompress::Format;
use mozjpeg::Decompress;
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

use crate::engine::{MAX_DIMENSION, MAX_PIXELS};

/// Map image crate errors onto the conversion taxonomy.
///
/// The distinction matters: a TIFF with CCITT compression must come
/// back as UnsupportedFormat, while a truncated stream is DecodeFailed.
fn map_image_error(err: ImageError) -> ConvertError {
    match err {
        ImageError::Unsupported(e) => ConvertError::unsupported_format(e.to_string()),
        ImageError::Decoding(e) => ConvertError::decode_failed(e.to_string()),
        ImageError::Limits(e) => ConvertError::decode_failed(e.to_string()),
        other => ConvertError::decode_failed(other.to_string()),
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo).
///
/// Handles RGB, grayscale, and CMYK color spaces. The image crate's
/// pure-Rust decoder rejects CMYK JPEGs, which the sample corpus
/// contains (pre-press scans), so CMYK scanlines are converted to RGB
/// here. libjpeg hands Adobe CMYK values back inverted, hence the
/// `c * k / 255` channel math.
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:jpeg", || {
        // libjpeg pads missing scan data with gray instead of failing,
        // so a truncated stream would decode "successfully" to a
        // full-size raster. Require the EOI marker up front.
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(ConvertError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            ConvertError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        match decompress.image().map_err(|e| {
            ConvertError::decode_failed(format!("mozjpeg header read failed: {e:?}"))
        })? {
            Format::RGB(mut d) => {
                let (w, h) = (d.width() as u32, d.height() as u32);
                check_dimensions(w, h)?;
                let pixels: Vec<[u8; 3]> = d.read_scanlines().map_err(|e| {
                    ConvertError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
                })?;
                let flat: Vec<u8> = pixels.into_iter().flatten().collect();
                RgbImage::from_raw(w, h, flat)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| {
                        ConvertError::decode_failed("mozjpeg: failed to build RGB image")
                    })
            }
            Format::Gray(mut d) => {
                let (w, h) = (d.width() as u32, d.height() as u32);
                check_dimensions(w, h)?;
                let pixels: Vec<[u8; 1]> = d.read_scanlines().map_err(|e| {
                    ConvertError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
                })?;
                let flat: Vec<u8> = pixels.into_iter().flatten().collect();
                GrayImage::from_raw(w, h, flat)
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| {
                        ConvertError::decode_failed("mozjpeg: failed to build gray image")
                    })
            }
            Format::CMYK(mut d) => {
                let (w, h) = (d.width() as u32, d.height() as u32);
                check_dimensions(w, h)?;
                let pixels: Vec<[u8; 4]> = d.read_scanlines().map_err(|e| {
                    ConvertError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
                })?;
                let mut flat = Vec::with_capacity(w as usize * h as usize * 3);
                for [c, m, y, k] in pixels {
                    // Inverted CMYK as stored by libjpeg
                    flat.push((c as u16 * k as u16 / 255) as u8);
                    flat.push((m as u16 * k as u16 / 255) as u8);
                    flat.push((y as u16 * k as u16 / 255) as u8);
                }
                RgbImage::from_raw(w, h, flat)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| {
                        ConvertError::decode_failed("mozjpeg: failed to build RGB image from CMYK")
                    })
            }
        }
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| ConvertError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| ConvertError::decode_failed("png: missing header info"))?;

        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(ConvertError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| ConvertError::decode_failed("png: missing colorspace"))?;

        raster_from_png_buffer(colorspace, width, height, buf)
    })
}

/// Assemble a raster from a zune pixel buffer. Only the layouts zune
/// emits under the 8-bit strip options are accepted; channel orders
/// this crate never requests (BGRA, ARGB) are rejected rather than
/// reinterpreted with the wrong channel order.
fn raster_from_png_buffer(
    colorspace: ColorSpace,
    width: u32,
    height: u32,
    buf: Vec<u8>,
) -> Result<DynamicImage> {
    match colorspace {
        ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build RGB image")),
        ColorSpace::RGBA => RgbaImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build RGBA image")),
        ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build Luma image")),
        ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageLumaA8)
            .ok_or_else(|| ConvertError::decode_failed("png: failed to build LumaA image")),
        other => Err(ConvertError::unsupported_format(format!(
            "png colorspace {other:?}"
        ))),
    }
}

/// Decode GIF, TIFF, and anything else through the image crate.
/// The stage label feeds the panic policy so that a defective codec
/// path is reported against the right format.
pub fn decode_with_image_crate(data: &[u8], stage: &'static str) -> Result<DynamicImage> {
    run_with_panic_policy(stage, || {
        image::load_from_memory(data).map_err(map_image_error)
    })
}

/// Read the Compression tag (259) out of the first IFD. Both byte
/// orders are handled; anything malformed returns None and is left
/// for the codec to reject.
fn tiff_compression_tag(data: &[u8]) -> Option<u16> {
    let le = match data.get(0..2)? {
        b"II" => true,
        b"MM" => false,
        _ => return None,
    };
    let u16_at = |offset: usize| -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if le {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    };
    let u32_at = |offset: usize| -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if le {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    };

    let ifd = u32_at(4)? as usize;
    let entries = u16_at(ifd)? as usize;
    for i in 0..entries {
        let entry = ifd + 2 + i * 12;
        if u16_at(entry)? == 259 {
            return u16_at(entry + 8);
        }
    }
    None
}

/// The TIFF codec does not implement the CCITT compressions (modified
/// Huffman RLE, Group 3, Group 4). Group 4 in particular fails deep in
/// strip reading with a generic truncation error, so the compression
/// tag is checked up front and all three report uniformly as an
/// unsupported format feature.
fn reject_ccitt_tiff(data: &[u8]) -> Result<()> {
    match tiff_compression_tag(data) {
        Some(compression @ 2..=4) => Err(ConvertError::unsupported_format(format!(
            "TIFF CCITT compression scheme {compression}"
        ))),
        _ => Ok(()),
    }
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Route JPEG to mozjpeg, PNG to zune-png, others to the image crate
/// - Return decoded raster and detected format
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>)> {
    let detected = detect_format(bytes);
    let img = match detected {
        Some(ImageFormat::Jpeg) => decode_jpeg_mozjpeg(bytes)?,
        Some(ImageFormat::Png) => decode_png_zune(bytes)?,
        Some(ImageFormat::Tiff) => {
            reject_ccitt_tiff(bytes)?;
            decode_with_image_crate(bytes, "decode:tiff")?
        }
        Some(ImageFormat::Gif) => decode_with_image_crate(bytes, "decode:gif")?,
        _ => decode_with_image_crate(bytes, "decode:image")?,
    };
    debug_assert!(img.width() > 0 && img.height() > 0);
    Ok((img, detected))
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ConvertError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ConvertError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}
