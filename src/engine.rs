// src/engine.rs
//
// The core of rastermill. A strictly linear conversion pipeline:
// resolve -> decode -> alpha transform -> encode -> validate.
//
// This file is a facade that delegates to the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod alpha;
mod common;
mod decoder;
mod encoder;
mod io;
mod pipeline;
mod validate;

pub use alpha::apply_alpha_policy;
pub use common::run_with_panic_policy;
pub use decoder::{check_dimensions, decode_image, decode_jpeg_mozjpeg, detect_format};
pub use encoder::{
    encode_jpeg_baseline, encode_jpeg_mozjpeg, encode_png_image, encode_png_optimized,
    EncodedImage, EncoderRegistry, RegisteredEncoder,
};
pub use io::{output_path, ImageRepository, Source};
pub use pipeline::{
    convert, convert_file, run_batch, BatchReport, ConversionOutcome, ConversionSpec,
    FailurePolicy,
};
pub use validate::{ensure_valid, ColorLayout};
