// lib.rs
//
// rastermill: a deterministic image format conversion harness.
//
// Design goals:
// - Strictly linear pipeline per image: resolve -> decode -> alpha
//   transform -> encode -> validate
// - Explicit alpha-channel policy, never silent black transparency
// - Typed failure taxonomy: unsupported format, corrupt data, and
//   codec defects are distinct and testable
// - Named encoder implementations selectable per format

pub mod engine;
pub mod error;
pub mod ops;

use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};

pub use engine::{
    apply_alpha_policy, convert, convert_file, run_batch, BatchReport, ColorLayout,
    ConversionOutcome, ConversionSpec, EncodedImage, EncoderRegistry, FailurePolicy,
    ImageRepository, Source,
};
pub use error::{ConvertError, ErrorCategory, Result};
pub use ops::{AlphaPolicy, TargetFormat};

/// Image metadata read from the header only, without decoding pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| ConvertError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{f:?}").to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ConvertError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Inspect image metadata without decoding pixels. Reads only the
/// header bytes.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

/// Inspect image metadata from a file path without loading the whole
/// file.
pub fn inspect_header_from_path(path: &str) -> Result<InspectMetadata> {
    use std::fs::File;

    let file = File::open(path).map_err(|e| ConvertError::file_read_failed(path.to_string(), e))?;
    read_inspect_metadata(BufReader::new(file))
}

/// Get library version
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Format names the decoder adapters accept.
pub fn read_formats() -> Vec<&'static str> {
    vec!["jpeg", "jpg", "png", "gif", "tiff", "tif"]
}

/// MIME types the decoder adapters accept.
pub fn read_mime_types() -> Vec<&'static str> {
    vec!["image/jpeg", "image/png", "image/gif", "image/tiff"]
}
