// src/error.rs
//
// Unified error handling for rastermill
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input, recoverable
// - CodecError: Format/encoding issues
// - InternalBug: Codec defects surfaced as panics (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for conversion failures
///
/// - UserError: Invalid input, recoverable by user
/// - CodecError: Format/encoding issues
/// - InternalBug: Codec defects (should not happen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Codec defects (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// rastermill error types
///
/// All errors are type-safe and provide clear, actionable messages.
/// The three decode failure kinds are deliberately separate variants:
/// a container the codec recognizes but cannot handle (UnsupportedFormat),
/// data the codec rejects gracefully (DecodeFailed), and a codec failing
/// non-gracefully (CodecPanicked). Tests assert on exactly which kind a
/// given input produces, so these must never be collapsed.
#[derive(Debug, Error)]
pub enum ConvertError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format feature: {detail}")]
    UnsupportedFormat { detail: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Codec panicked in stage '{stage}': {message}")]
    CodecPanicked {
        stage: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Encode Errors
    #[error("No encoder registered for format '{format}' (preferred: {preferred:?})")]
    NoEncoderAvailable {
        format: Cow<'static, str>,
        preferred: Option<Cow<'static, str>>,
    },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Raster Errors
    #[error("Invalid raster: {reason}")]
    InvalidRaster { reason: Cow<'static, str> },
}

impl Clone for ConvertError {
    fn clone(&self) -> Self {
        match self {
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::UnsupportedFormat { detail } => Self::UnsupportedFormat {
                detail: detail.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::CodecPanicked { stage, message } => Self::CodecPanicked {
                stage: stage.clone(),
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::NoEncoderAvailable { format, preferred } => Self::NoEncoderAvailable {
                format: format.clone(),
                preferred: preferred.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::InvalidRaster { reason } => Self::InvalidRaster {
                reason: reason.clone(),
            },
        }
    }
}

// Constructor Helpers
impl ConvertError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(detail: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            detail: detail.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn codec_panicked(
        stage: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::CodecPanicked {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn no_encoder_available(
        format: impl Into<Cow<'static, str>>,
        preferred: Option<Cow<'static, str>>,
    ) -> Self {
        Self::NoEncoderAvailable {
            format: format.into(),
            preferred,
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_raster(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRaster {
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it)
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            // UserError: Invalid input, recoverable
            Self::FileNotFound { .. }
            | Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::NoEncoderAvailable { .. } => ErrorCategory::UserError,

            // CodecError: Format/encoding issues
            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::InvalidRaster { .. } => ErrorCategory::CodecError,

            // InternalBug: codec failed non-gracefully
            Self::CodecPanicked { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::file_not_found("/images/jpg/marble.jpg");
        assert!(err.to_string().contains("/images/jpg/marble.jpg"));
    }

    #[test]
    fn test_error_recoverable() {
        assert!(ConvertError::file_not_found("test.jpg").is_recoverable());
        assert!(ConvertError::no_encoder_available("jp2", None).is_recoverable());
        assert!(!ConvertError::decode_failed("test").is_recoverable());
        assert!(!ConvertError::codec_panicked("decode:tiff", "test").is_recoverable());
    }

    #[test]
    fn test_error_category_user_error() {
        assert_eq!(
            ConvertError::file_not_found("test.jpg").category(),
            ErrorCategory::UserError
        );
        assert_eq!(
            ConvertError::file_read_failed(
                "test.jpg",
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )
            .category(),
            ErrorCategory::UserError
        );
        assert_eq!(
            ConvertError::dimension_exceeds_limit(40000, 32768).category(),
            ErrorCategory::UserError
        );
        assert_eq!(
            ConvertError::no_encoder_available("jp2", None).category(),
            ErrorCategory::UserError
        );
    }

    #[test]
    fn test_error_category_codec_error() {
        assert_eq!(
            ConvertError::unsupported_format("TIFF compression 3").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ConvertError::decode_failed("truncated stream").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ConvertError::encode_failed("jpeg", "test").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ConvertError::invalid_raster("zero width").category(),
            ErrorCategory::CodecError
        );
    }

    #[test]
    fn test_error_category_internal_bug() {
        assert_eq!(
            ConvertError::codec_panicked("decode:tiff", "index out of bounds").category(),
            ErrorCategory::InternalBug
        );
    }

    #[test]
    fn test_unsupported_and_panicked_are_distinguishable() {
        // The conversion tests rely on telling these two apart; a generic
        // catch-all mapping would break them.
        let unsupported = ConvertError::unsupported_format("TIFF compression 3");
        let panicked = ConvertError::codec_panicked("decode:tiff", "index 4 out of range");
        assert!(matches!(
            unsupported,
            ConvertError::UnsupportedFormat { .. }
        ));
        assert!(matches!(panicked, ConvertError::CodecPanicked { .. }));
        assert_ne!(unsupported.category(), panicked.category());
    }

    #[test]
    fn test_no_encoder_display_with_preferred() {
        let err = ConvertError::no_encoder_available("jpeg", Some("libjpeg".into()));
        let msg = err.to_string();
        assert!(msg.contains("jpeg"));
        assert!(msg.contains("libjpeg"));
    }
}
