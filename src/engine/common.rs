// src/engine/common.rs
//
// Panic policy shared by every codec call site.
//
// The external codecs are the only place this crate can fail
// non-gracefully: a defect in a decoder (e.g. indexing past the end of
// decoded strip data) surfaces as a panic, not as a well-formed error.
// Tests assert on exactly which failure kind a given input produces,
// so panics are caught here and mapped to their own error variant
// instead of being folded into a generic decode error.

use crate::error::{ConvertError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a codec closure, converting panics into `CodecPanicked`.
///
/// `stage` names the call site (e.g. "decode:tiff", "encode:jpeg") and
/// ends up in the error message.
pub fn run_with_panic_policy<T>(stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            Err(ConvertError::codec_panicked(stage, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_ok() {
        let result = run_with_panic_policy("test", || Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_passes_through_err() {
        let result: Result<()> = run_with_panic_policy("test", || {
            Err(ConvertError::unsupported_format("TIFF compression 3"))
        });
        assert!(matches!(
            result.unwrap_err(),
            ConvertError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn test_maps_panic_to_codec_panicked() {
        let result: Result<()> =
            run_with_panic_policy("decode:tiff", || panic!("index 4 out of range"));
        match result.unwrap_err() {
            ConvertError::CodecPanicked { stage, message } => {
                assert_eq!(stage, "decode:tiff");
                assert!(message.contains("index 4"));
            }
            other => panic!("expected CodecPanicked, got {other:?}"),
        }
    }

    #[test]
    fn test_maps_string_panic_payload() {
        let reason = String::from("strip data truncated");
        let result: Result<()> =
            run_with_panic_policy("decode:tiff", move || panic!("{}", reason));
        assert!(matches!(
            result.unwrap_err(),
            ConvertError::CodecPanicked { .. }
        ));
    }
}
