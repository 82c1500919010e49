// src/engine/pipeline.rs
//
// The conversion harness: resolve -> decode -> alpha transform ->
// encode -> validate. Strictly linear per image, no retries, no shared
// state between conversions. A failure at any step aborts that single
// conversion; what happens to the rest of a batch is the caller's
// FailurePolicy.

use crate::engine::alpha::apply_alpha_policy;
use crate::engine::decoder::decode_image;
use crate::engine::encoder::{embed_icc_profile, extract_icc_profile, EncoderRegistry};
use crate::engine::io::{output_path, ImageRepository};
use crate::engine::validate::{ensure_valid, ColorLayout};
use crate::error::{ConvertError, Result};
use crate::ops::{AlphaPolicy, TargetFormat};
use std::path::{Path, PathBuf};

/// Everything a single conversion needs besides the source bytes.
#[derive(Clone, Debug)]
pub struct ConversionSpec {
    pub target: TargetFormat,
    pub alpha_policy: AlphaPolicy,
    /// Pin the encode to a named implementation instead of the
    /// registry's first match for the format.
    pub preferred_encoder: Option<&'static str>,
    /// Carry a source ICC profile over into the output container when
    /// both sides support one.
    pub preserve_icc: bool,
}

impl ConversionSpec {
    pub fn new(target: TargetFormat) -> Self {
        Self {
            target,
            alpha_policy: AlphaPolicy::Keep,
            preferred_encoder: None,
            preserve_icc: true,
        }
    }

    pub fn alpha_policy(mut self, policy: AlphaPolicy) -> Self {
        self.alpha_policy = policy;
        self
    }

    pub fn preferred_encoder(mut self, name: &'static str) -> Self {
        self.preferred_encoder = Some(name);
        self
    }
}

/// What a successful conversion produced. The raster itself is gone by
/// the time this exists - it was consumed by the encoder.
#[derive(Clone, Debug)]
pub struct ConversionOutcome {
    pub width: u32,
    pub height: u32,
    /// Detected source format name, lowercase, when recognizable.
    pub format_in: Option<String>,
    /// Color layout of the raster as it went into the encoder.
    pub layout: ColorLayout,
    /// True when the raster still carried alpha and the encoder
    /// discarded it (AlphaPolicy::Keep into e.g. JPEG).
    pub alpha_dropped: bool,
    pub encoder_name: &'static str,
    pub bytes: Vec<u8>,
}

/// Convert in-memory source bytes according to `spec`.
pub fn convert(
    bytes: &[u8],
    spec: &ConversionSpec,
    registry: &EncoderRegistry,
) -> Result<ConversionOutcome> {
    let (img, format_in) = decode_image(bytes)?;
    ensure_valid(&img)?;

    let img = apply_alpha_policy(img, spec.alpha_policy)?;
    ensure_valid(&img)?;
    let (width, height) = (img.width(), img.height());
    let layout = ColorLayout::of(&img);

    let quality = match spec.target {
        TargetFormat::Jpeg { quality } => quality,
        _ => 0,
    };
    let encoder = registry.select(spec.target.name(), spec.preferred_encoder)?;
    let encoded = encoder.encode(&img, quality)?;

    let out_bytes = if spec.preserve_icc {
        match extract_icc_profile(bytes) {
            Some(icc) => embed_icc_profile(spec.target.name(), encoded.bytes, &icc)?,
            None => encoded.bytes,
        }
    } else {
        encoded.bytes
    };

    Ok(ConversionOutcome {
        width,
        height,
        format_in: format_in.map(|f| format!("{f:?}").to_lowercase()),
        layout,
        alpha_dropped: encoded.alpha_dropped,
        encoder_name: encoded.encoder_name,
        bytes: out_bytes,
    })
}

/// Full single-file path: resolve the sample, convert it, and write
/// the result to `<out_dir>/<case>-<source-stem>.<ext>`.
pub fn convert_file(
    repo: &ImageRepository,
    folder: &str,
    name: &str,
    case: &str,
    out_dir: &Path,
    spec: &ConversionSpec,
    registry: &EncoderRegistry,
) -> Result<(PathBuf, ConversionOutcome)> {
    let source_path = repo.resolve(folder, name)?;
    let source = repo.open(folder, name)?;
    let data = source.load()?;
    let outcome = convert(&data, spec, registry)?;

    let target_path = output_path(out_dir, case, &source_path, spec.target.extension());
    std::fs::write(&target_path, &outcome.bytes).map_err(|e| {
        ConvertError::file_write_failed(target_path.to_string_lossy().to_string(), e)
    })?;
    Ok((target_path, outcome))
}

/// What a batch does when one of its conversions fails. The reference
/// behavior (one failing file fails the whole run) is AbortOnError;
/// ContinueOnError isolates failures per item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    AbortOnError,
    ContinueOnError,
}

#[derive(Debug)]
pub struct BatchReport {
    /// Per-item results in input order: "folder/name" and either the
    /// written path with its outcome, or the error.
    pub results: Vec<(String, Result<(PathBuf, ConversionOutcome)>)>,
    /// True when AbortOnError stopped the run before the last item.
    pub aborted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Run conversions over a list of (format-folder, filename) pairs,
/// sequentially and in order.
#[allow(clippy::too_many_arguments)]
pub fn run_batch(
    repo: &ImageRepository,
    items: &[(&str, &str)],
    case: &str,
    out_dir: &Path,
    spec: &ConversionSpec,
    registry: &EncoderRegistry,
    policy: FailurePolicy,
) -> BatchReport {
    let mut results = Vec::with_capacity(items.len());
    let mut aborted = false;
    for (folder, name) in items {
        let result = convert_file(repo, folder, name, case, out_dir, spec, registry);
        let failed = result.is_err();
        results.push((format!("{folder}/{name}"), result));
        if failed && policy == FailurePolicy::AbortOnError {
            aborted = true;
            break;
        }
    }
    BatchReport { results, aborted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn opaque_png(width: u32, height: u32) -> Vec<u8> {
        png_bytes(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([40, 90, 160]),
        )))
    }

    fn transparent_png(width: u32, height: u32) -> Vec<u8> {
        png_bytes(&DynamicImage::ImageRgba8(RgbaImage::from_fn(
            width,
            height,
            |x, _| {
                if x % 2 == 0 {
                    Rgba([200, 50, 25, 255])
                } else {
                    Rgba([10, 10, 10, 0])
                }
            },
        )))
    }

    #[test]
    fn test_convert_preserves_dimensions() {
        let registry = EncoderRegistry::with_defaults();
        let src = opaque_png(17, 9);
        for target in [
            TargetFormat::Jpeg { quality: 80 },
            TargetFormat::Png,
            TargetFormat::Gif,
            TargetFormat::Tiff,
        ] {
            let spec = ConversionSpec::new(target);
            let outcome = convert(&src, &spec, &registry).unwrap();
            assert_eq!((outcome.width, outcome.height), (17, 9));
            let reread = image::load_from_memory(&outcome.bytes).unwrap();
            assert_eq!((reread.width(), reread.height()), (17, 9));
        }
    }

    #[test]
    fn test_convert_reports_source_format() {
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Png);
        let outcome = convert(&opaque_png(4, 4), &spec, &registry).unwrap();
        assert_eq!(outcome.format_in.as_deref(), Some("png"));
    }

    #[test]
    fn test_flatten_into_jpeg_has_no_alpha() {
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Jpeg { quality: 85 })
            .alpha_policy(AlphaPolicy::FlattenToOpaqueRgb);
        let outcome = convert(&transparent_png(10, 10), &spec, &registry).unwrap();
        // The policy removed alpha before the encoder saw the raster
        assert!(!outcome.layout.has_alpha());
        assert!(!outcome.alpha_dropped);
        let reread = image::load_from_memory(&outcome.bytes).unwrap();
        assert!(!reread.color().has_alpha());
        assert_eq!((reread.width(), reread.height()), (10, 10));
    }

    #[test]
    fn test_keep_into_jpeg_reports_dropped_alpha() {
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Jpeg { quality: 85 });
        let outcome = convert(&transparent_png(6, 6), &spec, &registry).unwrap();
        assert!(outcome.layout.has_alpha());
        assert!(outcome.alpha_dropped);
    }

    #[test]
    fn test_png_roundtrip_is_lossless() {
        let registry = EncoderRegistry::with_defaults();
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, y| {
            Rgb([(x * 31) as u8, (y * 17) as u8, 77])
        }));
        let spec = ConversionSpec::new(TargetFormat::Png);
        let outcome = convert(&png_bytes(&img), &spec, &registry).unwrap();
        let reread = image::load_from_memory(&outcome.bytes).unwrap();
        assert_eq!(reread.to_rgb8().as_raw(), img.to_rgb8().as_raw());
    }

    #[test]
    fn test_preferred_encoder_is_used() {
        let registry = EncoderRegistry::with_defaults();
        let spec =
            ConversionSpec::new(TargetFormat::Jpeg { quality: 80 }).preferred_encoder("image-rs");
        let outcome = convert(&opaque_png(5, 5), &spec, &registry).unwrap();
        assert_eq!(outcome.encoder_name, "image-rs");
    }

    #[test]
    fn test_corrupt_source_aborts_conversion() {
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Png);
        let src = opaque_png(16, 16);
        let err = convert(&src[..src.len() / 3], &spec, &registry).unwrap_err();
        assert!(matches!(err, ConvertError::DecodeFailed { .. }));
    }

    fn corpus(files: &[(&str, &str, Vec<u8>)]) -> (tempfile::TempDir, ImageRepository) {
        let dir = tempfile::tempdir().unwrap();
        for (folder, name, data) in files {
            let folder_path = dir.path().join(folder);
            std::fs::create_dir_all(&folder_path).unwrap();
            std::fs::write(folder_path.join(name), data).unwrap();
        }
        let repo = ImageRepository::new(dir.path());
        (dir, repo)
    }

    #[test]
    fn test_convert_file_writes_deterministic_output() {
        let (_corpus_dir, repo) = corpus(&[("png", "marble.png", opaque_png(12, 7))]);
        let out = tempfile::tempdir().unwrap();
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Jpeg { quality: 80 });

        let (path, outcome) =
            convert_file(&repo, "png", "marble.png", "as_jpeg", out.path(), &spec, &registry)
                .unwrap();
        assert_eq!(path, out.path().join("as_jpeg-marble.jpg"));
        assert_eq!((outcome.width, outcome.height), (12, 7));
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, outcome.bytes);
    }

    #[test]
    fn test_batch_abort_on_error_stops_early() {
        let (_corpus_dir, repo) = corpus(&[
            ("png", "ok.png", opaque_png(4, 4)),
            ("png", "broken.png", b"not a png".to_vec()),
            ("png", "later.png", opaque_png(4, 4)),
        ]);
        let out = tempfile::tempdir().unwrap();
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Png);

        let report = run_batch(
            &repo,
            &[("png", "ok.png"), ("png", "broken.png"), ("png", "later.png")],
            "batch",
            out.path(),
            &spec,
            &registry,
            FailurePolicy::AbortOnError,
        );
        assert!(report.aborted);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_batch_continue_on_error_isolates_failures() {
        let (_corpus_dir, repo) = corpus(&[
            ("png", "ok.png", opaque_png(4, 4)),
            ("png", "broken.png", b"not a png".to_vec()),
            ("png", "later.png", opaque_png(4, 4)),
        ]);
        let out = tempfile::tempdir().unwrap();
        let registry = EncoderRegistry::with_defaults();
        let spec = ConversionSpec::new(TargetFormat::Png);

        let report = run_batch(
            &repo,
            &[("png", "ok.png"), ("png", "broken.png"), ("png", "later.png")],
            "batch",
            out.path(),
            &spec,
            &registry,
            FailurePolicy::ContinueOnError,
        );
        assert!(!report.aborted);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
    }
}
