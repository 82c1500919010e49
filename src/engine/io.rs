// src/engine/io.rs
//
// I/O: Source enum, sample-image resolution, and output file naming.

use crate::error::{ConvertError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Image source - supports in-memory data, memory-mapped files, and
/// file paths (lazy loading).
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
    /// File path for lazy loading (data is read only when needed)
    Path(PathBuf),
}

impl Source {
    /// Load the actual bytes from the source.
    /// For Mapped sources this copies; prefer as_bytes() when possible.
    pub fn load(&self) -> Result<Arc<Vec<u8>>> {
        match self {
            Source::Memory(data) => Ok(data.clone()),
            Source::Mapped(mmap) => Ok(Arc::new(mmap.as_ref().to_vec())),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    ConvertError::file_read_failed(path.to_string_lossy().to_string(), e)
                })?;
                Ok(Arc::new(data))
            }
        }
    }

    /// Get the bytes directly - works for Memory and Mapped sources.
    /// Returns None for Path sources (which need to be loaded first).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Mapped(mmap) => Some(mmap.as_ref()),
            Source::Path(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Source::Memory(data) => data.len(),
            Source::Mapped(mmap) => mmap.len(),
            Source::Path(_) => 0, // Unknown until loaded
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves sample images under a fixed corpus root, organized as
/// `<root>/<format-folder>/<filename>` (e.g. `images/jpg/marble.jpg`).
#[derive(Clone, Debug)]
pub struct ImageRepository {
    root: PathBuf,
}

impl ImageRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate a sample image by (format-folder, filename) pair.
    /// Fails fast with FileNotFound if the file is missing or unreadable.
    pub fn resolve(&self, folder: &str, name: &str) -> Result<PathBuf> {
        let path = self.root.join(folder).join(name);
        let metadata = std::fs::metadata(&path)
            .map_err(|_| ConvertError::file_not_found(path.to_string_lossy().to_string()))?;
        if !metadata.is_file() {
            return Err(ConvertError::file_not_found(
                path.to_string_lossy().to_string(),
            ));
        }
        Ok(path)
    }

    /// Resolve and memory-map a sample image.
    pub fn open(&self, folder: &str, name: &str) -> Result<Source> {
        let path = self.resolve(folder, name)?;
        let file = File::open(&path)
            .map_err(|e| ConvertError::file_read_failed(path.to_string_lossy().to_string(), e))?;
        // Safety: the corpus is read-only for the lifetime of a run.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ConvertError::file_read_failed(path.to_string_lossy().to_string(), e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }
}

/// Deterministic output file name derived from (case name, source file
/// name, target extension): `<dir>/<case>-<source-stem>.<ext>`.
pub fn output_path(dir: &Path, case: &str, source: &Path, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{case}-{stem}.{extension}"))
}
