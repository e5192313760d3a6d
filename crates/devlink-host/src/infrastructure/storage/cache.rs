//! On-disk cache of files downloaded from devices.
//!
//! Devices serve assets (fonts, layouts, images) identified by a flat internal
//! name.  Downloading them over a UART can take a while, so the host keeps the
//! last copy of each under `<data-dir>/Cache/<name>` and re-downloads only
//! when the device reports a different length or content hash.
//!
//! # Layout
//!
//! ```text
//! <data-dir>/
//!   Cache/
//!     layout.bin
//!     big.fnt
//! ```
//!
//! The cache is flat: names containing path separators or `.`/`..` are
//! rejected, so a device can never make the host write outside `Cache/`.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use devlink_core::FileHash;
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::storage::config::{ConfigError, HostConfig};

/// Name of the cache directory inside the application data directory.
pub const CACHE_DIR_NAME: &str = "Cache";

/// Error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The device file name is not a single flat path component.
    #[error("invalid cache file name: {0:?}")]
    InvalidName(String),

    /// A file system I/O error occurred.
    #[error("I/O error accessing cache at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `write` was asked for bytes outside the supplied buffer.
    #[error("write of {length} bytes at offset {offset} exceeds the {available}-byte buffer")]
    OutOfRange {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// `write` was called after `close`.
    #[error("cache file {0} is already closed")]
    Closed(PathBuf),
}

// ── Cache ─────────────────────────────────────────────────────────────────────

/// Handle on the cache directory below one application data directory.
///
/// Cheap to clone; holds only the path.
#[derive(Debug, Clone)]
pub struct DeviceFileCache {
    data_dir: PathBuf,
}

impl DeviceFileCache {
    /// Creates a cache rooted at `<data_dir>/Cache`.  Nothing is touched on
    /// disk until the first operation.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Creates a cache in the configured (or platform default) data directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformDataDir`] when no data directory can be
    /// determined.
    pub fn from_config(config: &HostConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.data_dir()?))
    }

    /// The cache directory, without creating it.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(CACHE_DIR_NAME)
    }

    /// Returns the cache directory, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub fn cache_path(&self) -> Result<PathBuf, CacheError> {
        let dir = self.cache_dir();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Path of the cached copy of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidName`] for names that are not flat.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, CacheError> {
        validate_name(name)?;
        Ok(self.cache_dir().join(name))
    }

    /// Deletes the cache directory and everything in it.
    ///
    /// Best effort: failures are logged and otherwise ignored, because a stale
    /// cache only costs a re-download.
    pub fn clear_cache(&self) {
        let dir = self.cache_dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(dir = %dir.display(), "cache cleared"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to clear cache"),
        }
    }

    /// Returns `true` only if the cached copy of `name` exists with exactly
    /// `expected_length` bytes and content hash `expected_hash`.
    ///
    /// Any mismatch, invalid name or I/O failure yields `false`.
    pub fn is_file_exists(&self, name: &str, expected_length: u64, expected_hash: &FileHash) -> bool {
        let path = match self.file_path(name) {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "cache lookup with invalid name");
                return false;
            }
        };

        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return false,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "cannot stat cached file");
                }
                return false;
            }
        };
        if metadata.len() != expected_length {
            debug!(
                file = name,
                cached = metadata.len(),
                expected = expected_length,
                "cached file length differs"
            );
            return false;
        }

        match FileHash::compute_file(&path) {
            Ok(actual) if actual == *expected_hash => true,
            Ok(actual) => {
                debug!(file = name, %actual, expected = %expected_hash, "cached file hash differs");
                false
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot hash cached file");
                false
            }
        }
    }

    /// [`is_file_exists`](Self::is_file_exists) on Tokio's blocking pool, for
    /// callers on an async runtime.
    pub async fn is_file_exists_async(
        &self,
        name: String,
        expected_length: u64,
        expected_hash: FileHash,
    ) -> bool {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || {
            cache.is_file_exists(&name, expected_length, &expected_hash)
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "cache check task failed");
            false
        })
    }

    /// Opens (creating or truncating) the cached copy of `name` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidName`] for names that are not flat, or
    /// [`CacheError::Io`] if the directory or file cannot be created.
    pub fn create_file(&self, name: &str) -> Result<CachedFile, CacheError> {
        validate_name(name)?;
        let path = self.cache_path()?.join(name);
        let file = File::create(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "cache file opened");
        Ok(CachedFile {
            path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// Deletes the cached copy of `name`.  A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidName`] or [`CacheError::Io`].
    pub fn remove_file(&self, name: &str) -> Result<(), CacheError> {
        let path = self.file_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

fn validate_name(name: &str) -> Result<(), CacheError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', ':', '\0'][..]);
    if invalid {
        Err(CacheError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

// ── Cached file writer ────────────────────────────────────────────────────────

/// A cache file being populated.
///
/// The handle is released exactly once: by [`close`](Self::close), or by
/// `Drop` when the download is abandoned.
#[derive(Debug)]
pub struct CachedFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl CachedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Appends `buffer[offset..offset + length]`.
    ///
    /// # Errors
    ///
    /// - [`CacheError::OutOfRange`] if the range is outside `buffer`.
    /// - [`CacheError::Closed`] after [`close`](Self::close).
    /// - [`CacheError::Io`] if the write fails.
    pub fn write(&mut self, buffer: &[u8], offset: usize, length: usize) -> Result<(), CacheError> {
        let range = offset
            .checked_add(length)
            .filter(|&end| end <= buffer.len())
            .map(|end| offset..end)
            .ok_or(CacheError::OutOfRange {
                offset,
                length,
                available: buffer.len(),
            })?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CacheError::Closed(self.path.clone()))?;
        writer
            .write_all(&buffer[range])
            .map_err(|source| CacheError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.written += length as u64;
        Ok(())
    }

    /// Flushes and releases the file handle.  Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if buffered bytes cannot be flushed.
    pub fn close(&mut self) -> Result<(), CacheError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), bytes = self.written, "cache file closed");
        Ok(())
    }
}

impl Drop for CachedFile {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "failed to flush abandoned cache file");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
