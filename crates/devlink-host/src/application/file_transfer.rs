//! Use case: download one device file into the cache.
//!
//! A download is a conversation of this shape:
//!
//! ```text
//! host                                device
//!  │── FileInfoRequest("layout.bin") ──▶│
//!  │◀── FileInfoResponse(id, len, hash) │
//!  │   (cache hit? stop here)           │
//!  │── FileDataRequest(id, 0, 245) ────▶│
//!  │◀── FileDataResponse(id, 0, …) ─────│
//!  │── FileDataRequest(id, 245, 245) ──▶│
//!  │              …                     │
//! ```
//!
//! [`FileDownload`] drives the host side.  It never touches a transport: the
//! caller sends what [`FileDownload::next_request`] returns and hands each
//! response to [`FileDownload::apply`].  Retries and timeouts belong to the
//! caller, which simply asks for `next_request` again.

use std::path::PathBuf;

use devlink_core::protocol::messages::{
    FileDataRequest, FileDataResponse, FileInfoResponse, MAX_FILE_DATA_CHUNK,
};
use devlink_core::FileHash;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::infrastructure::storage::cache::{CacheError, CachedFile, DeviceFileCache};
use crate::infrastructure::storage::config::LinkSection;

/// Error type for file downloads.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("chunk size must be between 1 and {MAX_FILE_DATA_CHUNK}, got {0}")]
    InvalidChunkSize(u8),

    #[error("response is for file {actual}, download is for file {expected}")]
    WrongFile { expected: u8, actual: u8 },

    #[error("chunk starts at offset {actual}, expected offset {expected}")]
    UnexpectedOffset { expected: u32, actual: u32 },

    #[error("empty chunk at offset {offset}")]
    EmptyChunk { offset: u32 },

    #[error("chunk of {len} bytes is longer than the {max}-byte request size")]
    ChunkTooLong { len: usize, max: u8 },

    #[error("chunk of {len} bytes at offset {offset} runs past the {file_length}-byte file")]
    Overrun {
        offset: u32,
        len: usize,
        file_length: u32,
    },

    #[error("downloaded {name} has hash {actual}, device reported {expected}")]
    HashMismatch {
        name: String,
        expected: FileHash,
        actual: FileHash,
    },

    #[error("failed to hash downloaded file {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {0} is already complete")]
    AlreadyComplete(String),
}

/// What [`FileDownload::start`] decided.
#[derive(Debug)]
pub enum DownloadPlan {
    /// The cache already holds this exact file.
    Cached(PathBuf),
    /// Data has to be fetched; drive the download to completion.
    Download(FileDownload),
}

/// Result of applying one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadProgress {
    InProgress { received: u32, total: u32 },
    /// The file is complete, closed and verified.
    Complete(PathBuf),
}

/// An in-progress download of one device file.
#[derive(Debug)]
pub struct FileDownload {
    cache: DeviceFileCache,
    name: String,
    info: FileInfoResponse,
    chunk_size: u8,
    file: CachedFile,
    next_offset: u32,
    complete: bool,
}

impl FileDownload {
    /// Checks the cache for `name` and, on a miss, opens a fresh cache file.
    ///
    /// A zero-length file has no chunks to fetch, so it is written and
    /// verified here and reported as [`DownloadPlan::Cached`].
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidChunkSize`] if `chunk_size` is 0 or above
    ///   [`MAX_FILE_DATA_CHUNK`].
    /// - [`TransferError::Cache`] if the cache file cannot be created.
    /// - [`TransferError::HashMismatch`] for a zero-length file whose reported
    ///   hash is not the empty-input hash.
    pub fn start(
        cache: &DeviceFileCache,
        name: &str,
        info: &FileInfoResponse,
        chunk_size: u8,
    ) -> Result<DownloadPlan, TransferError> {
        if chunk_size == 0 || chunk_size as usize > MAX_FILE_DATA_CHUNK {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }

        if cache.is_file_exists(name, u64::from(info.file_length), &info.hash) {
            info!(file = name, "cached copy is current, skipping download");
            return Ok(DownloadPlan::Cached(cache.file_path(name)?));
        }

        let file = cache.create_file(name)?;
        info!(
            file = name,
            file_id = info.file_id,
            length = info.file_length,
            "starting download"
        );
        let mut download = FileDownload {
            cache: cache.clone(),
            name: name.to_string(),
            info: info.clone(),
            chunk_size,
            file,
            next_offset: 0,
            complete: false,
        };

        if info.file_length == 0 {
            return download.finish().map(DownloadPlan::Cached);
        }
        Ok(DownloadPlan::Download(download))
    }

    /// [`start`](Self::start) with the chunk size from the `[link]` config
    /// section.
    ///
    /// # Errors
    ///
    /// As for [`start`](Self::start).
    pub fn start_with_config(
        cache: &DeviceFileCache,
        name: &str,
        info: &FileInfoResponse,
        link: &LinkSection,
    ) -> Result<DownloadPlan, TransferError> {
        Self::start(cache, name, info, link.chunk_size)
    }

    /// The request for the next missing chunk, or `None` once complete.
    pub fn next_request(&self) -> Option<FileDataRequest> {
        if self.complete {
            return None;
        }
        let remaining = self.info.file_length - self.next_offset;
        let length = u32::from(self.chunk_size).min(remaining) as u8;
        Some(FileDataRequest {
            file_id: self.info.file_id,
            offset: self.next_offset,
            length,
        })
    }

    /// Appends one response's data.
    ///
    /// Chunks must arrive in order; anything else is rejected without
    /// touching the file, so the caller can log it and re-send
    /// [`next_request`](Self::next_request).
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] describing why the chunk was rejected, or
    /// [`TransferError::HashMismatch`] if the completed file does not verify
    /// (the bad file is removed from the cache).
    pub fn apply(&mut self, response: &FileDataResponse) -> Result<DownloadProgress, TransferError> {
        if self.complete {
            return Err(TransferError::AlreadyComplete(self.name.clone()));
        }
        self.check_chunk(response)?;

        let len = response.data.len();
        self.file.write(&response.data, 0, len)?;
        self.next_offset += len as u32;
        debug!(
            file = %self.name,
            offset = response.offset,
            len,
            received = self.next_offset,
            total = self.info.file_length,
            "chunk stored"
        );

        if self.next_offset == self.info.file_length {
            return self.finish().map(DownloadProgress::Complete);
        }
        Ok(DownloadProgress::InProgress {
            received: self.next_offset,
            total: self.info.file_length,
        })
    }

    fn check_chunk(&self, response: &FileDataResponse) -> Result<(), TransferError> {
        if response.file_id != self.info.file_id {
            return Err(TransferError::WrongFile {
                expected: self.info.file_id,
                actual: response.file_id,
            });
        }
        if response.offset != self.next_offset {
            return Err(TransferError::UnexpectedOffset {
                expected: self.next_offset,
                actual: response.offset,
            });
        }
        let len = response.data.len();
        if len == 0 {
            return Err(TransferError::EmptyChunk {
                offset: response.offset,
            });
        }
        if len > self.chunk_size as usize {
            return Err(TransferError::ChunkTooLong {
                len,
                max: self.chunk_size,
            });
        }
        if u64::from(response.offset) + len as u64 > u64::from(self.info.file_length) {
            return Err(TransferError::Overrun {
                offset: response.offset,
                len,
                file_length: self.info.file_length,
            });
        }
        Ok(())
    }

    /// Closes the file and verifies it against the reported hash.
    fn finish(&mut self) -> Result<PathBuf, TransferError> {
        self.file.close()?;
        self.complete = true;

        let path = self.file.path().to_path_buf();
        let actual = FileHash::compute_file(&path).map_err(|source| TransferError::Hash {
            path: path.clone(),
            source,
        })?;
        if actual != self.info.hash {
            if let Err(e) = self.cache.remove_file(&self.name) {
                warn!(file = %self.name, error = %e, "failed to remove corrupt download");
            }
            return Err(TransferError::HashMismatch {
                name: self.name.clone(),
                expected: self.info.hash,
                actual,
            });
        }

        info!(file = %self.name, bytes = self.info.file_length, "download complete");
        Ok(path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes_received(&self) -> u32 {
        self.next_offset
    }

    pub fn file_length(&self) -> u32 {
        self.info.file_length
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
