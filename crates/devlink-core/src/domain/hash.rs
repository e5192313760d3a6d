//! 16-byte content hashes used to validate device files.
//!
//! The device reports an MD5 digest for every file it serves.  The host
//! recomputes the digest over its cached copy and only skips the download when
//! both length and digest match.  MD5 is used as a fingerprint, not as a
//! security measure: the link is not adversarial.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use md5::{Digest, Md5};
use thiserror::Error;

/// Size of a [`FileHash`] in bytes.
pub const HASH_LEN: usize = 16;

/// Errors constructing a [`FileHash`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    /// The source buffer was not exactly [`HASH_LEN`] bytes.
    #[error("hash must be exactly {HASH_LEN} bytes, got {actual}")]
    InvalidLength { actual: usize },

    /// A hex string contained a non-hex character.
    #[error("invalid hex digit in hash string: {0:?}")]
    InvalidHex(String),
}

/// A 16-byte content digest.
///
/// Equality compares all 16 bytes without short-circuiting.
#[derive(Clone, Copy, Eq, Hash)]
pub struct FileHash([u8; HASH_LEN]);

impl FileHash {
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hashes everything `reader` yields, streaming in fixed-size blocks.
    ///
    /// # Errors
    ///
    /// Propagates read errors from `reader`.
    pub fn compute_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Md5::new();
        let mut block = [0u8; 8192];
        loop {
            let n = match reader.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&block[..n]);
        }
        Ok(Self::from_digest(&hasher.finalize()))
    }

    /// Hashes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from opening or reading the file.
    pub fn compute_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::compute_reader(io::BufReader::new(file))
    }

    /// Hashes an in-memory buffer.
    pub fn compute_bytes(bytes: &[u8]) -> Self {
        Self::from_digest(&Md5::digest(bytes))
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }
}

impl PartialEq for FileHash {
    fn eq(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl TryFrom<&[u8]> for FileHash {
    type Error = HashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| HashError::InvalidLength {
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHash({self})")
    }
}

impl FromStr for FileHash {
    type Err = HashError;

    /// Parses 32 hex digits (either case).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| match e {
            hex::FromHexError::InvalidHexCharacter { .. } => HashError::InvalidHex(s.to_string()),
            _ => HashError::InvalidLength {
                actual: s.len() / 2,
            },
        })?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";
    const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";

    #[test]
    fn test_compute_bytes_matches_known_digests() {
        assert_eq!(FileHash::compute_bytes(b"").to_string(), EMPTY_MD5);
        assert_eq!(FileHash::compute_bytes(b"abc").to_string(), ABC_MD5);
    }

    #[test]
    fn test_compute_file_streams_whole_file() {
        // Arrange – larger than one read block
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        // Act
        let from_file = FileHash::compute_file(file.path()).expect("hash file");

        // Assert
        assert_eq!(from_file, FileHash::compute_bytes(&content));
    }

    #[test]
    fn test_compute_file_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileHash::compute_file(dir.path().join("absent.bin")).is_err());
    }

    #[test]
    fn test_try_from_accepts_exactly_sixteen_bytes() {
        let bytes = [7u8; HASH_LEN];
        let hash = FileHash::try_from(&bytes[..]).expect("16 bytes");
        assert_eq!(hash.as_bytes(), &bytes);
    }

    #[test]
    fn test_try_from_rejects_other_lengths() {
        for len in [0usize, 15, 17, 32] {
            let bytes = vec![0u8; len];
            assert_eq!(
                FileHash::try_from(&bytes[..]),
                Err(HashError::InvalidLength { actual: len })
            );
        }
    }

    #[test]
    fn test_equality_compares_every_byte() {
        let a = FileHash::from_bytes([1; HASH_LEN]);
        let mut last_differs = [1; HASH_LEN];
        last_differs[HASH_LEN - 1] = 2;
        assert_eq!(a, FileHash::from_bytes([1; HASH_LEN]));
        assert_ne!(a, FileHash::from_bytes(last_differs));
    }

    #[test]
    fn test_hex_round_trip_accepts_upper_case() {
        let parsed: FileHash = ABC_MD5.to_uppercase().parse().expect("parse");
        assert_eq!(parsed.to_string(), ABC_MD5);
    }

    #[test]
    fn test_from_str_rejects_wrong_digit_counts() {
        for s in ["", "9001", &ABC_MD5[..31], format!("{ABC_MD5}00").as_str()] {
            assert!(
                matches!(s.parse::<FileHash>(), Err(HashError::InvalidLength { .. })),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_str_rejects_bad_input() {
        assert!(matches!(
            "abc".parse::<FileHash>(),
            Err(HashError::InvalidLength { .. })
        ));
        assert!(matches!(
            "zz0150983cd24fb0d6963f7d28e17f72".parse::<FileHash>(),
            Err(HashError::InvalidHex(_))
        ));
    }
}
