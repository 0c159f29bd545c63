use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

/// Returns the lowercase hex SHA256 digest of `data`.
///
/// # Example
///
/// ```
/// use tfmirror_utils::hash::compute_sha256_hex;
///
/// assert_eq!(
///     compute_sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn compute_sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Returns `true` when the SHA256 of `data` matches `expected_hex`.
///
/// The comparison is case-insensitive, so digests published in uppercase
/// are accepted.
pub fn validate_binary_sha256(data: &[u8], expected_hex: &str) -> bool {
    compute_sha256_hex(data).eq_ignore_ascii_case(expected_hex.trim())
}

/// Calculates the SHA256 checksum of a file on disk.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be opened or read.
pub fn calculate_file_sha256<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |source| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source,
        }
    };

    let file = File::open(file_path).map_err(read_failed)?;
    let mut reader = HashingReader::new(file);
    io::copy(&mut reader, &mut io::sink()).map_err(read_failed)?;
    Ok(reader.finalize_hex())
}

/// A reader adapter that feeds every byte it yields into a SHA256 hasher.
///
/// Wrapping a response body in a `HashingReader` lets the caller buffer or
/// forward the content and obtain its digest from the same single pass.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consumes the reader and returns the lowercase hex digest of everything read.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
