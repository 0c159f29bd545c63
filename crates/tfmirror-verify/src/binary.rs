use tfmirror_utils::hash::compute_sha256_hex;

use crate::error::{Result, VerifyError};

const ZIP_LOCAL_FILE_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

/// Checks that `data` is a non-empty ZIP archive no larger than `max_size` bytes.
pub fn validate_provider_binary(data: &[u8], max_size: u64) -> Result<()> {
    let invalid = |reason: String| VerifyError::InvalidProviderBinary { reason };

    if data.is_empty() {
        return Err(invalid("provider binary cannot be empty".into()));
    }
    if data.len() as u64 > max_size {
        return Err(invalid(format!(
            "{} bytes exceeds the maximum of {max_size} bytes",
            data.len()
        )));
    }
    if data.len() < 4 {
        return Err(invalid("too small to be a valid ZIP file".into()));
    }
    if !data.starts_with(ZIP_LOCAL_FILE_HEADER) && !data.starts_with(ZIP_EMPTY_ARCHIVE) {
        return Err(invalid("not a ZIP file".into()));
    }
    Ok(())
}

/// Compares the SHA256 of `data` with `expected`, ignoring case.
///
/// # Errors
///
/// * [`VerifyError::ChecksumMismatch`] carrying both digests.
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    verify_digest(&compute_sha256_hex(data), expected)
}

/// Like [`verify_checksum`] for a digest that was computed while streaming.
pub fn verify_digest(actual: &str, expected: &str) -> Result<()> {
    let expected = expected.trim();
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(VerifyError::ChecksumMismatch {
            expected: expected.to_ascii_lowercase(),
            actual: actual.to_ascii_lowercase(),
        })
    }
}
