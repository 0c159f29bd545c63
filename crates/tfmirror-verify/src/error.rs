use miette::Diagnostic;
use thiserror::Error;
pub use tfmirror_utils::error::ErrorKind;

#[derive(Error, Diagnostic, Debug)]
pub enum VerifyError {
    #[error("{what} cannot be empty")]
    #[diagnostic(code(tfmirror_verify::empty_input))]
    EmptyInput { what: &'static str },

    #[error("Invalid public key: {reason}")]
    #[diagnostic(
        code(tfmirror_verify::invalid_key_format),
        help("Provide an ASCII-armored key starting with -----BEGIN PGP PUBLIC KEY BLOCK-----")
    )]
    InvalidKeyFormat { reason: &'static str },

    #[error("Failed to parse public key: {0}")]
    #[diagnostic(code(tfmirror_verify::key_parse))]
    KeyParse(#[source] pgp::errors::Error),

    #[error("Failed to parse signature: {0}")]
    #[diagnostic(code(tfmirror_verify::signature_parse))]
    SignatureParse(#[source] pgp::errors::Error),

    #[error("Signature verification failed: no key in the keyring produced a valid signature")]
    #[diagnostic(
        code(tfmirror_verify::signature_mismatch),
        help("The checksums file may have been tampered with, or it was signed by a different key")
    )]
    SignatureMismatch,

    #[error("No public keys provided")]
    #[diagnostic(
        code(tfmirror_verify::no_keys),
        help("Configure at least one key with `keys = [...]` or pass --key")
    )]
    NoKeys,

    #[error("None of the {tried} provided keys verified the signature: {source}")]
    #[diagnostic(code(tfmirror_verify::all_keys_failed))]
    AllKeysFailed {
        tried: usize,
        #[source]
        source: Box<VerifyError>,
    },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(tfmirror_verify::checksum_mismatch),
        help("The download is corrupt or was altered in transit; do not use it")
    )]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Invalid provider binary: {reason}")]
    #[diagnostic(code(tfmirror_verify::invalid_provider_binary))]
    InvalidProviderBinary { reason: String },

    #[error("Unsupported platform: {reason}")]
    #[diagnostic(
        code(tfmirror_verify::unsupported_platform),
        help("Supported OS: darwin, freebsd, linux, openbsd, solaris, windows; arch: 386, amd64, arm, arm64")
    )]
    UnsupportedPlatform { reason: String },
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput { .. }
            | Self::NoKeys
            | Self::InvalidProviderBinary { .. }
            | Self::UnsupportedPlatform { .. } => ErrorKind::Policy,
            Self::InvalidKeyFormat { .. } | Self::KeyParse(_) | Self::SignatureParse(_) => {
                ErrorKind::Format
            }
            Self::SignatureMismatch | Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::AllKeysFailed { source, .. } => source.kind(),
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum ArchiveError {
    #[error("Invalid gzip format: {0}")]
    #[diagnostic(code(tfmirror_verify::invalid_gzip))]
    InvalidGzip(#[source] std::io::Error),

    #[error("Invalid tar format: {0}")]
    #[diagnostic(code(tfmirror_verify::invalid_tar))]
    InvalidTar(#[source] std::io::Error),

    #[error("Archive size exceeds maximum allowed size of {max_size} bytes")]
    #[diagnostic(
        code(tfmirror_verify::archive_too_large),
        help("Raise the limit with --max-size or `max_archive_size` if this archive is legitimate")
    )]
    TooLarge { max_size: u64 },

    #[error("Archive is empty")]
    #[diagnostic(code(tfmirror_verify::archive_empty))]
    Empty,

    #[error("Absolute paths not allowed: {path}")]
    #[diagnostic(code(tfmirror_verify::absolute_path))]
    AbsolutePath { path: String },

    #[error("Path traversal not allowed: {path}")]
    #[diagnostic(code(tfmirror_verify::path_traversal))]
    PathTraversal { path: String },

    #[error("Git directories not allowed in archives: {path}")]
    #[diagnostic(code(tfmirror_verify::git_metadata))]
    GitMetadata { path: String },
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidGzip(_) | Self::InvalidTar(_) => ErrorKind::Format,
            _ => ErrorKind::Policy,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_error_kinds() {
        assert_eq!(VerifyError::SignatureMismatch.kind(), ErrorKind::Integrity);
        assert_eq!(VerifyError::NoKeys.kind(), ErrorKind::Policy);
        assert_eq!(
            VerifyError::ChecksumMismatch {
                expected: "aa".into(),
                actual: "bb".into()
            }
            .kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            VerifyError::AllKeysFailed {
                tried: 2,
                source: Box::new(VerifyError::InvalidKeyFormat {
                    reason: "missing BEGIN marker"
                }),
            }
            .kind(),
            ErrorKind::Format
        );
    }

    #[test]
    fn test_archive_error_display() {
        assert_eq!(
            ArchiveError::TooLarge { max_size: 10 }.to_string(),
            "Archive size exceeds maximum allowed size of 10 bytes"
        );
        assert_eq!(ArchiveError::Empty.kind(), ErrorKind::Policy);
        assert_eq!(
            ArchiveError::InvalidGzip(std::io::Error::other("bad header")).kind(),
            ErrorKind::Format
        );
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = VerifyError::ChecksumMismatch {
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert_eq!(err.to_string(), "Checksum mismatch: expected abc, got def");
    }
}
