use std::{error::Error, fmt, path::PathBuf};

/// Coarse classification shared by every tfmirror error type.
///
/// Orchestrators branch on the kind rather than on individual variants:
/// transport failures may be retried later, integrity and policy failures
/// must never be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure, timeout or non-2xx response.
    Transport,
    /// Malformed JSON, gzip, tar or OpenPGP armor.
    Format,
    /// Checksum mismatch or failed signature verification.
    Integrity,
    /// Oversized, empty or unsafe input rejected by a validator.
    Policy,
    /// The caller cancelled the operation.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Format => "format",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Policy => "policy",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum BytesError {
    ParseFailed { input: String, reason: String },
}

impl fmt::Display for BytesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BytesError::ParseFailed { input, reason } => {
                write!(f, "Failed to parse `{input}` as bytes: {reason}")
            }
        }
    }
}

impl Error for BytesError {}

#[derive(Debug)]
pub enum DurationError {
    ParseFailed { input: String },
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationError::ParseFailed { input } => {
                write!(
                    f,
                    "Failed to parse `{input}` as a duration (expected e.g. `30s`, `10m`, `1h30m`)"
                )
            }
        }
    }
}

impl Error for DurationError {}

#[derive(Debug)]
pub enum HashError {
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::ReadFailed { path, source } => {
                write!(f, "Failed to read file `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for HashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HashError::ReadFailed { source, .. } => Some(source),
        }
    }
}

#[derive(Debug)]
pub enum VersionError {
    InvalidFilter { input: String, reason: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidFilter { input, reason } => {
                write!(f, "Invalid version filter `{input}`: {reason}")
            }
        }
    }
}

impl Error for VersionError {}

pub type BytesResult<T> = std::result::Result<T, BytesError>;
pub type DurationResult<T> = std::result::Result<T, DurationError>;
pub type HashResult<T> = std::result::Result<T, HashError>;
pub type VersionResult<T> = std::result::Result<T, VersionError>;
