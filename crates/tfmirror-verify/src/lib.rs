pub mod archive;
pub mod binary;
pub mod error;
pub mod keys;
pub mod platform;
pub mod signature;

pub use archive::validate_archive;
pub use binary::{validate_provider_binary, verify_checksum};
pub use error::{ArchiveError, VerifyError};
pub use keys::TrustAnchor;
pub use platform::validate_platform;
pub use signature::{verify_signature, verify_with_any_key, SignatureVerification};
pub use tfmirror_utils::hash::{compute_sha256_hex, validate_binary_sha256};
