//! Shared building blocks for tfmirror: SHA256 hashing, `SHA256SUMS`
//! parsing, release version ordering, and the small string parsers used by
//! configuration.

pub mod bytes;
pub mod checksums;
pub mod error;
pub mod hash;
pub mod path;
pub mod time;
pub mod version;
