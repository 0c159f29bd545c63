use crate::{
    cancel::CancellationToken,
    error::Result,
    types::{ChecksumsFile, DownloadedBinary, VersionInfo},
};

/// The capability every release upstream offers, whatever protocol it speaks.
pub trait ReleaseSource {
    /// Lists every version the upstream publishes, normalized.
    fn list_versions(&self, cancel: &CancellationToken) -> Result<Vec<VersionInfo>>;

    /// Fetches and parses the `SHA256SUMS` file of `version`.
    fn fetch_checksums(&self, cancel: &CancellationToken, version: &str) -> Result<ChecksumsFile>;

    /// Fetches the detached signature over the `SHA256SUMS` file of `version`.
    fn fetch_signature(&self, cancel: &CancellationToken, version: &str) -> Result<Vec<u8>>;

    /// Downloads one binary, hashing it while it streams. Makes a single attempt.
    fn download_binary(&self, cancel: &CancellationToken, url: &str) -> Result<DownloadedBinary>;
}
