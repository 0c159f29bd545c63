use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tfmirror_utils::checksums::ChecksumSet;

/// One binary variant of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub download_url: String,
}

/// A release normalized across release-index and GitHub upstreams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub shasums_url: Option<String>,
    pub shasums_signature_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shasums_signatures: Vec<String>,
    pub builds: Vec<BuildArtifact>,
}

impl VersionInfo {
    pub fn build_for(&self, os: &str, arch: &str) -> Option<&BuildArtifact> {
        self.builds.iter().find(|b| b.os == os && b.arch == arch)
    }
}

/// Drops repeated `(os, arch)` pairs, keeping the first occurrence.
pub fn dedup_builds(builds: Vec<BuildArtifact>) -> Vec<BuildArtifact> {
    let mut seen = HashSet::new();
    builds
        .into_iter()
        .filter(|b| seen.insert((b.os.clone(), b.arch.clone())))
        .collect()
}

/// Whether a version without any builds is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyReleasePolicy {
    Keep,
    Drop,
}

impl EmptyReleasePolicy {
    pub fn retains(&self, version: &VersionInfo) -> bool {
        match self {
            Self::Keep => true,
            Self::Drop => !version.builds.is_empty(),
        }
    }
}

/// A `SHA256SUMS` file: parsed entries plus the exact bytes the signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumsFile {
    pub entries: ChecksumSet,
    pub raw: Vec<u8>,
}

impl ChecksumsFile {
    pub fn parse(raw: Vec<u8>) -> Self {
        Self {
            entries: ChecksumSet::parse_bytes(&raw),
            raw,
        }
    }
}

/// A downloaded body and the SHA256 computed while it streamed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedBinary {
    pub bytes: Vec<u8>,
    pub sha256: String,
}
