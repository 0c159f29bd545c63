//! Client for the HashiCorp/OpenTofu release-index protocol.
//!
//! ```text
//! GET {upstream}/{product}/index.json
//! GET {upstream}/{product}/{version}/{product}_{version}_SHA256SUMS
//! GET {upstream}/{product}/{version}/{product}_{version}_SHA256SUMS.{key_id}.sig
//! ```
//!
//! The index for Terraform is several megabytes, so it is decoded straight
//! from the response stream one version entry at a time.

use std::{collections::HashSet, fmt, io::Read};

use serde::{
    de::{DeserializeSeed, IgnoredAny, MapAccess, Visitor},
    Deserialize, Deserializer,
};
use serde_json::value::RawValue;
use tracing::{debug, warn};

use crate::{
    cancel::{CancellableReader, CancellationToken},
    error::{Result, UpstreamError},
    http,
    http_client::{ClientConfig, HttpClients},
    traits::ReleaseSource,
    types::{dedup_builds, BuildArtifact, ChecksumsFile, DownloadedBinary, EmptyReleasePolicy, VersionInfo},
};

pub const DEFAULT_PRODUCT: &str = "terraform";
/// Key-ID suffix HashiCorp uses for its `SHA256SUMS` signatures.
pub const DEFAULT_SIGNATURE_KEY_ID: &str = "72D7468F";

pub const CHECKSUMS_LIMIT: u64 = 1024 * 1024;
pub const SIGNATURE_LIMIT: u64 = 64 * 1024;

#[derive(Clone)]
pub struct ReleaseIndexClient {
    upstream_url: String,
    product: String,
    signature_key_id: String,
    empty_releases: EmptyReleasePolicy,
    clients: HttpClients,
}

impl ReleaseIndexClient {
    /// Creates a client for `upstream_url`. An empty `product` means `terraform`.
    pub fn new(upstream_url: &str, product: &str) -> Self {
        Self::with_config(upstream_url, product, &ClientConfig::default())
    }

    pub fn with_config(upstream_url: &str, product: &str, config: &ClientConfig) -> Self {
        let product = if product.is_empty() {
            DEFAULT_PRODUCT
        } else {
            product
        };

        Self {
            upstream_url: upstream_url.trim_end_matches('/').to_string(),
            product: product.to_string(),
            signature_key_id: DEFAULT_SIGNATURE_KEY_ID.to_string(),
            empty_releases: EmptyReleasePolicy::Keep,
            clients: HttpClients::new(config),
        }
    }

    pub fn signature_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.signature_key_id = key_id.into();
        self
    }

    pub fn empty_releases(mut self, policy: EmptyReleasePolicy) -> Self {
        self.empty_releases = policy;
        self
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    fn product_base(&self) -> String {
        format!("{}/{}", self.upstream_url, self.product)
    }

    pub fn index_url(&self) -> String {
        format!("{}/index.json", self.product_base())
    }

    pub fn checksums_url(&self, version: &str) -> String {
        format!(
            "{}/{version}/{}_{version}_SHA256SUMS",
            self.product_base(),
            self.product
        )
    }

    pub fn signature_url(&self, version: &str) -> String {
        format!(
            "{}.{}.sig",
            self.checksums_url(version),
            self.signature_key_id
        )
    }
}

impl ReleaseSource for ReleaseIndexClient {
    fn list_versions(&self, cancel: &CancellationToken) -> Result<Vec<VersionInfo>> {
        let url = self.index_url();
        let owned_url = url.clone();
        let product_base = self.product_base();
        let empty_releases = self.empty_releases;

        let versions = http::exchange(
            &self.clients.metadata,
            cancel,
            &url,
            &[],
            move |cancel, resp| {
                let resp = http::ensure_success(resp, &owned_url)?;
                let reader = CancellableReader::new(resp.into_body().into_reader(), cancel);
                parse_index(reader, &product_base, empty_releases).map_err(|source| {
                    if cancel.is_cancelled() {
                        UpstreamError::Cancelled
                    } else if source.is_io() {
                        UpstreamError::Io(source.into())
                    } else {
                        UpstreamError::MalformedIndex {
                            url: owned_url.clone(),
                            source,
                        }
                    }
                })
            },
        )?;

        debug!("{} versions listed from {url}", versions.len());
        Ok(versions)
    }

    fn fetch_checksums(&self, cancel: &CancellationToken, version: &str) -> Result<ChecksumsFile> {
        let url = self.checksums_url(version);
        let raw = http::fetch_capped(&self.clients.metadata, cancel, &url, &[], CHECKSUMS_LIMIT)?;
        Ok(ChecksumsFile::parse(raw))
    }

    fn fetch_signature(&self, cancel: &CancellationToken, version: &str) -> Result<Vec<u8>> {
        let url = self.signature_url(version);
        http::fetch_capped(&self.clients.metadata, cancel, &url, &[], SIGNATURE_LIMIT)
    }

    fn download_binary(&self, cancel: &CancellationToken, url: &str) -> Result<DownloadedBinary> {
        http::fetch_binary(&self.clients.download, cancel, url, &[])
    }
}

#[derive(Deserialize)]
struct IndexVersion {
    #[serde(default)]
    version: String,
    #[serde(default)]
    shasums: String,
    #[serde(default)]
    shasums_signature: String,
    #[serde(default)]
    shasums_signatures: Vec<String>,
    #[serde(default)]
    builds: Vec<IndexBuild>,
}

#[derive(Deserialize)]
struct IndexBuild {
    #[serde(default)]
    os: String,
    #[serde(default)]
    arch: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    url: String,
}

impl IndexVersion {
    fn normalize(self, key: &str, product_base: &str) -> VersionInfo {
        let resolve = |value: &str| -> Option<String> {
            if value.is_empty() {
                None
            } else if value.starts_with("http") {
                Some(value.to_string())
            } else {
                Some(format!("{product_base}/{key}/{value}"))
            }
        };

        let builds = self
            .builds
            .into_iter()
            .filter(|b| {
                let complete = !(b.os.is_empty()
                    || b.arch.is_empty()
                    || b.filename.is_empty()
                    || b.url.is_empty());
                if !complete {
                    warn!("skipping incomplete build {:?} in version {key}", b.filename);
                }
                complete
            })
            .map(|b| {
                BuildArtifact {
                    os: b.os,
                    arch: b.arch,
                    filename: b.filename,
                    download_url: b.url,
                }
            })
            .collect();

        VersionInfo {
            version: if self.version.is_empty() {
                key.to_string()
            } else {
                self.version
            },
            shasums_url: resolve(&self.shasums),
            shasums_signature_url: resolve(&self.shasums_signature),
            shasums_signatures: self
                .shasums_signatures
                .iter()
                .filter_map(|s| resolve(s))
                .collect(),
            builds: dedup_builds(builds),
        }
    }
}

/// Stream-decodes a release index.
///
/// Top-level keys other than `versions` are skipped without being
/// materialized. Each version entry is captured as raw JSON and decoded on its
/// own, so a malformed entry is logged and skipped instead of failing the whole
/// listing. Only a document that is not a JSON object is an error.
pub fn parse_index<R: Read>(
    reader: R,
    product_base: &str,
    policy: EmptyReleasePolicy,
) -> std::result::Result<Vec<VersionInfo>, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    de.deserialize_map(IndexVisitor {
        product_base,
        policy,
    })
}

struct IndexVisitor<'a> {
    product_base: &'a str,
    policy: EmptyReleasePolicy,
}

impl<'de> Visitor<'de> for IndexVisitor<'_> {
    type Value = Vec<VersionInfo>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a release index object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut versions = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            if key == "versions" {
                versions.extend(map.next_value_seed(VersionsSeed {
                    product_base: self.product_base,
                    policy: self.policy,
                })?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(versions)
    }
}

struct VersionsSeed<'a> {
    product_base: &'a str,
    policy: EmptyReleasePolicy,
}

impl<'de> DeserializeSeed<'de> for VersionsSeed<'_> {
    type Value = Vec<VersionInfo>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for VersionsSeed<'_> {
    type Value = Vec<VersionInfo>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of versions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut versions = Vec::new();
        let mut seen = HashSet::new();

        while let Some(key) = map.next_key::<String>()? {
            let raw: Box<RawValue> = map.next_value()?;
            let entry = match serde_json::from_str::<IndexVersion>(raw.get()) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping malformed index entry {key}: {err}");
                    continue;
                }
            };

            let info = entry.normalize(&key, self.product_base);
            if !seen.insert(info.version.clone()) {
                warn!("skipping duplicate index entry {key}");
                continue;
            }
            if self.policy.retains(&info) {
                versions.push(info);
            } else {
                debug!("dropping version {} without builds", info.version);
            }
        }

        Ok(versions)
    }
}
