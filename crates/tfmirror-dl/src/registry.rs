//! Client for the Terraform Provider Registry Protocol.
//!
//! Service discovery through `/.well-known/terraform.json`, then version
//! enumeration and package lookup relative to the advertised `providers.v1`
//! path. Discovery is repeated for every high-level call.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cancel::CancellationToken,
    download::ResilientDownloader,
    error::{Result, UpstreamError},
    http,
    http_client::{ClientConfig, HttpClients},
    types::DownloadedBinary,
    utils::{encode_segment, parse_http_url},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(rename = "providers.v1", default)]
    pub providers_path: String,
    #[serde(rename = "modules.v1", default)]
    pub modules_path: String,
}

#[derive(Debug, Deserialize)]
struct ProviderVersionsResponse {
    #[serde(default)]
    versions: Vec<ProviderVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVersion {
    pub version: String,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<ProviderPlatform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPlatform {
    pub os: String,
    pub arch: String,
}

/// Download metadata of one provider build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderPackage {
    pub protocols: Vec<String>,
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub download_url: String,
    pub shasums_url: String,
    pub shasums_signature_url: String,
    pub shasum: String,
    pub signing_keys: SigningKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningKeys {
    pub gpg_public_keys: Vec<GpgPublicKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpgPublicKey {
    pub key_id: String,
    pub ascii_armor: String,
    pub trust_signature: String,
    pub source: String,
    pub source_url: String,
}

impl SigningKeys {
    /// The non-blank armored keys, in the order the registry listed them.
    pub fn armored_keys(&self) -> Vec<&str> {
        self.gpg_public_keys
            .iter()
            .map(|k| k.ascii_armor.as_str())
            .filter(|k| !k.trim().is_empty())
            .collect()
    }
}

/// Checks that `url` can be used as a registry base URL.
pub fn validate_registry_url(url: &str) -> Result<()> {
    parse_http_url(url).map(|_| ())
}

#[derive(Clone)]
pub struct UpstreamRegistryClient {
    base_url: String,
    clients: HttpClients,
    downloader: ResilientDownloader,
}

impl UpstreamRegistryClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(base_url, &ClientConfig::default())
    }

    pub fn with_config(base_url: &str, config: &ClientConfig) -> Self {
        let clients = HttpClients::new(config);
        let downloader =
            ResilientDownloader::new(clients.download.clone()).with_backoff(config.retry_backoff);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            clients,
            downloader,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T>(&self, cancel: &CancellationToken, url: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        http::fetch_json(&self.clients.metadata, cancel, url, &[])
    }

    pub fn discover_services(&self, cancel: &CancellationToken) -> Result<DiscoveryDocument> {
        let url = format!("{}/.well-known/terraform.json", self.base_url);
        let doc: DiscoveryDocument = self.get_json(cancel, &url)?;
        debug!("discovered providers.v1 = {:?} at {}", doc.providers_path, self.base_url);
        Ok(doc)
    }

    /// Absolute URL of the providers API, `{base}{providers.v1}` without a trailing `/`.
    fn providers_base(&self, cancel: &CancellationToken) -> Result<String> {
        let doc = self.discover_services(cancel)?;
        let path = doc.providers_path.trim_end_matches('/');

        if path.is_empty() {
            return Err(UpstreamError::UnsupportedUpstream(format!(
                "{} does not advertise providers.v1",
                self.base_url
            )));
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        Ok(format!("{}{}", self.base_url, path))
    }

    /// Lists the published versions of `namespace/type`. An unknown provider is an empty list.
    pub fn list_provider_versions(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        provider_type: &str,
    ) -> Result<Vec<ProviderVersion>> {
        let url = format!(
            "{}/{}/{}/versions",
            self.providers_base(cancel)?,
            encode_segment(namespace),
            encode_segment(provider_type)
        );

        let owned_url = url.clone();
        let body = http::exchange(&self.clients.metadata, cancel, &url, &[], move |cancel, resp| {
            if resp.status().as_u16() == 404 {
                return Ok(None);
            }
            let resp = http::ensure_success(resp, &owned_url)?;
            http::read_json::<ProviderVersionsResponse>(cancel, resp, &owned_url).map(Some)
        })?;

        match body {
            Some(body) => Ok(body.versions),
            None => {
                debug!("provider {namespace}/{provider_type} not found upstream");
                Ok(Vec::new())
            }
        }
    }

    pub fn get_provider_package(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        provider_type: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> Result<ProviderPackage> {
        let url = format!(
            "{}/{}/{}/{}/download/{}/{}",
            self.providers_base(cancel)?,
            encode_segment(namespace),
            encode_segment(provider_type),
            encode_segment(version),
            encode_segment(os),
            encode_segment(arch)
        );
        self.get_json(cancel, &url)
    }

    /// Downloads a provider archive or checksum file with retries.
    pub fn download_file(&self, cancel: &CancellationToken, url: &str) -> Result<DownloadedBinary> {
        self.downloader.download(cancel, url)
    }
}
