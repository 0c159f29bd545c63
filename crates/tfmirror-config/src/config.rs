use std::{collections::HashSet, fs, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tfmirror_utils::{
    bytes::parse_bytes,
    path::{expand_tilde, xdg_config_home},
    time::parse_duration,
};
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, Result};

pub const DEFAULT_METADATA_TIMEOUT: &str = "30s";
pub const DEFAULT_DOWNLOAD_TIMEOUT: &str = "10m";
pub const DEFAULT_MAX_ARCHIVE_SIZE: &str = "100MiB";
pub const DEFAULT_RETRY_BACKOFF: &str = "1s";
pub const DEFAULT_PRODUCT: &str = "terraform";

/// Application configuration, read from `config.toml`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// User-Agent sent with every upstream request.
    /// Default: tfmirror/<version>
    pub user_agent: Option<String>,

    /// Timeout for index, checksum, signature and API requests.
    /// Default: 30s
    pub metadata_timeout: Option<String>,

    /// Timeout for binary downloads.
    /// Default: 10m
    pub download_timeout: Option<String>,

    /// Cap on the decompressed size of validated archives.
    /// Default: 100MiB
    pub max_archive_size: Option<String>,

    /// Base delay of the download retry backoff. Attempt `n` waits `base * 2^n`.
    /// Default: 1s
    pub retry_backoff: Option<String>,

    /// Token for the GitHub Releases API. Falls back to `GITHUB_TOKEN` / `GH_TOKEN`.
    pub github_token: Option<String>,

    /// Base URL of the GitHub API, for GitHub Enterprise.
    /// Default: https://api.github.com
    pub github_api_url: Option<String>,

    /// Release upstreams (release-index servers or GitHub repositories).
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,

    /// Provider registries speaking the registry protocol.
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,
}

/// What to do with a version that ends up with no usable builds.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmptyReleases {
    Keep,
    Drop,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct UpstreamConfig {
    /// Unique name used on the command line.
    pub name: String,

    /// Release server base URL or GitHub repository URL.
    pub url: String,

    /// Product name: `terraform`, `opentofu`, or a custom binary prefix.
    /// Default: terraform
    pub product: Option<String>,

    /// Key-ID suffix of the detached signature file (`..._SHA256SUMS.<id>.sig`).
    /// Default: 72D7468F
    pub signature_key_id: Option<String>,

    /// Paths to additional ASCII-armored public keys.
    #[serde(default)]
    pub keys: Vec<String>,

    /// Whether the bundled HashiCorp/OpenTofu key is trusted for this upstream.
    /// Default: true
    pub use_default_keys: Option<bool>,

    /// Overrides the per-upstream default for versions without builds.
    pub empty_releases: Option<EmptyReleases>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RegistryConfig {
    pub name: String,
    pub url: String,
}

/// Location of the configuration file: `$TFMIRROR_CONFIG`, else
/// `$XDG_CONFIG_HOME/tfmirror/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("TFMIRROR_CONFIG") {
        Ok(path) if !path.is_empty() => expand_tilde(&path),
        _ => xdg_config_home().join("tfmirror").join("config.toml"),
    }
}

impl Config {
    /// Built-in upstreams and registries for HashiCorp Terraform and OpenTofu.
    pub fn default_config() -> Self {
        Self {
            upstreams: vec![
                UpstreamConfig::new("terraform", "https://releases.hashicorp.com", "terraform"),
                UpstreamConfig::new(
                    "opentofu",
                    "https://github.com/opentofu/opentofu",
                    "opentofu",
                ),
            ],
            registries: vec![
                RegistryConfig {
                    name: "terraform".into(),
                    url: "https://registry.terraform.io".into(),
                },
                RegistryConfig {
                    name: "opentofu".into(),
                    url: "https://registry.opentofu.org".into(),
                },
            ],
            ..Self::default()
        }
    }

    /// Loads the configuration from [`config_path`], or the built-in default if the
    /// file does not exist.
    pub fn new() -> Result<Self> {
        Self::load(config_path())
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("loading config from {}", path.display());
                let config: Config = toml::from_str(&content)?;
                if config.upstreams.is_empty() && config.registries.is_empty() {
                    Config {
                        upstreams: Self::default_config().upstreams,
                        registries: Self::default_config().registries,
                        ..config
                    }
                } else {
                    config
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Self::default_config()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata_timeout()?;
        self.download_timeout()?;
        self.retry_backoff()?;
        self.max_archive_size()?;

        if let Some(api) = &self.github_api_url {
            validate_http_url("github_api_url", api)?;
        }

        let mut seen = HashSet::new();
        for upstream in &self.upstreams {
            if upstream.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(upstream.name.as_str()) {
                return Err(ConfigError::DuplicateUpstreamName(upstream.name.clone()));
            }
            validate_http_url(&upstream.name, &upstream.url)?;
        }

        let mut seen = HashSet::new();
        for registry in &self.registries {
            if registry.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(registry.name.as_str()) {
                return Err(ConfigError::DuplicateRegistryName(registry.name.clone()));
            }
            validate_http_url(&registry.name, &registry.url)?;
        }

        Ok(())
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("tfmirror/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn metadata_timeout(&self) -> Result<Duration> {
        duration_field(
            "metadata_timeout",
            self.metadata_timeout.as_deref(),
            DEFAULT_METADATA_TIMEOUT,
        )
    }

    pub fn download_timeout(&self) -> Result<Duration> {
        duration_field(
            "download_timeout",
            self.download_timeout.as_deref(),
            DEFAULT_DOWNLOAD_TIMEOUT,
        )
    }

    pub fn retry_backoff(&self) -> Result<Duration> {
        duration_field(
            "retry_backoff",
            self.retry_backoff.as_deref(),
            DEFAULT_RETRY_BACKOFF,
        )
    }

    pub fn max_archive_size(&self) -> Result<u64> {
        let value = self
            .max_archive_size
            .as_deref()
            .unwrap_or(DEFAULT_MAX_ARCHIVE_SIZE);
        parse_bytes(value).map_err(|source| {
            ConfigError::InvalidSize {
                field: "max_archive_size",
                source,
            }
        })
    }

    pub fn get_upstream(&self, name: &str) -> Result<&UpstreamConfig> {
        self.upstreams
            .iter()
            .find(|upstream| upstream.name == name)
            .ok_or_else(|| ConfigError::UnknownUpstream(name.to_string()))
    }

    pub fn get_registry(&self, name: &str) -> Result<&RegistryConfig> {
        self.registries
            .iter()
            .find(|registry| registry.name == name)
            .ok_or_else(|| ConfigError::UnknownRegistry(name.to_string()))
    }
}

impl UpstreamConfig {
    pub fn new(name: &str, url: &str, product: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            product: Some(product.to_string()),
            signature_key_id: None,
            keys: Vec::new(),
            use_default_keys: None,
            empty_releases: None,
        }
    }

    pub fn product(&self) -> &str {
        self.product
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PRODUCT)
    }

    pub fn use_default_keys(&self) -> bool {
        self.use_default_keys.unwrap_or(true)
    }

    pub fn key_paths(&self) -> Vec<PathBuf> {
        self.keys.iter().map(|key| expand_tilde(key)).collect()
    }
}

fn duration_field(field: &'static str, value: Option<&str>, default: &str) -> Result<Duration> {
    parse_duration(value.unwrap_or(default))
        .map_err(|source| ConfigError::InvalidDuration { field, source })
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let invalid = |reason: &str| {
        ConfigError::InvalidUrl {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    };

    let url = Url::parse(value).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if !url.host_str().is_some_and(|host| !host.is_empty()) {
        return Err(invalid("missing host"));
    }
    Ok(())
}
