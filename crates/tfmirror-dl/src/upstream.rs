use tracing::debug;

use crate::{
    cancel::CancellationToken,
    error::Result,
    github::GithubReleaseClient,
    http_client::ClientConfig,
    release_index::ReleaseIndexClient,
    traits::ReleaseSource,
    types::{ChecksumsFile, DownloadedBinary, EmptyReleasePolicy, VersionInfo},
    utils::parse_http_url,
};

/// Which release protocol an upstream URL speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    ReleaseIndex,
    GithubReleases,
}

impl UpstreamKind {
    /// Any URL mentioning `github.com` is served through the GitHub Releases API.
    pub fn parse(upstream_url: &str) -> Self {
        if upstream_url
            .trim_end_matches('/')
            .to_ascii_lowercase()
            .contains("github.com")
        {
            Self::GithubReleases
        } else {
            Self::ReleaseIndex
        }
    }
}

/// Asset filename prefix a product publishes on GitHub.
///
/// OpenTofu ships `tofu_*` archives even though the product is `opentofu`.
pub fn github_binary_prefix(product: &str) -> &str {
    if product.eq_ignore_ascii_case("opentofu") {
        "tofu"
    } else {
        product
    }
}

/// Per-upstream knobs layered on top of [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct UpstreamOptions {
    pub signature_key_id: Option<String>,
    /// Overrides the client's own default when set.
    pub empty_releases: Option<EmptyReleasePolicy>,
    pub github_token: Option<String>,
    pub github_api_base: Option<String>,
}

/// A release client picked once from the upstream URL.
#[derive(Clone)]
pub enum ReleaseClient {
    Index(ReleaseIndexClient),
    Github(GithubReleaseClient),
}

impl ReleaseClient {
    pub fn new(
        upstream_url: &str,
        product: &str,
        config: &ClientConfig,
        options: &UpstreamOptions,
    ) -> Result<Self> {
        parse_http_url(upstream_url)?;

        let client = match UpstreamKind::parse(upstream_url) {
            UpstreamKind::GithubReleases => {
                let mut client = GithubReleaseClient::with_config(
                    upstream_url,
                    github_binary_prefix(product),
                    config,
                )?;
                if let Some(token) = &options.github_token {
                    client = client.token(token.clone());
                }
                if let Some(api_base) = &options.github_api_base {
                    client = client.api_base(api_base.clone());
                }
                if let Some(policy) = options.empty_releases {
                    client = client.empty_releases(policy);
                }
                Self::Github(client)
            }
            UpstreamKind::ReleaseIndex => {
                let mut client = ReleaseIndexClient::with_config(upstream_url, product, config);
                if let Some(key_id) = &options.signature_key_id {
                    client = client.signature_key_id(key_id.clone());
                }
                if let Some(policy) = options.empty_releases {
                    client = client.empty_releases(policy);
                }
                Self::Index(client)
            }
        };

        debug!("using {:?} client for {upstream_url}", client.kind());
        Ok(client)
    }

    pub fn kind(&self) -> UpstreamKind {
        match self {
            Self::Index(_) => UpstreamKind::ReleaseIndex,
            Self::Github(_) => UpstreamKind::GithubReleases,
        }
    }

    /// The product name assets are matched against.
    pub fn product(&self) -> &str {
        match self {
            Self::Index(c) => c.product(),
            Self::Github(c) => c.product(),
        }
    }

    fn source(&self) -> &dyn ReleaseSource {
        match self {
            Self::Index(c) => c,
            Self::Github(c) => c,
        }
    }
}

impl ReleaseSource for ReleaseClient {
    fn list_versions(&self, cancel: &CancellationToken) -> Result<Vec<VersionInfo>> {
        self.source().list_versions(cancel)
    }

    fn fetch_checksums(&self, cancel: &CancellationToken, version: &str) -> Result<ChecksumsFile> {
        self.source().fetch_checksums(cancel, version)
    }

    fn fetch_signature(&self, cancel: &CancellationToken, version: &str) -> Result<Vec<u8>> {
        self.source().fetch_signature(cancel, version)
    }

    fn download_binary(&self, cancel: &CancellationToken, url: &str) -> Result<DownloadedBinary> {
        self.source().download_binary(cancel, url)
    }
}
