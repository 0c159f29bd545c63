use std::{env, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::{
    cancel::CancellationToken,
    error::{Result, UpstreamError},
    http,
    http_client::{ClientConfig, HttpClients},
    release_index::{CHECKSUMS_LIMIT, SIGNATURE_LIMIT},
    traits::ReleaseSource,
    types::{dedup_builds, BuildArtifact, ChecksumsFile, DownloadedBinary, EmptyReleasePolicy, VersionInfo},
    utils::encode_segment,
};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const TOKEN_ENV: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;

const URL_PREFIXES: [&str; 4] = [
    "https://api.github.com/repos/",
    "http://api.github.com/repos/",
    "https://github.com/",
    "http://github.com/",
];

static BINARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_([^_]+)_([^_]+)_([^_]+)\.zip$").expect("unable to compile binary asset regex")
});
static CHECKSUMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_([^_]+)_SHA256SUMS$").expect("unable to compile checksums asset regex")
});
static SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_([^_]+)_SHA256SUMS\..*sig$").expect("unable to compile signature asset regex")
});

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Extracts `(owner, repo)` from a GitHub web or API URL.
///
/// Trailing path segments such as `/releases/tag/v1.0` and a `.git` suffix on
/// the repository are ignored.
///
/// # Examples
///
/// ```
/// use tfmirror_dl::github::parse_owner_repo;
///
/// let (owner, repo) = parse_owner_repo("https://github.com/opentofu/opentofu/releases").unwrap();
/// assert_eq!((owner.as_str(), repo.as_str()), ("opentofu", "opentofu"));
/// ```
pub fn parse_owner_repo(upstream_url: &str) -> Result<(String, String)> {
    let mut rest = upstream_url.trim_end_matches('/');
    for prefix in URL_PREFIXES {
        if rest
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            rest = &rest[prefix.len()..];
            break;
        }
    }

    let mut parts = rest.splitn(3, '/');
    let owner = parts.next().unwrap_or_default();
    let repo = parts.next().unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        return Err(UpstreamError::InvalidUrl {
            url: upstream_url.to_string(),
            reason: "cannot parse GitHub owner/repo".to_string(),
        });
    }

    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    Ok((owner.to_string(), repo.to_string()))
}

/// Reads a GitHub token from the environment, preferring `GITHUB_TOKEN`.
pub fn token_from_env() -> Option<String> {
    TOKEN_ENV
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|token| !token.trim().is_empty())
}

/// Release client for projects that publish through GitHub Releases.
///
/// Assets are matched by filename: `{product}_{version}_{os}_{arch}.zip`
/// binaries, `{product}_{version}_SHA256SUMS` and a detached signature ending
/// in `sig`.
#[derive(Clone)]
pub struct GithubReleaseClient {
    owner: String,
    repo: String,
    product: String,
    api_base: String,
    token: Option<String>,
    empty_releases: EmptyReleasePolicy,
    clients: HttpClients,
}

impl GithubReleaseClient {
    pub fn new(upstream_url: &str, product: &str) -> Result<Self> {
        Self::with_config(upstream_url, product, &ClientConfig::default())
    }

    pub fn with_config(upstream_url: &str, product: &str, config: &ClientConfig) -> Result<Self> {
        let (owner, repo) = parse_owner_repo(upstream_url)?;
        let product = if product.is_empty() {
            repo.clone()
        } else {
            product.to_string()
        };

        Ok(Self {
            owner,
            repo,
            product,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token_from_env(),
            empty_releases: EmptyReleasePolicy::Drop,
            clients: HttpClients::new(config),
        })
    }

    /// Points the client at another API root, e.g. a GitHub Enterprise instance.
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the token found in the environment.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn empty_releases(mut self, policy: EmptyReleasePolicy) -> Self {
        self.empty_releases = policy;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }

    fn api_get<T>(&self, cancel: &CancellationToken, url: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let auth = self.authorization();
        let mut headers = vec![
            ("Accept", "application/vnd.github+json"),
            ("X-GitHub-Api-Version", API_VERSION),
        ];
        if let Some(auth) = &auth {
            headers.push(("Authorization", auth.as_str()));
        }

        http::fetch_json(&self.clients.metadata, cancel, url, &headers)
    }

    fn fetch_page(&self, cancel: &CancellationToken, page: usize) -> Result<Vec<GithubRelease>> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page={PER_PAGE}&page={page}",
            self.api_base, self.owner, self.repo
        );
        self.api_get(cancel, &url)
    }

    fn fetch_release_by_tag(&self, cancel: &CancellationToken, tag: &str) -> Result<GithubRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_base,
            self.owner,
            self.repo,
            encode_segment(tag)
        );
        self.api_get(cancel, &url)
    }

    fn is_product(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.product)
    }

    /// Normalizes one release. Returns `None` when no asset is a binary of this product.
    pub fn parse_release(&self, release: &GithubRelease) -> Option<VersionInfo> {
        let version = release
            .tag_name
            .strip_prefix('v')
            .unwrap_or(&release.tag_name)
            .to_string();

        let mut builds = Vec::new();
        let mut shasums_url = None;
        let mut signature_url = None;

        for asset in &release.assets {
            let name = asset.name.as_str();
            if let Some(caps) = BINARY_RE.captures(name) {
                if self.is_product(&caps[1]) {
                    builds.push(BuildArtifact {
                        os: caps[3].to_string(),
                        arch: caps[4].to_string(),
                        filename: name.to_string(),
                        download_url: asset.browser_download_url.clone(),
                    });
                }
            } else if let Some(caps) = CHECKSUMS_RE.captures(name) {
                if self.is_product(&caps[1]) {
                    shasums_url = Some(asset.browser_download_url.clone());
                }
            } else if let Some(caps) = SIGNATURE_RE.captures(name) {
                if self.is_product(&caps[1]) {
                    signature_url = Some(asset.browser_download_url.clone());
                }
            }
        }

        let info = VersionInfo {
            version,
            shasums_url,
            shasums_signature_url: signature_url,
            shasums_signatures: Vec::new(),
            builds: dedup_builds(builds),
        };
        self.empty_releases.retains(&info).then_some(info)
    }

    /// Resolves the download URL of the asset matching `re` for `version`.
    ///
    /// Tries the tag `v{version}` and then `{version}`. The first tag that
    /// resolves to a release decides; a missing asset there is not retried
    /// against the other tag.
    fn find_asset_url(
        &self,
        cancel: &CancellationToken,
        version: &str,
        re: &Regex,
        asset: &'static str,
    ) -> Result<String> {
        for tag in [format!("v{version}"), version.to_string()] {
            let release = match self.fetch_release_by_tag(cancel, &tag) {
                Ok(release) => release,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    debug!("tag {tag} not usable in {}: {err}", self.slug());
                    continue;
                }
            };

            return release
                .assets
                .iter()
                .find(|a| {
                    re.captures(&a.name)
                        .is_some_and(|caps| self.is_product(&caps[1]))
                })
                .map(|a| a.browser_download_url.clone())
                .ok_or_else(|| self.not_found(asset, version));
        }

        Err(self.not_found(asset, version))
    }

    fn not_found(&self, asset: &'static str, version: &str) -> UpstreamError {
        UpstreamError::AssetNotFound {
            asset,
            version: version.to_string(),
            repo: self.slug(),
        }
    }

    fn fetch_asset(&self, cancel: &CancellationToken, url: &str, limit: u64) -> Result<Vec<u8>> {
        let auth = self.authorization();
        let headers: Vec<(&str, &str)> = auth
            .as_deref()
            .map(|auth| ("Authorization", auth))
            .into_iter()
            .collect();

        http::fetch_capped(&self.clients.metadata, cancel, url, &headers, limit)
    }
}

impl ReleaseSource for GithubReleaseClient {
    fn list_versions(&self, cancel: &CancellationToken) -> Result<Vec<VersionInfo>> {
        let mut versions = Vec::new();
        let mut page = 1;

        loop {
            let releases = self.fetch_page(cancel, page)?;
            debug!("page {page} of {}: {} releases", self.slug(), releases.len());

            versions.extend(
                releases
                    .iter()
                    .filter(|r| !r.draft)
                    .filter_map(|r| self.parse_release(r)),
            );

            if releases.len() < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(versions)
    }

    fn fetch_checksums(&self, cancel: &CancellationToken, version: &str) -> Result<ChecksumsFile> {
        let url = self.find_asset_url(cancel, version, &CHECKSUMS_RE, "SHA256SUMS")?;
        let raw = self.fetch_asset(cancel, &url, CHECKSUMS_LIMIT)?;
        Ok(ChecksumsFile::parse(raw))
    }

    fn fetch_signature(&self, cancel: &CancellationToken, version: &str) -> Result<Vec<u8>> {
        let url = self.find_asset_url(cancel, version, &SIGNATURE_RE, "SHA256SUMS signature")?;
        self.fetch_asset(cancel, &url, SIGNATURE_LIMIT)
    }

    fn download_binary(&self, cancel: &CancellationToken, url: &str) -> Result<DownloadedBinary> {
        http::fetch_binary(&self.clients.download, cancel, url, &[])
    }
}
