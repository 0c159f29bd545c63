//! Builds upstream clients from the loaded configuration.

use std::path::PathBuf;

use tfmirror_config::{Config, EmptyReleases, RegistryConfig, UpstreamConfig};
use tfmirror_dl::{
    registry::validate_registry_url, types::EmptyReleasePolicy, CancellationToken, ClientConfig,
    ReleaseClient, ResilientDownloader, UpstreamOptions, UpstreamRegistryClient,
};
use tfmirror_verify::TrustAnchor;
use tracing::debug;

use crate::{
    error::CliResult,
    utils::{is_url, read_keys},
};

pub struct AppContext {
    config: Config,
    client_config: ClientConfig,
    max_archive_size: u64,
    cancel: CancellationToken,
}

impl AppContext {
    pub fn new(config: Config) -> CliResult<Self> {
        let client_config = ClientConfig {
            user_agent: Some(config.user_agent()),
            metadata_timeout: config.metadata_timeout()?,
            download_timeout: config.download_timeout()?,
            retry_backoff: config.retry_backoff()?,
        };
        let max_archive_size = config.max_archive_size()?;

        Ok(Self {
            config,
            client_config,
            max_archive_size,
            cancel: CancellationToken::new(),
        })
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn max_archive_size(&self) -> u64 {
        self.max_archive_size
    }

    /// Looks `upstream` up by name, falling back to treating it as a URL.
    ///
    /// `product` overrides whatever the configuration says.
    pub fn resolve_upstream(
        &self,
        upstream: &str,
        product: Option<&str>,
    ) -> CliResult<UpstreamConfig> {
        let mut resolved = match self.config.get_upstream(upstream) {
            Ok(found) => found.clone(),
            Err(_) if is_url(upstream) => {
                UpstreamConfig {
                    product: None,
                    ..UpstreamConfig::new(upstream, upstream, "")
                }
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(product) = product {
            resolved.product = Some(product.to_string());
        }
        Ok(resolved)
    }

    pub fn resolve_registry(&self, registry: &str) -> CliResult<RegistryConfig> {
        match self.config.get_registry(registry) {
            Ok(found) => Ok(found.clone()),
            Err(_) if is_url(registry) => {
                Ok(RegistryConfig {
                    name: registry.to_string(),
                    url: registry.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn upstream_options(&self, upstream: &UpstreamConfig) -> UpstreamOptions {
        UpstreamOptions {
            signature_key_id: upstream.signature_key_id.clone(),
            empty_releases: upstream.empty_releases.map(empty_release_policy),
            github_token: self.config.github_token.clone(),
            github_api_base: self.config.github_api_url.clone(),
        }
    }

    /// An unset product is left to the client: `terraform` for release
    /// indexes, the repository name for GitHub.
    pub fn release_client(&self, upstream: &UpstreamConfig) -> CliResult<ReleaseClient> {
        let product = upstream.product.as_deref().unwrap_or_default();
        let client = ReleaseClient::new(
            &upstream.url,
            product,
            &self.client_config,
            &self.upstream_options(upstream),
        )?;
        Ok(client)
    }

    pub fn registry_client(&self, registry: &RegistryConfig) -> CliResult<UpstreamRegistryClient> {
        validate_registry_url(&registry.url)?;
        Ok(UpstreamRegistryClient::with_config(
            &registry.url,
            &self.client_config,
        ))
    }

    pub fn downloader(&self) -> ResilientDownloader {
        let agent = self.client_config.build(self.client_config.download_timeout);
        ResilientDownloader::new(agent).with_backoff(self.client_config.retry_backoff)
    }

    /// Keys trusted for `upstream`: its configured key files, the extra files
    /// given on the command line and, unless disabled, the bundled vendor key
    /// for `product`.
    pub fn trusted_keys(
        &self,
        upstream: &UpstreamConfig,
        product: &str,
        extra: &[PathBuf],
    ) -> CliResult<Vec<String>> {
        let mut paths = upstream.key_paths();
        paths.extend_from_slice(extra);
        let mut keys = read_keys(&paths)?;

        if upstream.use_default_keys() {
            match TrustAnchor::for_product(product) {
                Some(anchor) => {
                    match anchor.armored() {
                        Some(key) => keys.push(key.to_string()),
                        None => debug!("no bundled {} key available", anchor.name()),
                    }
                }
                None => debug!("no bundled key for product {product}"),
            }
        }

        Ok(keys)
    }
}

fn empty_release_policy(setting: EmptyReleases) -> EmptyReleasePolicy {
    match setting {
        EmptyReleases::Keep => EmptyReleasePolicy::Keep,
        EmptyReleases::Drop => EmptyReleasePolicy::Drop,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use tfmirror_config::ConfigError;
    use tfmirror_dl::UpstreamKind;

    use super::*;
    use crate::error::CliError;

    fn context() -> AppContext {
        AppContext::new(Config::default_config()).unwrap()
    }

    #[test]
    fn test_new_reads_limits_from_config() {
        let config = Config {
            max_archive_size: Some("1MiB".into()),
            ..Config::default_config()
        };
        let ctx = AppContext::new(config).unwrap();
        assert_eq!(ctx.max_archive_size(), 1024 * 1024);
        assert!(!ctx.cancel().is_cancelled());
    }

    #[test]
    fn test_resolve_upstream_by_name_and_url() {
        let ctx = context();

        let terraform = ctx.resolve_upstream("terraform", None).unwrap();
        assert_eq!(terraform.url, "https://releases.hashicorp.com");
        assert_eq!(terraform.product.as_deref(), Some("terraform"));

        let by_url = ctx
            .resolve_upstream("https://mirror.example.com", Some("opentofu"))
            .unwrap();
        assert_eq!(by_url.url, "https://mirror.example.com");
        assert_eq!(by_url.product.as_deref(), Some("opentofu"));

        let bare_url = ctx.resolve_upstream("https://mirror.example.com", None).unwrap();
        assert_eq!(bare_url.product, None);
    }

    #[test]
    fn test_resolve_unknown_upstream() {
        let err = context().resolve_upstream("nope", None).unwrap_err();
        assert!(matches!(
            err,
            CliError::Config(ConfigError::UnknownUpstream(ref name)) if name == "nope"
        ));
    }

    #[test]
    fn test_resolve_registry() {
        let ctx = context();
        assert_eq!(
            ctx.resolve_registry("opentofu").unwrap().url,
            "https://registry.opentofu.org"
        );
        assert_eq!(
            ctx.resolve_registry("https://registry.example.com").unwrap().url,
            "https://registry.example.com"
        );
        assert!(ctx.resolve_registry("missing").is_err());
    }

    #[test]
    fn test_release_client_kind_follows_url() {
        let ctx = context();

        let terraform = ctx.resolve_upstream("terraform", None).unwrap();
        let client = ctx.release_client(&terraform).unwrap();
        assert_eq!(client.kind(), UpstreamKind::ReleaseIndex);
        assert_eq!(client.product(), "terraform");

        let opentofu = ctx.resolve_upstream("opentofu", None).unwrap();
        let client = ctx.release_client(&opentofu).unwrap();
        assert_eq!(client.kind(), UpstreamKind::GithubReleases);
        assert_eq!(client.product(), "tofu");
    }

    #[test]
    fn test_upstream_options_carry_overrides() {
        let config = Config {
            github_token: Some("secret".into()),
            github_api_url: Some("https://ghe.example.com/api/v3".into()),
            ..Config::default_config()
        };
        let ctx = AppContext::new(config).unwrap();

        let mut upstream = UpstreamConfig::new("custom", "https://mirror.example.com", "terraform");
        upstream.signature_key_id = Some("ABCD1234".into());
        upstream.empty_releases = Some(EmptyReleases::Drop);

        let options = ctx.upstream_options(&upstream);
        assert_eq!(options.signature_key_id.as_deref(), Some("ABCD1234"));
        assert_eq!(options.empty_releases, Some(EmptyReleasePolicy::Drop));
        assert_eq!(options.github_token.as_deref(), Some("secret"));
        assert_eq!(
            options.github_api_base.as_deref(),
            Some("https://ghe.example.com/api/v3")
        );
    }

    #[test]
    fn test_trusted_keys_combines_config_and_cli_keys() {
        let mut configured = NamedTempFile::new().unwrap();
        write!(configured, "configured-key").unwrap();
        let mut extra = NamedTempFile::new().unwrap();
        write!(extra, "cli-key").unwrap();

        let mut upstream = UpstreamConfig::new("custom", "https://mirror.example.com", "custom");
        upstream.keys = vec![configured.path().to_string_lossy().into_owned()];

        let keys = context()
            .trusted_keys(&upstream, "custom", &[extra.path().to_path_buf()])
            .unwrap();
        assert_eq!(keys, vec!["configured-key".to_string(), "cli-key".to_string()]);
    }

    #[test]
    fn test_trusted_keys_skip_placeholder_anchor() {
        let upstream = UpstreamConfig::new("terraform", "https://releases.hashicorp.com", "terraform");
        let keys = context().trusted_keys(&upstream, "terraform", &[]).unwrap();
        assert_eq!(
            keys.len(),
            usize::from(TrustAnchor::HashiCorp.armored().is_some())
        );
    }
}
