use std::time::Duration;

use ureq::Agent;

pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Settings shared by every upstream client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    /// Global timeout for index, checksum, signature and API calls.
    pub metadata_timeout: Duration,
    /// Global timeout for binary downloads.
    pub download_timeout: Duration,
    /// Base delay of the download retry backoff.
    pub retry_backoff: Duration,
}

impl Default for ClientConfig {
    /// A 30 second metadata timeout, a 10 minute download timeout and a
    /// `tfmirror/<version>` user agent.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tfmirror_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert_eq!(cfg.metadata_timeout, Duration::from_secs(30));
    /// assert_eq!(cfg.download_timeout, Duration::from_secs(600));
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some(concat!("tfmirror/", env!("CARGO_PKG_VERSION")).into()),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl ClientConfig {
    /// Builds an agent with the given global timeout.
    ///
    /// Non-2xx statuses are returned as responses rather than errors so the
    /// caller can capture a body excerpt for diagnostics.
    pub fn build(&self, timeout: Duration) -> Agent {
        let mut config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

/// The two agents every client carries: a fast-failing one for metadata and a
/// patient one for large binary downloads.
#[derive(Clone)]
pub struct HttpClients {
    pub metadata: Agent,
    pub download: Agent,
}

impl HttpClients {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            metadata: config.build(config.metadata_timeout),
            download: config.build(config.download_timeout),
        }
    }
}

impl Default for HttpClients {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config
            .user_agent
            .as_deref()
            .is_some_and(|ua| ua.starts_with("tfmirror/")));
        assert_eq!(config.metadata_timeout, DEFAULT_METADATA_TIMEOUT);
        assert_eq!(config.download_timeout, DEFAULT_DOWNLOAD_TIMEOUT);
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_http_clients_build() {
        let config = ClientConfig {
            user_agent: None,
            metadata_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(10),
        };
        let clients = HttpClients::new(&config);
        let _ = clients.metadata.get("https://example.com");
        let _ = clients.download.get("https://example.com");
    }
}
