use std::time::Duration;

use tracing::{debug, warn};
use ureq::Agent;

use crate::{
    cancel::CancellationToken,
    error::{Result, UpstreamError},
    http,
    http_client::DEFAULT_RETRY_BACKOFF,
    types::DownloadedBinary,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Bounded-retry binary fetcher.
///
/// Every failure except cancellation is retried, up to `max_attempts` in total,
/// sleeping `backoff * 2^attempt` between attempts (2s then 4s with the default
/// one second base). The backoff wait wakes up as soon as the token is cancelled.
#[derive(Clone)]
pub struct ResilientDownloader {
    agent: Agent,
    backoff: Duration,
    max_attempts: u32,
}

impl ResilientDownloader {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            backoff: DEFAULT_RETRY_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the total number of attempts. Values below one are treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the failed attempt number `attempt` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tfmirror_dl::{download::ResilientDownloader, http_client::HttpClients};
    ///
    /// let dl = ResilientDownloader::new(HttpClients::default().download);
    /// assert_eq!(dl.backoff_for(1), Duration::from_secs(2));
    /// assert_eq!(dl.backoff_for(2), Duration::from_secs(4));
    /// ```
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, the attempts are exhausted or `cancel` fires.
    ///
    /// A cancelled attempt is reported as [`UpstreamError::Cancelled`] right
    /// away and never counts against the attempt budget.
    pub fn retry<T, F>(&self, cancel: &CancellationToken, url: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&CancellationToken) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            cancel.check()?;

            let err = match op(cancel) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if err.is_cancelled() || cancel.is_cancelled() {
                return Err(UpstreamError::Cancelled);
            }

            if attempt >= self.max_attempts {
                return Err(UpstreamError::RetriesExhausted {
                    attempts: attempt,
                    url: url.to_string(),
                    source: Box::new(err),
                });
            }

            let delay = self.backoff_for(attempt);
            warn!(
                "attempt {attempt}/{} for {url} failed: {err}; retrying in {delay:?}",
                self.max_attempts
            );
            if cancel.wait_timeout(delay) {
                debug!("retry backoff for {url} cancelled");
                return Err(UpstreamError::Cancelled);
            }
            attempt += 1;
        }
    }

    /// Downloads `url`, hashing the body while it streams, with retries.
    pub fn download(&self, cancel: &CancellationToken, url: &str) -> Result<DownloadedBinary> {
        self.retry(cancel, url, |cancel| {
            http::fetch_binary(&self.agent, cancel, url, &[])
        })
    }
}
