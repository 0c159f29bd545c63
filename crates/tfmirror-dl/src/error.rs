use miette::Diagnostic;
use thiserror::Error;
pub use tfmirror_utils::error::ErrorKind;

#[derive(Error, Diagnostic, Debug)]
pub enum UpstreamError {
    #[error("Invalid URL `{url}`: {reason}")]
    #[diagnostic(
        code(tfmirror_dl::invalid_url),
        help("Use an absolute http(s) URL, e.g. https://releases.hashicorp.com")
    )]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported upstream: {0}")]
    #[diagnostic(code(tfmirror_dl::unsupported_upstream))]
    UnsupportedUpstream(String),

    #[error(transparent)]
    #[diagnostic(
        code(tfmirror_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}{}", body_suffix(.body))]
    #[diagnostic(code(tfmirror_dl::http_error))]
    HttpError {
        status: u16,
        url: String,
        body: String,
    },

    #[error("I/O error: {0}")]
    #[diagnostic(code(tfmirror_dl::io))]
    Io(#[from] std::io::Error),

    #[error("Invalid response from {url}: {source}")]
    #[diagnostic(code(tfmirror_dl::invalid_response))]
    InvalidResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Release index at {url} is not valid JSON: {source}")]
    #[diagnostic(
        code(tfmirror_dl::malformed_index),
        help("The upstream should serve an index.json object with a `versions` map")
    )]
    MalformedIndex {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response from {url} exceeds the {limit} byte limit")]
    #[diagnostic(code(tfmirror_dl::response_too_large))]
    ResponseTooLarge { url: String, limit: u64 },

    #[error("No {asset} asset found for version {version} in {repo}")]
    #[diagnostic(
        code(tfmirror_dl::asset_not_found),
        help("Check that the release exists and publishes a {} file", .asset)
    )]
    AssetNotFound {
        asset: &'static str,
        version: String,
        repo: String,
    },

    #[error("Operation cancelled")]
    #[diagnostic(code(tfmirror_dl::cancelled))]
    Cancelled,

    #[error("Download failed after {attempts} attempts: {source}")]
    #[diagnostic(code(tfmirror_dl::retries_exhausted))]
    RetriesExhausted {
        attempts: u32,
        url: String,
        #[source]
        source: Box<UpstreamError>,
    },
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl From<ureq::Error> for UpstreamError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

impl UpstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::HttpError { .. } | Self::Io(_) | Self::AssetNotFound { .. } => {
                ErrorKind::Transport
            }
            Self::InvalidUrl { .. }
            | Self::UnsupportedUpstream(_)
            | Self::InvalidResponse { .. }
            | Self::MalformedIndex { .. }
            | Self::ResponseTooLarge { .. } => ErrorKind::Format,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = UpstreamError::HttpError {
            status: 404,
            url: "https://example.com/missing".to_string(),
            body: String::new(),
        };
        assert_eq!(err.to_string(), "HTTP 404: https://example.com/missing");

        let err = UpstreamError::HttpError {
            status: 500,
            url: "https://example.com/index.json".to_string(),
            body: "upstream exploded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 500: https://example.com/index.json: upstream exploded"
        );
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_retries_exhausted_wraps_last_cause() {
        let err = UpstreamError::RetriesExhausted {
            attempts: 3,
            url: "https://example.com/a.zip".to_string(),
            source: Box::new(UpstreamError::HttpError {
                status: 503,
                url: "https://example.com/a.zip".to_string(),
                body: String::new(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("HTTP 503"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_asset_not_found_display() {
        let err = UpstreamError::AssetNotFound {
            asset: "SHA256SUMS",
            version: "1.6.0".to_string(),
            repo: "opentofu/opentofu".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No SHA256SUMS asset found for version 1.6.0 in opentofu/opentofu"
        );
    }

    #[test]
    fn test_from_ureq_error() {
        let err: UpstreamError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(err, UpstreamError::Network(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(UpstreamError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(UpstreamError::Cancelled.is_cancelled());
        assert_eq!(
            UpstreamError::ResponseTooLarge {
                url: "u".into(),
                limit: 1
            }
            .kind(),
            ErrorKind::Format
        );
    }
}
