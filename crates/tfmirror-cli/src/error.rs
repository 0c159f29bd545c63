use miette::Diagnostic;
use tfmirror_config::ConfigError;
use tfmirror_dl::UpstreamError;
use tfmirror_utils::error::HashError;
use tfmirror_verify::{ArchiveError, VerifyError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    #[diagnostic(code(tfmirror::hash))]
    Hash(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(code(tfmirror::json))]
    Json(#[from] serde_json::Error),

    #[error("Error while {action}")]
    #[diagnostic(code(tfmirror::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Version {version} not found on {upstream}")]
    #[diagnostic(
        code(tfmirror::version_not_found),
        help("Run `tfmirror versions {}` to see what is published", .upstream)
    )]
    VersionNotFound { upstream: String, version: String },

    #[error("Version {version} has no build for {platform}")]
    #[diagnostic(
        code(tfmirror::no_matching_builds),
        help("Check the --os and --arch filters")
    )]
    NoMatchingBuilds { version: String, platform: String },

    #[error("No checksum listed for {filename}")]
    #[diagnostic(
        code(tfmirror::missing_checksum),
        help("The SHA256SUMS file does not cover this artifact; refusing to write it unverified")
    )]
    MissingChecksum { filename: String },

    #[error("No trusted signing keys for {upstream}")]
    #[diagnostic(
        code(tfmirror::no_trusted_keys),
        help("Pass --key, add `keys` to the upstream in your config, or use --skip-signature")
    )]
    NoTrustedKeys { upstream: String },

    #[error("Refusing to write artifact with unsafe filename `{0}`")]
    #[diagnostic(code(tfmirror::unsafe_filename))]
    UnsafeFilename(String),

    #[error("Invalid provider address `{0}`")]
    #[diagnostic(
        code(tfmirror::invalid_provider),
        help("Use NAMESPACE/TYPE, e.g. hashicorp/aws")
    )]
    InvalidProvider(String),

    #[error("Registry checksum for {filename} does not match its SHA256SUMS entry")]
    #[diagnostic(
        code(tfmirror::registry_checksum),
        help("The registry metadata and the signed checksum file disagree; do not trust this package")
    )]
    RegistryChecksumMismatch { filename: String },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            CliError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
