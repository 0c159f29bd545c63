use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(tfmirror_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Failed to read config file `{}`: {source}", path.display())]
    #[diagnostic(code(tfmirror_config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upstream or registry name cannot be empty")]
    #[diagnostic(
        code(tfmirror_config::empty_name),
        help("Give every [[upstreams]] and [[registries]] entry a `name`")
    )]
    EmptyName,

    #[error("Duplicate upstream name: {0}")]
    #[diagnostic(
        code(tfmirror_config::duplicate_upstream),
        help("Each upstream must have a unique name")
    )]
    DuplicateUpstreamName(String),

    #[error("Duplicate registry name: {0}")]
    #[diagnostic(
        code(tfmirror_config::duplicate_registry),
        help("Each registry must have a unique name")
    )]
    DuplicateRegistryName(String),

    #[error("Invalid URL for `{name}`: {reason}")]
    #[diagnostic(
        code(tfmirror_config::invalid_url),
        help("URLs must be absolute http(s) URLs with a host, e.g. https://releases.hashicorp.com")
    )]
    InvalidUrl { name: String, reason: String },

    #[error("Invalid duration for `{field}`: {source}")]
    #[diagnostic(
        code(tfmirror_config::invalid_duration),
        help("Use a duration such as `30s`, `10m` or `1h30m`")
    )]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: tfmirror_utils::error::DurationError,
    },

    #[error("Invalid size for `{field}`: {source}")]
    #[diagnostic(
        code(tfmirror_config::invalid_size),
        help("Use a size such as `100MiB` or `512KiB`")
    )]
    InvalidSize {
        field: &'static str,
        #[source]
        source: tfmirror_utils::error::BytesError,
    },

    #[error("Unknown upstream: {0}")]
    #[diagnostic(
        code(tfmirror_config::unknown_upstream),
        help("Add it under [[upstreams]] in your config or pass its URL directly")
    )]
    UnknownUpstream(String),

    #[error("Unknown registry: {0}")]
    #[diagnostic(
        code(tfmirror_config::unknown_registry),
        help("Add it under [[registries]] in your config or pass its URL directly")
    )]
    UnknownRegistry(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
