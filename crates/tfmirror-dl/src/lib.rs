pub mod cancel;
pub mod download;
pub mod error;
pub mod github;
pub mod http;
pub mod http_client;
pub mod registry;
pub mod release_index;
pub mod traits;
pub mod types;
pub mod upstream;
pub mod utils;

pub use cancel::CancellationToken;
pub use download::ResilientDownloader;
pub use error::{ErrorKind, Result, UpstreamError};
pub use github::GithubReleaseClient;
pub use http_client::ClientConfig;
pub use registry::UpstreamRegistryClient;
pub use release_index::ReleaseIndexClient;
pub use traits::ReleaseSource;
pub use upstream::{ReleaseClient, UpstreamKind, UpstreamOptions};
