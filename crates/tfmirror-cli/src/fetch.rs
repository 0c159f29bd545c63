use std::path::{Path, PathBuf};

use nu_ansi_term::Color::{Cyan, Green, Yellow};
use serde::Serialize;
use tfmirror_dl::{
    types::BuildArtifact, CancellationToken, ReleaseClient, ReleaseSource, ResilientDownloader,
};
use tfmirror_verify::{binary::verify_digest, platform::platform_display_name, verify_with_any_key};
use tracing::{debug, info, warn};

use crate::{
    context::AppContext,
    error::{CliError, CliResult},
    utils::{print_json, write_artifact, Colored, Icons},
};

pub struct FetchRequest<'a> {
    pub upstream: &'a str,
    pub version: &'a str,
    pub os: Option<&'a str>,
    pub arch: Option<&'a str>,
    pub output: &'a Path,
    /// Armored keys trusted for the `SHA256SUMS` signature.
    pub keys: &'a [String],
    pub skip_signature: bool,
}

#[derive(Debug, Serialize)]
pub struct FetchedArtifact {
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub sha256: String,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct FetchReport {
    pub version: String,
    /// Key that verified the checksums, unless verification was skipped.
    pub signed_by: Option<String>,
    pub artifacts: Vec<FetchedArtifact>,
}

fn matches_filter(build: &BuildArtifact, os: Option<&str>, arch: Option<&str>) -> bool {
    os.map_or(true, |os| build.os == os) && arch.map_or(true, |arch| build.arch == arch)
}

/// Fetches `version`, verifies the signed checksum list and every matching
/// build against it, then writes the builds into the output directory.
///
/// Nothing is written unless the signature verified (or was explicitly
/// skipped), and each file is only written after its digest matched.
pub fn fetch_release(
    cancel: &CancellationToken,
    client: &ReleaseClient,
    downloader: &ResilientDownloader,
    request: &FetchRequest<'_>,
) -> CliResult<FetchReport> {
    let versions = client.list_versions(cancel)?;
    let release = versions
        .into_iter()
        .find(|v| v.version == request.version)
        .ok_or_else(|| {
            CliError::VersionNotFound {
                upstream: request.upstream.to_string(),
                version: request.version.to_string(),
            }
        })?;

    let builds: Vec<&BuildArtifact> = release
        .builds
        .iter()
        .filter(|b| matches_filter(b, request.os, request.arch))
        .collect();
    if builds.is_empty() {
        return Err(CliError::NoMatchingBuilds {
            version: release.version.clone(),
            platform: platform_display_name(
                request.os.unwrap_or("any"),
                request.arch.unwrap_or("any"),
            ),
        });
    }

    let checksums = client.fetch_checksums(cancel, &release.version)?;
    debug!(
        "{} checksums listed for {}",
        checksums.entries.len(),
        release.version
    );

    let signed_by = if request.skip_signature {
        warn!(
            "{} Skipping signature verification for {}",
            Icons::WARNING,
            release.version
        );
        None
    } else {
        if request.keys.is_empty() {
            return Err(CliError::NoTrustedKeys {
                upstream: request.upstream.to_string(),
            });
        }
        let signature = client.fetch_signature(cancel, &release.version)?;
        let verification = verify_with_any_key(&checksums.raw, &signature, request.keys)?;
        info!(
            "{} Checksums signed by {}",
            Icons::CHECKSUM,
            Colored(Cyan, &verification.key_id)
        );
        Some(verification.key_id)
    };

    let mut artifacts = Vec::with_capacity(builds.len());
    for build in builds {
        let expected = checksums
            .entries
            .checksum_for(&build.filename)
            .ok_or_else(|| {
                CliError::MissingChecksum {
                    filename: build.filename.clone(),
                }
            })?;

        let binary = downloader.retry(cancel, &build.download_url, |cancel| {
            client.download_binary(cancel, &build.download_url)
        })?;
        verify_digest(&binary.sha256, expected)?;

        let path = write_artifact(request.output, &build.filename, &binary.bytes)?;
        info!(
            "{} {} ({}) {}",
            Icons::CHECK,
            Colored(Green, &build.filename),
            platform_display_name(&build.os, &build.arch),
            Colored(Yellow, path.display())
        );

        artifacts.push(FetchedArtifact {
            os: build.os.clone(),
            arch: build.arch.clone(),
            filename: build.filename.clone(),
            sha256: binary.sha256,
            path,
        });
    }

    Ok(FetchReport {
        version: release.version,
        signed_by,
        artifacts,
    })
}

pub struct FetchArgs {
    pub upstream: String,
    pub version: String,
    pub product: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub output: PathBuf,
    pub keys: Vec<PathBuf>,
    pub skip_signature: bool,
}

pub fn fetch(ctx: &AppContext, args: FetchArgs, json: bool) -> CliResult<()> {
    let upstream = ctx.resolve_upstream(&args.upstream, args.product.as_deref())?;
    let client = ctx.release_client(&upstream)?;
    let keys = if args.skip_signature {
        Vec::new()
    } else {
        ctx.trusted_keys(&upstream, client.product(), &args.keys)?
    };

    let request = FetchRequest {
        upstream: &upstream.name,
        version: &args.version,
        os: args.os.as_deref(),
        arch: args.arch.as_deref(),
        output: &args.output,
        keys: &keys,
        skip_signature: args.skip_signature,
    };
    let report = fetch_release(ctx.cancel(), &client, &ctx.downloader(), &request)?;

    if json {
        print_json(&report)?;
    } else {
        info!(
            "Fetched {} artifact(s) for {} {}",
            report.artifacts.len(),
            client.product(),
            report.version
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tfmirror_dl::{ClientConfig, UpstreamOptions};
    use tfmirror_verify::VerifyError;

    use super::*;

    const SUMS: &[u8] = include_bytes!("../../tfmirror-verify/testdata/SHA256SUMS");
    const SUMS_SIG: &[u8] = include_bytes!("../../tfmirror-verify/testdata/SHA256SUMS.sig");
    const SIGNER: &str = include_str!("../../tfmirror-verify/testdata/signer.asc");
    const UNRELATED: &str = include_str!("../../tfmirror-verify/testdata/unrelated.asc");

    struct Upstream {
        server: MockServer,
    }

    impl Upstream {
        /// Serves a release index with two builds of 1.5.0 whose bodies match
        /// the checksum fixture: an empty linux build and a darwin build `foo`.
        fn start(darwin_body: &str) -> Self {
            let server = MockServer::start();
            let index = json!({
                "name": "terraform",
                "versions": {
                    "1.5.0": {
                        "version": "1.5.0",
                        "shasums": "terraform_1.5.0_SHA256SUMS",
                        "builds": [
                            {
                                "os": "linux",
                                "arch": "amd64",
                                "filename": "terraform_1.5.0_linux_amd64.zip",
                                "url": server.url("/dl/terraform_1.5.0_linux_amd64.zip")
                            },
                            {
                                "os": "darwin",
                                "arch": "arm64",
                                "filename": "terraform_1.5.0_darwin_arm64.zip",
                                "url": server.url("/dl/terraform_1.5.0_darwin_arm64.zip")
                            }
                        ]
                    }
                }
            });
            server.mock(|when, then| {
                when.method(GET).path("/terraform/index.json");
                then.status(200).json_body(index);
            });
            server.mock(|when, then| {
                when.method(GET)
                    .path("/terraform/1.5.0/terraform_1.5.0_SHA256SUMS");
                then.status(200).body(SUMS);
            });
            server.mock(|when, then| {
                when.method(GET)
                    .path("/terraform/1.5.0/terraform_1.5.0_SHA256SUMS.72D7468F.sig");
                then.status(200).body(SUMS_SIG);
            });
            server.mock(|when, then| {
                when.method(GET)
                    .path("/dl/terraform_1.5.0_linux_amd64.zip");
                then.status(200).body("");
            });
            server.mock(|when, then| {
                when.method(GET)
                    .path("/dl/terraform_1.5.0_darwin_arm64.zip");
                then.status(200).body(darwin_body);
            });
            Self { server }
        }

        fn client(&self) -> ReleaseClient {
            let config = ClientConfig {
                metadata_timeout: Duration::from_secs(5),
                download_timeout: Duration::from_secs(5),
                ..ClientConfig::default()
            };
            ReleaseClient::new(
                &self.server.base_url(),
                "terraform",
                &config,
                &UpstreamOptions::default(),
            )
            .unwrap()
        }
    }

    fn downloader() -> ResilientDownloader {
        ResilientDownloader::new(ClientConfig::default().build(Duration::from_secs(5)))
            .with_backoff(Duration::from_millis(1))
    }

    fn request<'a>(output: &'a Path, keys: &'a [String]) -> FetchRequest<'a> {
        FetchRequest {
            upstream: "test",
            version: "1.5.0",
            os: None,
            arch: None,
            output,
            keys,
            skip_signature: false,
        }
    }

    #[test]
    fn test_fetch_verifies_and_writes_all_builds() {
        let upstream = Upstream::start("foo");
        let dir = tempdir().unwrap();
        let keys = vec![SIGNER.to_string()];

        let report = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request(dir.path(), &keys),
        )
        .unwrap();

        assert_eq!(report.version, "1.5.0");
        assert!(report.signed_by.is_some());
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(
            fs::read(dir.path().join("terraform_1.5.0_darwin_arm64.zip")).unwrap(),
            b"foo"
        );
        assert!(dir.path().join("terraform_1.5.0_linux_amd64.zip").exists());
    }

    #[test]
    fn test_fetch_filters_by_platform() {
        let upstream = Upstream::start("foo");
        let dir = tempdir().unwrap();
        let keys = vec![SIGNER.to_string()];
        let request = FetchRequest {
            os: Some("darwin"),
            arch: Some("arm64"),
            ..request(dir.path(), &keys)
        };

        let report = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request,
        )
        .unwrap();

        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].os, "darwin");
        assert!(!dir.path().join("terraform_1.5.0_linux_amd64.zip").exists());
    }

    #[test]
    fn test_fetch_rejects_tampered_binary() {
        let upstream = Upstream::start("tampered");
        let dir = tempdir().unwrap();
        let keys = vec![SIGNER.to_string()];
        let request = FetchRequest {
            os: Some("darwin"),
            ..request(dir.path(), &keys)
        };

        let err = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CliError::Verify(VerifyError::ChecksumMismatch { .. })
        ));
        assert!(!dir.path().join("terraform_1.5.0_darwin_arm64.zip").exists());
    }

    #[test]
    fn test_fetch_rejects_untrusted_signature() {
        let upstream = Upstream::start("foo");
        let dir = tempdir().unwrap();
        let keys = vec![UNRELATED.to_string()];

        let err = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request(dir.path(), &keys),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CliError::Verify(VerifyError::AllKeysFailed { .. })
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_fetch_requires_keys_unless_skipped() {
        let upstream = Upstream::start("foo");
        let dir = tempdir().unwrap();

        let err = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request(dir.path(), &[]),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::NoTrustedKeys { .. }));

        let request = FetchRequest {
            skip_signature: true,
            ..request(dir.path(), &[])
        };
        let report = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request,
        )
        .unwrap();
        assert_eq!(report.signed_by, None);
        assert_eq!(report.artifacts.len(), 2);
    }

    #[test]
    fn test_fetch_unknown_version_and_platform() {
        let upstream = Upstream::start("foo");
        let dir = tempdir().unwrap();
        let keys = vec![SIGNER.to_string()];

        let request_missing = FetchRequest {
            version: "9.9.9",
            ..request(dir.path(), &keys)
        };
        let err = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request_missing,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::VersionNotFound { .. }));

        let request_platform = FetchRequest {
            os: Some("windows"),
            ..request(dir.path(), &keys)
        };
        let err = fetch_release(
            &CancellationToken::new(),
            &upstream.client(),
            &downloader(),
            &request_platform,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::NoMatchingBuilds { .. }));
    }
}
