use std::path::{Path, PathBuf};

use nu_ansi_term::Color::{Blue, Cyan, Green, Yellow};
use tfmirror_dl::{registry::ProviderPackage, CancellationToken, UpstreamRegistryClient};
use tfmirror_utils::checksums::ChecksumSet;
use tfmirror_verify::{
    binary::verify_digest, platform::platform_display_name, validate_platform,
    validate_provider_binary, verify_with_any_key,
};
use tracing::info;

use crate::{
    context::AppContext,
    error::{CliError, CliResult},
    utils::{parse_provider, print_json, write_artifact, Colored, Icons},
};

pub fn list_provider_versions(
    ctx: &AppContext,
    registry: &str,
    provider: &str,
    json: bool,
) -> CliResult<()> {
    let (namespace, provider_type) = parse_provider(provider)?;
    let registry = ctx.resolve_registry(registry)?;
    let client = ctx.registry_client(&registry)?;
    let versions = client.list_provider_versions(ctx.cancel(), namespace, provider_type)?;

    if json {
        return print_json(&versions);
    }

    if versions.is_empty() {
        info!("No versions of {provider} found on {}", registry.name);
        return Ok(());
    }

    for version in &versions {
        let platforms = version
            .platforms
            .iter()
            .map(|p| format!("{}_{}", p.os, p.arch))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            "{} {} protocols [{}] platforms [{}]",
            Icons::VERSION,
            Colored(Green, &version.version),
            version.protocols.join(", "),
            Colored(Blue, platforms)
        );
    }
    Ok(())
}

pub struct PackageArgs {
    pub registry: String,
    pub provider: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub download: Option<PathBuf>,
}

pub fn show_provider_package(ctx: &AppContext, args: PackageArgs, json: bool) -> CliResult<()> {
    let (namespace, provider_type) = parse_provider(&args.provider)?;
    validate_platform(&args.os, &args.arch)?;

    let registry = ctx.resolve_registry(&args.registry)?;
    let client = ctx.registry_client(&registry)?;
    let package = client.get_provider_package(
        ctx.cancel(),
        namespace,
        provider_type,
        &args.version,
        &args.os,
        &args.arch,
    )?;

    if json {
        print_json(&package)?;
    } else {
        info!(
            "{} {} {} ({})",
            Icons::PACKAGE,
            Colored(Green, &args.provider),
            args.version,
            platform_display_name(&package.os, &package.arch)
        );
        info!("  filename: {}", package.filename);
        info!("  download: {}", Colored(Blue, &package.download_url));
        info!("  sha256:   {}", package.shasum);
        for key in &package.signing_keys.gpg_public_keys {
            info!("  signed by: {}", Colored(Cyan, &key.key_id));
        }
    }

    if let Some(dir) = &args.download {
        download_provider_package(
            ctx.cancel(),
            &client,
            &package,
            dir,
            ctx.max_archive_size(),
        )?;
    }
    Ok(())
}

/// Verifies and downloads a provider package.
///
/// The registry's signed `SHA256SUMS` must verify with one of the signing
/// keys it advertises and agree with the package's own `shasum` before the
/// archive is fetched. The archive is written only after its digest matched
/// and it passed the provider binary checks.
pub fn download_provider_package(
    cancel: &CancellationToken,
    client: &UpstreamRegistryClient,
    package: &ProviderPackage,
    dir: &Path,
    max_size: u64,
) -> CliResult<PathBuf> {
    let keys = package.signing_keys.armored_keys();
    if keys.is_empty() {
        return Err(CliError::NoTrustedKeys {
            upstream: client.base_url().to_string(),
        });
    }

    let sums = client.download_file(cancel, &package.shasums_url)?;
    let signature = client.download_file(cancel, &package.shasums_signature_url)?;
    let verification = verify_with_any_key(&sums.bytes, &signature.bytes, &keys)?;
    info!(
        "{} Checksums signed by {}",
        Icons::CHECKSUM,
        Colored(Cyan, &verification.key_id)
    );

    let checksums = ChecksumSet::parse_bytes(&sums.bytes);
    let listed = checksums.checksum_for(&package.filename).ok_or_else(|| {
        CliError::MissingChecksum {
            filename: package.filename.clone(),
        }
    })?;
    if !listed.eq_ignore_ascii_case(package.shasum.trim()) {
        return Err(CliError::RegistryChecksumMismatch {
            filename: package.filename.clone(),
        });
    }

    let archive = client.download_file(cancel, &package.download_url)?;
    verify_digest(&archive.sha256, listed)?;
    validate_provider_binary(&archive.bytes, max_size)?;

    let path = write_artifact(dir, &package.filename, &archive.bytes)?;
    info!(
        "{} {} {}",
        Icons::CHECK,
        Colored(Green, &package.filename),
        Colored(Yellow, path.display())
    );
    Ok(path)
}
