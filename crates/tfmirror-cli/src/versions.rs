use nu_ansi_term::Color::{Blue, Green, Yellow};
use tfmirror_dl::ReleaseSource;
use tfmirror_utils::version::{is_prerelease, latest_stable, VersionFilter};
use tracing::info;

use crate::{
    context::AppContext,
    error::CliResult,
    utils::{print_json, Colored, Icons},
};

pub fn list_versions(
    ctx: &AppContext,
    upstream: &str,
    product: Option<&str>,
    filter: Option<&VersionFilter>,
    json: bool,
) -> CliResult<()> {
    let upstream = ctx.resolve_upstream(upstream, product)?;
    let client = ctx.release_client(&upstream)?;
    let mut versions = client.list_versions(ctx.cancel())?;
    if let Some(filter) = filter {
        versions = filter.apply(versions, |v| v.version.as_str());
    }

    if json {
        return print_json(&versions);
    }

    for version in &versions {
        let platforms = version
            .builds
            .iter()
            .map(|b| format!("{}_{}", b.os, b.arch))
            .collect::<Vec<_>>()
            .join(", ");
        let marker = if is_prerelease(&version.version) {
            format!(" {}", Colored(Yellow, "[pre-release]"))
        } else {
            String::new()
        };
        info!(
            "{} {}{} [{}]",
            Icons::VERSION,
            Colored(Green, &version.version),
            marker,
            Colored(Blue, platforms)
        );
    }

    let latest = latest_stable(versions.iter().map(|v| v.version.as_str()));
    info!(
        "{} version(s) of {} on {}, latest stable: {}",
        versions.len(),
        client.product(),
        upstream.name,
        latest.unwrap_or("none")
    );
    Ok(())
}
