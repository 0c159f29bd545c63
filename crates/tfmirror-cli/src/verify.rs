use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use nu_ansi_term::Color::{Cyan, Green};
use serde_json::json;
use tfmirror_utils::{bytes::format_bytes, hash::calculate_file_sha256};
use tfmirror_verify::{validate_archive, verify_with_any_key};
use tracing::info;

use crate::{
    context::AppContext,
    error::{CliResult, ErrorContext},
    utils::{print_json, read_keys, Colored, Icons},
};

pub fn verify_signature_files(
    keys: &[PathBuf],
    data: &Path,
    signature: &Path,
    json: bool,
) -> CliResult<()> {
    let keys = read_keys(keys)?;
    let content = fs::read(data).with_context(|| format!("reading {}", data.display()))?;
    let sig = fs::read(signature).with_context(|| format!("reading {}", signature.display()))?;

    let verification = verify_with_any_key(&content, &sig, &keys)?;

    if json {
        print_json(&json!({
            "file": data,
            "valid": true,
            "key_id": verification.key_id,
        }))
    } else {
        info!(
            "{} Good signature on {} from key {}",
            Icons::CHECK,
            data.display(),
            Colored(Cyan, &verification.key_id)
        );
        Ok(())
    }
}

pub fn check_archive(
    ctx: &AppContext,
    file: &Path,
    max_size: Option<u64>,
    json: bool,
) -> CliResult<()> {
    let max_size = max_size.unwrap_or_else(|| ctx.max_archive_size());
    let reader = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let summary = validate_archive(reader, max_size)?;
    let sha256 = calculate_file_sha256(file)?;

    if json {
        print_json(&json!({
            "file": file,
            "entries": summary.entries,
            "total_size": summary.total_size,
            "sha256": sha256,
        }))
    } else {
        info!(
            "{} {} is safe to extract: {} entries, {} uncompressed",
            Icons::CHECK,
            Colored(Green, file.display()),
            summary.entries,
            format_bytes(summary.total_size, 2)
        );
        info!("  sha256: {sha256}");
        Ok(())
    }
}
