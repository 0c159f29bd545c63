use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use nu_ansi_term::Color;
use serde::Serialize;

use crate::error::{CliError, CliResult, ErrorContext};

pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✓";
    pub const CHECKSUM: &str = "🔏";
    pub const PACKAGE: &str = "📦";
    pub const VERSION: &str = "🏁";
    pub const WARNING: &str = "⚠";
}

static COLOR: AtomicBool = AtomicBool::new(true);

pub fn disable_color() {
    COLOR.store(false, Ordering::Relaxed);
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if COLOR.load(Ordering::Relaxed) {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Splits a `NAMESPACE/TYPE` provider address.
pub fn parse_provider(address: &str) -> CliResult<(&str, &str)> {
    match address.split_once('/') {
        Some((namespace, provider_type))
            if !namespace.is_empty()
                && !provider_type.is_empty()
                && !provider_type.contains('/') =>
        {
            Ok((namespace, provider_type))
        }
        _ => Err(CliError::InvalidProvider(address.to_string())),
    }
}

pub fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Reads each armored key file into memory.
pub fn read_keys(paths: &[PathBuf]) -> CliResult<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("reading public key {}", path.display()))
        })
        .collect()
}

/// Joins an upstream-supplied filename onto `dir`, refusing anything that is
/// not a single plain path component.
pub fn output_path(dir: &Path, filename: &str) -> CliResult<PathBuf> {
    let is_plain = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\']);
    if is_plain {
        Ok(dir.join(filename))
    } else {
        Err(CliError::UnsafeFilename(filename.to_string()))
    }
}

/// Creates `dir` if needed and writes `data` to `dir/filename`.
pub fn write_artifact(dir: &Path, filename: &str, data: &[u8]) -> CliResult<PathBuf> {
    let path = output_path(dir, filename)?;
    fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;
    fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{tempdir, NamedTempFile};

    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("hashicorp/aws").unwrap(), ("hashicorp", "aws"));
        assert!(parse_provider("aws").is_err());
        assert!(parse_provider("/aws").is_err());
        assert!(parse_provider("hashicorp/").is_err());
        assert!(parse_provider("registry/hashicorp/aws").is_err());
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://releases.hashicorp.com"));
        assert!(is_url("http://localhost:8080"));
        assert!(!is_url("terraform"));
        assert!(!is_url("ftp://example.com"));
    }

    #[test]
    fn test_output_path_rejects_unsafe_names() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            output_path(dir, "terraform_1.5.0_linux_amd64.zip").unwrap(),
            dir.join("terraform_1.5.0_linux_amd64.zip")
        );
        for name in ["", ".", "..", "../evil.zip", "a/b.zip", "a\\b.zip"] {
            assert!(
                matches!(output_path(dir, name), Err(CliError::UnsafeFilename(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_write_artifact_creates_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested");

        let path = write_artifact(&target, "file.zip", b"content").unwrap();
        assert_eq!(path, target.join("file.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"content");
    }

    #[test]
    fn test_read_keys() {
        let mut key = NamedTempFile::new().unwrap();
        write!(key, "-----BEGIN PGP PUBLIC KEY BLOCK-----").unwrap();

        let keys = read_keys(&[key.path().to_path_buf()]).unwrap();
        assert_eq!(keys, vec!["-----BEGIN PGP PUBLIC KEY BLOCK-----".to_string()]);

        let missing = read_keys(&[PathBuf::from("/nonexistent/key.asc")]);
        assert!(matches!(missing, Err(CliError::IoError { .. })));
    }
}
