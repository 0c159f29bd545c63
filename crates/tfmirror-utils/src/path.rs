use std::{env, path::PathBuf};

/// Returns `$HOME`, falling back to the current directory when it is unset.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

/// Expands a leading `~` or `~/` to the home directory.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use tfmirror_utils::path::expand_tilde;
///
/// assert_eq!(expand_tilde("/etc/keys.asc"), PathBuf::from("/etc/keys.asc"));
/// ```
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}
