use crate::error::{Result, VerifyError};

pub const SUPPORTED_OS: [&str; 6] = ["darwin", "freebsd", "linux", "openbsd", "solaris", "windows"];
pub const SUPPORTED_ARCH: [&str; 4] = ["386", "amd64", "arm", "arm64"];

/// Checks that `os`/`arch` is a platform Terraform providers are built for.
pub fn validate_platform(os: &str, arch: &str) -> Result<()> {
    let unsupported = |reason: String| VerifyError::UnsupportedPlatform { reason };

    if os.is_empty() {
        return Err(unsupported("operating system cannot be empty".into()));
    }
    if arch.is_empty() {
        return Err(unsupported("architecture cannot be empty".into()));
    }
    if !SUPPORTED_OS.contains(&os) {
        return Err(unsupported(format!("unsupported operating system: {os}")));
    }
    if !SUPPORTED_ARCH.contains(&arch) {
        return Err(unsupported(format!("unsupported architecture: {arch}")));
    }
    Ok(())
}

/// Human-readable platform name, e.g. `macOS ARM64`.
pub fn platform_display_name(os: &str, arch: &str) -> String {
    let os_name = match os {
        "darwin" => "macOS",
        "freebsd" => "FreeBSD",
        "linux" => "Linux",
        "openbsd" => "OpenBSD",
        "solaris" => "Solaris",
        "windows" => "Windows",
        other => other,
    };
    let arch_name = match arch {
        "386" => "32-bit",
        "amd64" => "64-bit",
        "arm" => "ARM",
        "arm64" => "ARM64",
        other => other,
    };
    format!("{os_name} {arch_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_platform() {
        for os in SUPPORTED_OS {
            for arch in SUPPORTED_ARCH {
                assert!(validate_platform(os, arch).is_ok(), "{os}/{arch}");
            }
        }

        assert!(validate_platform("", "amd64").is_err());
        assert!(validate_platform("linux", "").is_err());
        assert!(validate_platform("plan9", "amd64").is_err());
        assert!(validate_platform("linux", "riscv64").is_err());
        assert!(validate_platform("Linux", "amd64").is_err());

        let err = validate_platform("haiku", "amd64").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported platform: unsupported operating system: haiku");
    }

    #[test]
    fn test_platform_display_name() {
        assert_eq!(platform_display_name("darwin", "arm64"), "macOS ARM64");
        assert_eq!(platform_display_name("linux", "386"), "Linux 32-bit");
        assert_eq!(platform_display_name("plan9", "mips"), "plan9 mips");
    }
}
