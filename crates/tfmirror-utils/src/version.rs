//! Release version ordering and selection.
//!
//! Versions are compared as semver when both sides parse (after stripping a
//! leading `v`); otherwise only the numeric `major.minor.patch` core is
//! compared, with missing or garbled components counting as zero.

use std::{cmp::Ordering, collections::HashSet};

use semver::Version;

use crate::error::{VersionError, VersionResult};

fn trim_v(version: &str) -> &str {
    version.trim().trim_start_matches('v')
}

/// Whether `version` carries a pre-release or build suffix.
pub fn is_prerelease(version: &str) -> bool {
    trim_v(version).contains(['-', '+'])
}

fn numeric_core(version: &str) -> [u64; 3] {
    let core = match version.find(['-', '+']) {
        Some(idx) => &version[..idx],
        None => version,
    };

    let mut result = [0; 3];
    for (slot, part) in result.iter_mut().zip(core.splitn(4, '.')) {
        *slot = part
            .chars()
            .filter(char::is_ascii_digit)
            .fold(0u64, |n, ch| {
                n.saturating_mul(10)
                    .saturating_add(u64::from(ch as u8 - b'0'))
            });
    }
    result
}

/// Orders two release versions.
///
/// # Example
///
/// ```
/// use std::cmp::Ordering;
/// use tfmirror_utils::version::compare_versions;
///
/// assert_eq!(compare_versions("1.10.0", "1.9.8"), Ordering::Greater);
/// assert_eq!(compare_versions("v1.5.0", "1.5.0"), Ordering::Equal);
/// assert_eq!(compare_versions("1.6.0-alpha1", "1.6.0"), Ordering::Less);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (trim_v(a), trim_v(b));
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => numeric_core(a).cmp(&numeric_core(b)),
    }
}

/// The highest stable version, or the highest overall when every version is
/// a pre-release.
pub fn latest_stable<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let versions: Vec<&str> = versions.into_iter().collect();
    let newest = |stable_only: bool| {
        versions
            .iter()
            .copied()
            .filter(|v| !stable_only || !is_prerelease(v))
            .max_by(|a, b| compare_versions(a, b))
    };

    newest(true).or_else(|| newest(false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    fn matches(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterOrEqual => ordering != Ordering::Less,
            Comparison::Less => ordering == Ordering::Less,
            Comparison::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// One element of a comma-separated filter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    /// `1.9.` or `1.9.x`: versions starting with `1.9.`.
    Prefix(String),
    /// `1.9`: treated as the prefix `1.9.` when anything matches it, else as
    /// an exact version.
    PrefixOrExact(String),
}

/// A version selection expression.
///
/// | Filter        | Selects                                   |
/// |---------------|-------------------------------------------|
/// | empty         | everything                                |
/// | `latest:N`    | the N highest versions                    |
/// | `>=1.5.0`     | versions satisfying the comparison        |
/// | `1.9.` `1.9.x`| versions with that prefix                 |
/// | `1.9`         | prefix `1.9.`, falling back to exact 1.9  |
/// | `1.5.0,1.6`   | the union of each token's matches         |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionFilter {
    All,
    Latest(usize),
    Compare(Comparison, String),
    Tokens(Vec<VersionToken>),
}

impl VersionFilter {
    pub fn parse(input: &str) -> VersionResult<Self> {
        let filter = input.trim();
        if filter.is_empty() {
            return Ok(Self::All);
        }

        if let Some(count) = filter.strip_prefix("latest:") {
            return match count.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(Self::Latest(n)),
                _ => {
                    Err(VersionError::InvalidFilter {
                        input: input.to_string(),
                        reason: "`latest:` needs a positive count".into(),
                    })
                }
            };
        }

        let comparisons = [
            (">=", Comparison::GreaterOrEqual),
            ("<=", Comparison::LessOrEqual),
            (">", Comparison::Greater),
            ("<", Comparison::Less),
        ];
        for (op, comparison) in comparisons {
            if let Some(target) = filter.strip_prefix(op) {
                let target = target.trim();
                if target.is_empty() {
                    return Err(VersionError::InvalidFilter {
                        input: input.to_string(),
                        reason: format!("`{op}` needs a version"),
                    });
                }
                return Ok(Self::Compare(comparison, target.to_string()));
            }
        }

        let tokens = filter
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                if t.ends_with('.') || t.ends_with(".x") {
                    VersionToken::Prefix(t.trim_end_matches('x').to_string())
                } else {
                    VersionToken::PrefixOrExact(t.to_string())
                }
            })
            .collect::<Vec<_>>();

        if tokens.is_empty() {
            Ok(Self::All)
        } else {
            Ok(Self::Tokens(tokens))
        }
    }

    /// Keeps the items whose version (read through `key`) the filter selects.
    ///
    /// `Latest` returns the selection sorted newest first; every other filter
    /// preserves the input order.
    pub fn apply<T, F>(&self, items: Vec<T>, key: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        match self {
            Self::All => items,
            Self::Latest(count) => {
                let mut items = items;
                items.sort_by(|a, b| compare_versions(key(b), key(a)));
                items.truncate(*count);
                items
            }
            Self::Compare(comparison, target) => {
                items
                    .into_iter()
                    .filter(|item| comparison.matches(compare_versions(key(item), target)))
                    .collect()
            }
            Self::Tokens(tokens) => {
                let selected: HashSet<String> = tokens
                    .iter()
                    .flat_map(|token| token.select(&items, &key))
                    .collect();
                items
                    .into_iter()
                    .filter(|item| selected.contains(key(item)))
                    .collect()
            }
        }
    }
}

impl VersionToken {
    fn select<T, F>(&self, items: &[T], key: &F) -> Vec<String>
    where
        F: Fn(&T) -> &str,
    {
        let with_prefix = |prefix: &str| -> Vec<String> {
            items
                .iter()
                .map(key)
                .filter(|v| v.starts_with(prefix))
                .map(str::to_string)
                .collect()
        };

        match self {
            VersionToken::Prefix(prefix) => with_prefix(prefix),
            VersionToken::PrefixOrExact(token) => {
                let matched = with_prefix(&format!("{token}."));
                if matched.is_empty() {
                    items
                        .iter()
                        .map(key)
                        .filter(|v| *v == token.as_str())
                        .map(str::to_string)
                        .collect()
                } else {
                    matched
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSIONS: [&str; 7] = [
        "1.5.0",
        "1.5.7",
        "1.6.0-alpha20230405",
        "1.6.0",
        "1.9.8",
        "1.10.0",
        "1.10.1-rc1",
    ];

    fn select(filter: &str) -> Vec<&'static str> {
        VersionFilter::parse(filter)
            .unwrap()
            .apply(VERSIONS.to_vec(), |v| *v)
    }

    #[test]
    fn test_is_prerelease() {
        assert!(is_prerelease("1.6.0-alpha20230405"));
        assert!(is_prerelease("v1.0.0+build.5"));
        assert!(!is_prerelease("1.6.0"));
        assert!(!is_prerelease("v1.6.0"));
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10.0", "1.9.8"), Ordering::Greater);
        assert_eq!(compare_versions("1.5.0", "1.5.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.6.0-alpha1", "1.6.0"), Ordering::Less);
        assert_eq!(compare_versions("1.6.0-beta1", "1.6.0-alpha1"), Ordering::Greater);
    }

    #[test]
    fn test_compare_versions_lenient_fallback() {
        assert_eq!(compare_versions("1.2", "1.1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("garbage", "0.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_latest_stable() {
        assert_eq!(latest_stable(VERSIONS), Some("1.10.0"));
        assert_eq!(latest_stable(["1.0.0-rc1", "1.0.0-rc2"]), Some("1.0.0-rc2"));
        assert_eq!(latest_stable(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_filter_empty_selects_all() {
        assert_eq!(select(""), VERSIONS.to_vec());
        assert_eq!(select(" , "), VERSIONS.to_vec());
    }

    #[test]
    fn test_filter_latest() {
        assert_eq!(select("latest:2"), vec!["1.10.1-rc1", "1.10.0"]);
        assert_eq!(select("latest:100").len(), VERSIONS.len());
        assert!(VersionFilter::parse("latest:0").is_err());
        assert!(VersionFilter::parse("latest:abc").is_err());
    }

    #[test]
    fn test_filter_comparisons() {
        assert_eq!(select(">=1.9.8"), vec!["1.9.8", "1.10.0", "1.10.1-rc1"]);
        assert_eq!(select(">1.9.8"), vec!["1.10.0", "1.10.1-rc1"]);
        assert_eq!(select("<1.5.7"), vec!["1.5.0"]);
        assert_eq!(select("<= 1.5.7"), vec!["1.5.0", "1.5.7"]);
        assert!(VersionFilter::parse(">=").is_err());
    }

    #[test]
    fn test_filter_prefixes_and_exact() {
        assert_eq!(select("1.5."), vec!["1.5.0", "1.5.7"]);
        assert_eq!(select("1.10.x"), vec!["1.10.0", "1.10.1-rc1"]);
        assert_eq!(select("1.6"), vec!["1.6.0-alpha20230405", "1.6.0"]);
        assert_eq!(select("1.9.8"), vec!["1.9.8"]);
        assert!(select("2.0").is_empty());
    }

    #[test]
    fn test_filter_token_list_is_a_union() {
        assert_eq!(select("1.5, 1.9.8"), vec!["1.5.0", "1.5.7", "1.9.8"]);
        assert_eq!(select("1.9.8,1.9.8"), vec!["1.9.8"]);
    }
}
