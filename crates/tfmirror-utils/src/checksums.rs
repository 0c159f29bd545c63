//! Parsing of `SHA256SUMS` files.
//!
//! Each line has the shape `<hex digest>  <filename>`. GNU coreutils marks
//! files hashed in binary mode with a `*` in front of the filename; that
//! marker is stripped here so lookups always use the plain filename.

use std::collections::BTreeMap;

/// Filename to lowercase hex SHA256, as published in a `SHA256SUMS` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumSet {
    entries: BTreeMap<String, String>,
}

impl ChecksumSet {
    /// Parses `SHA256SUMS` content. Blank or malformed lines are skipped.
    ///
    /// When a filename appears more than once, the first digest wins.
    ///
    /// # Example
    ///
    /// ```
    /// use tfmirror_utils::checksums::ChecksumSet;
    ///
    /// let set = ChecksumSet::parse("ABC123  *terraform_1.5.0_linux_amd64.zip\n");
    /// assert_eq!(set.get("terraform_1.5.0_linux_amd64.zip"), Some("abc123"));
    /// ```
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();

        for line in content.lines() {
            let Some((digest, rest)) = line.trim_start().split_once(char::is_whitespace) else {
                continue;
            };

            let filename = rest.trim_start();
            let filename = filename.strip_suffix('\r').unwrap_or(filename);
            let filename = filename.strip_prefix('*').unwrap_or(filename);
            if filename.is_empty()
                || digest.is_empty()
                || !digest.chars().all(|c| c.is_ascii_hexdigit())
            {
                continue;
            }

            entries
                .entry(filename.to_string())
                .or_insert_with(|| digest.to_ascii_lowercase());
        }

        Self { entries }
    }

    /// Parses raw bytes, replacing invalid UTF-8 sequences.
    pub fn parse_bytes(content: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(content))
    }

    /// Exact-match lookup of the digest for `filename`.
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    /// Looks up `filename`, tolerating a caller that still passes the `*` marker.
    pub fn checksum_for(&self, filename: &str) -> Option<&str> {
        self.get(filename.strip_prefix('*').unwrap_or(filename))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, digest)| (name.as_str(), digest.as_str()))
    }
}
