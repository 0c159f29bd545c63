//! Safety checks for `.tar.gz` module archives before they are stored.

use std::{
    cell::Cell,
    io::{self, Read},
};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};

/// Cap applied when the caller passes `0`: 100 MiB.
pub const DEFAULT_MAX_ARCHIVE_SIZE: u64 = 100 * 1024 * 1024;

/// What a successful validation saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    /// Sum of the sizes declared in the entry headers.
    pub total_size: u64,
}

/// Records whether a read error came from the gzip layer rather than from tar.
struct GzipStream<'a, R: Read> {
    inner: GzDecoder<R>,
    failed: &'a Cell<bool>,
}

impl<R: Read> Read for GzipStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed.set(true))
    }
}

/// Validates a gzip-compressed tar archive without extracting it.
///
/// At most `max_size + 1` compressed bytes are read. Entries are rejected when
/// their declared sizes add up to more than `max_size`, or when a path is
/// absolute, contains `..` or starts with `.git` after normalization. An
/// archive without entries is rejected too. `max_size == 0` selects
/// [`DEFAULT_MAX_ARCHIVE_SIZE`].
pub fn validate_archive<R: Read>(reader: R, max_size: u64) -> ArchiveResult<ArchiveSummary> {
    let max_size = if max_size == 0 {
        DEFAULT_MAX_ARCHIVE_SIZE
    } else {
        max_size
    };

    let gzip_failed = Cell::new(false);
    let stream = GzipStream {
        inner: GzDecoder::new(reader.take(max_size.saturating_add(1))),
        failed: &gzip_failed,
    };
    let classify = |err: io::Error| {
        if gzip_failed.get() {
            ArchiveError::InvalidGzip(err)
        } else {
            ArchiveError::InvalidTar(err)
        }
    };

    let mut archive = tar::Archive::new(stream);
    let mut summary = ArchiveSummary {
        entries: 0,
        total_size: 0,
    };

    for entry in archive.entries().map_err(classify)? {
        let entry = entry.map_err(classify)?;
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        summary.entries += 1;
        summary.total_size = summary.total_size.saturating_add(entry.size());

        validate_entry_path(&path)?;
        if summary.total_size > max_size {
            return Err(ArchiveError::TooLarge { max_size });
        }
    }

    if summary.entries == 0 {
        return Err(ArchiveError::Empty);
    }

    debug!(
        "archive ok: {} entries, {} bytes declared",
        summary.entries, summary.total_size
    );
    Ok(summary)
}

/// Checks one entry name. Backslashes are not separators here, so only
/// drive-letter prefixes are treated as Windows paths.
pub fn validate_entry_path(raw: &str) -> ArchiveResult<()> {
    let path = clean_path(raw);
    let bytes = path.as_bytes();

    if path.starts_with('/')
        || (bytes.len() >= 3 && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/'))
    {
        return Err(ArchiveError::AbsolutePath { path });
    }
    if path.contains("..") {
        return Err(ArchiveError::PathTraversal { path });
    }
    if path.starts_with(".git") {
        return Err(ArchiveError::GitMetadata { path });
    }
    Ok(())
}

/// Lexically normalizes a slash-separated path.
///
/// Repeated separators and `.` elements are removed and `..` consumes the
/// preceding element. A leading `..` is kept on relative paths and dropped
/// on rooted ones. The empty path becomes `.`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::{write::GzEncoder, Compression};
    use tar::{EntryType, Header};

    use super::*;

    /// Builds a `.tar.gz` whose entry names are written verbatim, bypassing
    /// the path checks `tar::Builder` applies.
    fn tar_gz<D: AsRef<[u8]>>(entries: &[(&str, D)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = Header::new_gnu();
            header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
            let data: &[u8] = data.as_ref();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        let tar = builder.into_inner().unwrap();

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&tar).unwrap();
        gz.finish().unwrap()
    }

    fn validate(entries: &[(&str, &str)]) -> ArchiveResult<ArchiveSummary> {
        validate_archive(Cursor::new(tar_gz(entries)), 0)
    }

    #[test]
    fn test_clean_path() {
        let cases = [
            ("", "."),
            (".", "."),
            ("a/b/c", "a/b/c"),
            ("./a//b/", "a/b"),
            ("a/./b/../c", "a/c"),
            ("a/../../b", "../b"),
            ("/a/../b", "/b"),
            ("/../etc/passwd", "/etc/passwd"),
            ("./.git/config", ".git/config"),
            ("..", ".."),
        ];
        for (input, expected) in cases {
            assert_eq!(clean_path(input), expected, "{input}");
        }
    }

    #[test]
    fn test_valid_archive() {
        let entries = [
            ("main.tf", "resource \"null_resource\" \"x\" {}\n"),
            ("modules/net/variables.tf", "variable \"cidr\" {}\n"),
            (".terraform.lock.hcl", "# lock\n"),
            ("README.md", "# module\n"),
        ];
        let summary = validate(&entries).unwrap();
        assert_eq!(summary.entries, 4);
        assert_eq!(
            summary.total_size,
            entries.iter().map(|(_, d)| d.len() as u64).sum::<u64>()
        );
    }

    #[test]
    fn test_rejects_unsafe_paths() {
        let cases: [(&str, fn(&ArchiveError) -> bool); 7] = [
            ("/etc/passwd", |e| matches!(e, ArchiveError::AbsolutePath { .. })),
            ("C:\\Windows\\system.ini", |e| matches!(e, ArchiveError::AbsolutePath { .. })),
            ("d:/boot.ini", |e| matches!(e, ArchiveError::AbsolutePath { .. })),
            ("../escape.tf", |e| matches!(e, ArchiveError::PathTraversal { .. })),
            ("a/../../escape.tf", |e| matches!(e, ArchiveError::PathTraversal { .. })),
            (".git/config", |e| matches!(e, ArchiveError::GitMetadata { .. })),
            ("./.gitignore", |e| matches!(e, ArchiveError::GitMetadata { .. })),
        ];

        for (name, expected) in cases {
            let err = validate(&[("main.tf", "ok"), (name, "bad")]).unwrap_err();
            assert!(expected(&err), "{name}: {err:?}");
        }
    }

    #[test]
    fn test_traversal_that_stays_inside_is_allowed() {
        assert!(validate(&[("a/b/../c.tf", "x")]).is_ok());
    }

    #[test]
    fn test_rejects_oversized_total() {
        let big = vec![0u8; 4000];
        let err = validate_archive(
            Cursor::new(tar_gz(&[("a.bin", &big), ("b.bin", &big)])),
            5000,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::TooLarge { max_size: 5000 }));

        let ok = validate_archive(Cursor::new(tar_gz(&[("a.bin", &big)])), 5000).unwrap();
        assert_eq!(ok.total_size, 4000);
    }

    #[test]
    fn test_rejects_empty_archive() {
        assert!(matches!(validate(&[]), Err(ArchiveError::Empty)));
    }

    #[test]
    fn test_rejects_non_gzip() {
        let err = validate_archive(Cursor::new(b"PK\x03\x04 not a tarball".to_vec()), 0).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidGzip(_)), "{err:?}");
        assert_eq!(err.kind(), tfmirror_utils::error::ErrorKind::Format);
    }

    #[test]
    fn test_rejects_gzip_without_tar() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&[0x42; 700]).unwrap();
        let data = gz.finish().unwrap();

        let err = validate_archive(Cursor::new(data), 0).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidTar(_)), "{err:?}");
    }

    #[test]
    fn test_compressed_input_is_capped() {
        let mut state = 0x2545_f491_u32;
        let noise: Vec<u8> = (0..20_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let data = tar_gz(&[("noise.bin", &noise)]);
        assert!(data.len() > 2048);

        assert!(validate_archive(Cursor::new(data), 2048).is_err());
    }
}
