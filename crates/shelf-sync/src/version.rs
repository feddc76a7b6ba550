use std::io::BufRead;
use std::path::Path;

use semver::Version;

use crate::error::SyncError;

/// Marker file holding the installed revision at the library root.
pub const VERSION_FILE: &str = "version.txt";

/// Revision identifiers are stored in their short (7 character) form.
pub const SHORT_REVISION_LEN: usize = 7;

/// Truncation counts characters, not bytes, so a revision with multi-byte
/// content never slices inside a character.
#[must_use]
pub fn shorten_revision(revision: &str) -> &str {
    revision
        .char_indices()
        .nth(SHORT_REVISION_LEN)
        .map_or(revision, |(index, _)| &revision[..index])
}

/// Read the revision recorded at `root`, returning the first non-blank
/// trimmed line of the marker file.
///
/// Returns an empty string when the file is absent, unreadable, or contains
/// no non-blank line; an empty result means "library not yet installed".
/// I/O errors are logged rather than surfaced.
#[must_use]
pub fn read_recorded_revision(root: &Path) -> String {
    let marker = root.join(VERSION_FILE);
    if !marker.exists() {
        return String::new();
    }
    let file = match std::fs::File::open(&marker) {
        Ok(file) => file,
        Err(error) => {
            log::warn!("Failed to open {}: {error}", marker.display());
            return String::new();
        }
    };
    for line in std::io::BufReader::new(file).lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
            Err(error) => {
                log::warn!("Failed to read {}: {error}", marker.display());
                return String::new();
            }
        }
    }
    String::new()
}

/// Overwrite the marker file at `root` with `revision`.
///
/// Must only be called after an extraction has fully succeeded.
///
/// # Errors
/// Returns an error when the marker file cannot be written.
pub fn write_revision(root: &Path, revision: &str) -> Result<(), SyncError> {
    let marker = root.join(VERSION_FILE);
    std::fs::write(&marker, format!("{revision}\n"))
        .map_err(|error| SyncError::io_with_path("failed to write version marker", &marker, &error))
}

/// Parse a version string leniently: plain semver, or a `major[.minor[.patch]]`
/// core with missing components filled with zeros (pre-release/build suffixes
/// preserved).
#[must_use]
pub fn parse_lenient(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = (&version[..suffix_idx], &version[suffix_idx..]);

    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().and_then(|part| part.parse::<u64>().ok());
    let patch = parts.next().and_then(|part| part.parse::<u64>().ok());

    if parts.next().is_some() {
        return None;
    }

    let normalized = match (minor, patch) {
        (None, None) => format!("{major}.0.0{suffix}"),
        (Some(minor), None) => format!("{major}.{minor}.0{suffix}"),
        (Some(minor), Some(patch)) => format!("{major}.{minor}.{patch}{suffix}"),
        (None, Some(_)) => return None,
    };

    Version::parse(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::{parse_lenient, read_recorded_revision, shorten_revision, write_revision};

    #[test]
    fn missing_marker_reads_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        assert_eq!(read_recorded_revision(temp.path()), "");
    }

    #[test]
    fn blank_marker_reads_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::write(temp.path().join("version.txt"), "\n   \n\n")
            .expect("marker should be written");
        assert_eq!(read_recorded_revision(temp.path()), "");
    }

    #[test]
    fn first_non_blank_line_wins() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::write(temp.path().join("version.txt"), "\n  abc1234  \ndeadbee\n")
            .expect("marker should be written");
        assert_eq!(read_recorded_revision(temp.path()), "abc1234");
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        write_revision(temp.path(), "abc1234").expect("marker should be written");
        assert_eq!(read_recorded_revision(temp.path()), "abc1234");

        write_revision(temp.path(), "f00ba47").expect("marker should be overwritten");
        assert_eq!(read_recorded_revision(temp.path()), "f00ba47");
    }

    #[test]
    fn shorten_revision_truncates_long_identifiers() {
        assert_eq!(shorten_revision("0123456789abcdef"), "0123456");
        assert_eq!(shorten_revision("abc1234"), "abc1234");
        assert_eq!(shorten_revision("ab"), "ab");
    }

    #[test]
    fn shorten_revision_truncates_on_character_boundaries() {
        assert_eq!(shorten_revision("éclairage"), "éclaira");
        assert_eq!(shorten_revision("ééééé"), "ééééé");
        assert_eq!(shorten_revision("ééééééé"), "ééééééé");
        assert_eq!(shorten_revision("éééééééé"), "ééééééé");
    }

    #[test]
    fn parse_lenient_fills_missing_components() {
        assert_eq!(
            parse_lenient("4"),
            Some(semver::Version::new(4, 0, 0)),
        );
        assert_eq!(
            parse_lenient("4.37"),
            Some(semver::Version::new(4, 37, 0)),
        );
        assert_eq!(
            parse_lenient("4.37.1"),
            Some(semver::Version::new(4, 37, 1)),
        );
        assert!(parse_lenient("").is_none());
        assert!(parse_lenient("not-a-version").is_none());
        assert!(parse_lenient("1.2.3.4").is_none());
    }
}
