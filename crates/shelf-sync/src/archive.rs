use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::version::shorten_revision;

/// Second-level folder inside the archive below which content is mirrored.
pub const LIBRARY_FOLDER: &str = "Library";

const DEFAULT_REVISION: &str = "unknown";

/// Result of one archive extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Revision identifier embedded in the archive's top-level folder name,
    /// shortened to 7 characters. `"unknown"` when no entry carried one.
    pub revision: String,
    pub files_written: usize,
    pub entries_skipped: usize,
}

/// Extract all accepted entries of a zip archive below `dest_root`.
///
/// Entries are accepted only when their path has at least 3 segments, the
/// first segment starts with `root_prefix`, the second equals `inner_folder`,
/// and the declared size is positive. The two leading segments are stripped
/// from the output path. Rejected entries are skipped (and counted), never
/// fatal; directory entries are materialized only as parents of accepted
/// files. A stream that ends before the declared entry size is reached is
/// tolerated.
///
/// # Errors
/// Returns an error when the archive cannot be read or when creating
/// directories or writing files fails. Cleanup of partially written output is
/// the caller's responsibility.
pub fn extract_archive<R: Read + Seek>(
    reader: R,
    dest_root: &Path,
    root_prefix: &str,
    inner_folder: &str,
) -> Result<Extraction, SyncError> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|error| SyncError::archive("failed to open library archive", error))?;

    let mut revision = DEFAULT_REVISION.to_string();
    let mut files_written = 0;
    let mut entries_skipped = 0;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|error| SyncError::archive("failed to read archive entry", error))?;
        if entry.is_dir() {
            continue;
        }

        let Some(relative) = accepted_relative_path(entry.name(), root_prefix, inner_folder)
        else {
            entries_skipped += 1;
            continue;
        };
        if entry.enclosed_name().is_none() {
            log::warn!("Skipping archive entry with unsafe path: {}", entry.name());
            entries_skipped += 1;
            continue;
        }
        let size = entry.size();
        if size < 1 {
            entries_skipped += 1;
            continue;
        }

        revision = entry_revision(entry.name(), root_prefix).unwrap_or(revision);

        let out_path = dest_root.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                SyncError::io_with_path("failed to create library directory", parent, &error)
            })?;
        }
        let mut out_file = std::fs::File::create(&out_path).map_err(|error| {
            SyncError::io_with_path("failed to create library file", &out_path, &error)
        })?;
        // Copy at most the declared byte count; a short read is tolerated.
        std::io::copy(&mut (&mut entry).take(size), &mut out_file).map_err(|error| {
            SyncError::io_with_path("failed to write library file", &out_path, &error)
        })?;
        files_written += 1;
    }

    if entries_skipped > 0 {
        log::info!("Skipped {entries_skipped} archive entries outside the library layout");
    }

    Ok(Extraction {
        revision,
        files_written,
        entries_skipped,
    })
}

/// Validate an entry path and return the output path with the two leading
/// segments stripped, or `None` when the entry must be skipped.
fn accepted_relative_path(name: &str, root_prefix: &str, inner_folder: &str) -> Option<PathBuf> {
    let segments: Vec<&str> = name.split('/').filter(|segment| !segment.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }
    if !segments[0].starts_with(root_prefix) {
        return None;
    }
    if segments[1] != inner_folder {
        return None;
    }
    Some(segments[2..].iter().collect())
}

fn entry_revision(name: &str, root_prefix: &str) -> Option<String> {
    let top = name.split('/').find(|segment| !segment.is_empty())?;
    let revision = top.strip_prefix(root_prefix)?;
    Some(shorten_revision(revision).to_string())
}
