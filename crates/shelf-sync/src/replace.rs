use std::ffi::OsString;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::archive::{Extraction, extract_archive};
use crate::error::SyncError;
use crate::version::write_revision;

/// Sibling directory holding the previous library content while an update
/// attempt is in flight.
#[must_use]
pub fn backup_path(root: &Path) -> PathBuf {
    sibling_with_suffix(root, ".save")
}

fn lock_path(root: &Path) -> PathBuf {
    sibling_with_suffix(root, ".lock")
}

fn sibling_with_suffix(root: &Path, suffix: &str) -> PathBuf {
    let mut name = root
        .file_name()
        .map_or_else(|| OsString::from("library"), OsString::from);
    name.push(suffix);
    root.with_file_name(name)
}

/// Replace the library at `root` with the contents of `archive`, atomically
/// from an outside observer's point of view.
///
/// The previous content is moved aside to [`backup_path`] before extraction
/// begins. On success the version marker is written and the backup removed;
/// on any failure the partial output is deleted and the backup moved back,
/// so `root` is only ever observed as old content, new content, or a freshly
/// empty directory. An advisory lock on a `.lock` sibling file guards against
/// a second process running the same protocol concurrently. The lock file is
/// a permanent sibling of the root, reused across runs: deleting it after an
/// attempt would let a process that already opened it race one that opens a
/// fresh file. The lock itself is released when the holding process exits,
/// so a leftover `.lock` from a crashed run never blocks a later attempt.
///
/// # Errors
/// Returns an error when the lock is already held, when the previous content
/// cannot be moved aside (in which case nothing else is attempted), or when
/// the download/extraction fails (after the prior state has been restored).
pub fn replace_root<R: Read + Seek>(
    root: &Path,
    archive: R,
    root_prefix: &str,
    inner_folder: &str,
) -> Result<Extraction, SyncError> {
    if let Some(parent) = root.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|error| {
            SyncError::io_with_path("failed to create library parent directory", parent, &error)
        })?;
    }

    let lock_file_path = lock_path(root);
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_file_path)
        .map_err(|error| {
            SyncError::io_with_path("failed to open library lock file", &lock_file_path, &error)
        })?;
    match lock_file.try_lock_exclusive() {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
            return Err(SyncError::io(
                "another update is already running against this library root",
                error,
            ));
        }
        Err(error) => {
            return Err(SyncError::io_with_path(
                "failed to lock library root",
                &lock_file_path,
                &error,
            ));
        }
    }
    // Lock released when `lock_file` drops at the end of the attempt.

    let backup = backup_path(root);
    if root.exists() {
        std::fs::rename(root, &backup).map_err(|error| {
            SyncError::io_with_path("failed to move library aside", root, &error)
        })?;
    }

    match extract_and_record(root, archive, root_prefix, inner_folder) {
        Ok(extraction) => {
            if backup.exists()
                && let Err(error) = std::fs::remove_dir_all(&backup)
            {
                log::warn!("Failed to remove library backup {}: {error}", backup.display());
            }
            log::info!(
                "Library updated to {} ({} files)",
                extraction.revision,
                extraction.files_written
            );
            Ok(extraction)
        }
        Err(error) => {
            restore_previous(root, &backup);
            Err(error)
        }
    }
}

fn extract_and_record<R: Read + Seek>(
    root: &Path,
    archive: R,
    root_prefix: &str,
    inner_folder: &str,
) -> Result<Extraction, SyncError> {
    std::fs::create_dir_all(root).map_err(|error| {
        SyncError::io_with_path("failed to create library directory", root, &error)
    })?;
    let extraction = extract_archive(archive, root, root_prefix, inner_folder)?;
    write_revision(root, &extraction.revision)?;
    Ok(extraction)
}

/// Failure path: discard whatever was partially written and put the previous
/// content back. When there was nothing to restore (a first-time install),
/// leave an empty root behind instead.
fn restore_previous(root: &Path, backup: &Path) {
    if root.exists()
        && let Err(error) = std::fs::remove_dir_all(root)
    {
        log::error!("Failed to remove partial library {}: {error}", root.display());
    }
    if backup.exists() {
        if let Err(error) = std::fs::rename(backup, root) {
            log::error!(
                "Failed to restore library backup {}: {error}",
                backup.display()
            );
        }
    } else if let Err(error) = std::fs::create_dir_all(root) {
        log::error!("Failed to recreate library {}: {error}", root.display());
    }
}
