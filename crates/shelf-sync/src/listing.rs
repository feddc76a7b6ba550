use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

pub const MASTER_LABEL: &str = "Master Library";
pub const USER_LABEL: &str = "User Library";

/// Filesystem-change watcher boundary. The engine only reports which
/// directories exist; observing them is the collaborator's concern.
pub trait DirectoryWatcher: Send + Sync {
    fn watch_dirs(&self, dirs: &HashSet<PathBuf>);
}

/// Watcher that ignores every report.
pub struct NullWatcher;

impl DirectoryWatcher for NullWatcher {
    fn watch_dirs(&self, _dirs: &HashSet<PathBuf>) {}
}

/// One node of the library content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEntry {
    Dir {
        name: String,
        path: PathBuf,
        children: Vec<LibraryEntry>,
    },
    File {
        name: String,
        path: PathBuf,
    },
}

impl LibraryEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Dir { name, .. } | Self::File { name, .. } => name,
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir { .. })
    }
}

/// Root nodes for the two configured library roots.
///
/// An empty node means the directory is genuinely empty (or absent); an
/// unreadable tree is reported as an error instead, so callers can tell
/// "empty" and "unavailable" apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryListing {
    pub master: LibraryEntry,
    pub user: LibraryEntry,
}

/// Walk both library roots into a listing and report every directory seen to
/// the watcher. Runs on the update queue to avoid observing a half-written
/// tree during a concurrent update. Dot-prefixed names and symlinks are
/// excluded from the walk.
///
/// # Errors
/// Returns an error when a directory inside an existing root cannot be read.
/// A missing root is not an error; it yields an empty node.
pub fn collect_listing(
    master_root: &Path,
    user_root: &Path,
    watcher: &dyn DirectoryWatcher,
) -> Result<LibraryListing, SyncError> {
    let mut dirs = HashSet::new();
    let master = list_root(MASTER_LABEL, master_root, &mut dirs)?;
    let user = list_root(USER_LABEL, user_root, &mut dirs)?;
    watcher.watch_dirs(&dirs);
    Ok(LibraryListing { master, user })
}

fn list_root(
    label: &str,
    root: &Path,
    dirs: &mut HashSet<PathBuf>,
) -> Result<LibraryEntry, SyncError> {
    let children = if root.is_dir() {
        dirs.insert(root.to_path_buf());
        list_children(root, dirs)?
    } else {
        Vec::new()
    };
    Ok(LibraryEntry::Dir {
        name: label.to_string(),
        path: root.to_path_buf(),
        children,
    })
}

fn list_children(dir: &Path, dirs: &mut HashSet<PathBuf>) -> Result<Vec<LibraryEntry>, SyncError> {
    let mut children = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|error| SyncError::io_with_path("failed to read library directory", dir, &error))?;
    for entry in entries {
        let entry = entry.map_err(|error| {
            SyncError::io_with_path("failed to read library directory entry", dir, &error)
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(|error| {
            SyncError::io_with_path("failed to read library directory entry", dir, &error)
        })?;
        // Symlinks are never followed: a link cycle would recurse forever
        // and a link out of the root would leak foreign directories to the
        // watcher.
        if file_type.is_symlink() {
            continue;
        }
        let path = entry.path();
        if file_type.is_dir() {
            dirs.insert(path.clone());
            let nested = list_children(&path, dirs)?;
            children.push(LibraryEntry::Dir {
                name,
                path,
                children: nested,
            });
        } else {
            children.push(LibraryEntry::File { name, path });
        }
    }
    children.sort_by(|a, b| {
        (!a.is_dir(), a.name().to_lowercase()).cmp(&(!b.is_dir(), b.name().to_lowercase()))
    });
    Ok(children)
}
