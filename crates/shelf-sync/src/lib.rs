//! Synchronization engine for a local, versioned mirror of a remote content
//! library.
//!
//! The engine downloads the remote's packaged snapshot, validates and
//! extracts it, and atomically replaces the previous local copy, restoring
//! it when any step fails:
//! - Version bookkeeping via a marker file at the library root.
//! - A single-worker queue serializing every operation against the roots.
//! - An update session split into an explicit download phase and an explicit
//!   completion phase that reports the outcome to the presentation layer.
//! - A read-only directory listing that shares the same queue so it never
//!   observes a half-written tree.

pub mod archive;
pub mod error;
pub mod library;
pub mod listing;
pub mod queue;
pub mod remote;
pub mod replace;
pub mod session;
pub mod version;

pub use error::SyncError;
pub use library::{Library, LibraryRoots, needs_update_for};
pub use listing::{DirectoryWatcher, LibraryEntry, LibraryListing, NullWatcher};
pub use queue::UpdateQueue;
pub use remote::{RemoteClient, RemoteSource};
pub use session::{UpdateOutcome, UpdateProgress, UpdateSession};
