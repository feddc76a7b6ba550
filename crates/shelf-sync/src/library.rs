use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::listing::{DirectoryWatcher, LibraryListing, collect_listing};
use crate::queue::UpdateQueue;
use crate::remote::{RemoteClient, RemoteSource};
use crate::session::{UpdateOutcome, UpdateProgress, UpdateSession};
use crate::version::read_recorded_revision;

const HTTP_TIMEOUT: Duration = Duration::from_secs(600);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The two configured library roots. The master root is the mirrored one;
/// the user root only participates in listings.
#[derive(Debug, Clone)]
pub struct LibraryRoots {
    pub master: PathBuf,
    pub user: PathBuf,
}

/// Facade over the sync engine for one library.
///
/// Owns the update queue, so every mutating operation and every listing
/// against these roots is serialized. Independent `Library` values do not
/// share any state.
pub struct Library {
    roots: LibraryRoots,
    source: RemoteSource,
    client: reqwest::Client,
    staging_dir: PathBuf,
    queue: UpdateQueue,
}

impl Library {
    /// # Panics
    /// Panics when called outside a tokio runtime (the queue worker is
    /// spawned here).
    #[must_use]
    pub fn new(roots: LibraryRoots, source: RemoteSource, staging_dir: PathBuf) -> Self {
        let client = match reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(error) => {
                log::warn!("Failed to build HTTP client, using defaults: {error}");
                reqwest::Client::new()
            }
        };
        Self {
            roots,
            source,
            client,
            staging_dir,
            queue: UpdateQueue::new(),
        }
    }

    #[must_use]
    pub fn roots(&self) -> &LibraryRoots {
        &self.roots
    }

    fn remote_client(&self) -> RemoteClient {
        RemoteClient::new(self.client.clone(), self.source.clone())
    }

    /// Revision currently recorded at the master root; empty when the
    /// library has not been installed yet.
    #[must_use]
    pub fn recorded_revision(&self) -> String {
        read_recorded_revision(&self.roots.master)
    }

    /// Latest revision on the remote; empty when it cannot be determined.
    pub async fn latest_revision(&self) -> String {
        self.remote_client().fetch_latest_revision().await
    }

    /// Minimum application version the remote content requires.
    pub async fn minimum_app_version(&self) -> Option<semver::Version> {
        self.remote_client().fetch_minimum_app_version().await
    }

    /// Whether an update would change the installed content. An unknown
    /// remote revision never reads as "up to date" for an uninstalled
    /// library, and never forces an update for an installed one.
    pub async fn needs_update(&self) -> bool {
        needs_update_for(&self.recorded_revision(), &self.latest_revision().await)
    }

    /// Queue an update session and wait for its terminal outcome.
    pub async fn update(&self, events: mpsc::Sender<UpdateProgress>) -> UpdateOutcome {
        let session = UpdateSession::new(
            self.remote_client(),
            self.roots.master.clone(),
            self.staging_dir.clone(),
            events,
        );
        match self.queue.submit(session.run()).await {
            Ok(outcome) => outcome,
            Err(_) => UpdateOutcome::Failure {
                message: "update queue shut down before the task completed".to_string(),
            },
        }
    }

    /// Run an update only when no revision is recorded locally.
    pub async fn update_if_missing(&self, events: mpsc::Sender<UpdateProgress>) -> UpdateOutcome {
        let recorded = self.recorded_revision();
        if recorded.is_empty() {
            self.update(events).await
        } else {
            UpdateOutcome::Success { revision: recorded }
        }
    }

    /// Queue a listing of both roots, reporting directories to `watcher`.
    ///
    /// # Errors
    /// Returns an error when a root's tree cannot be read; callers must
    /// treat that as "unavailable", not as "the library is empty".
    pub async fn collect(
        &self,
        watcher: Arc<dyn DirectoryWatcher>,
    ) -> Result<LibraryListing, SyncError> {
        let roots = self.roots.clone();
        let task = async move { collect_listing(&roots.master, &roots.user, watcher.as_ref()) };
        match self.queue.submit(task).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Invalid(
                "update queue shut down before the listing completed".to_string(),
            )),
        }
    }
}

/// Pure form of the update decision: blank recorded revision means "not
/// installed", and a known, differing remote revision means "stale".
#[must_use]
pub fn needs_update_for(recorded: &str, latest: &str) -> bool {
    if recorded.is_empty() {
        return true;
    }
    !latest.is_empty() && recorded != latest
}
