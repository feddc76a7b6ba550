use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::archive::{Extraction, LIBRARY_FOLDER};
use crate::error::SyncError;
use crate::remote::RemoteClient;
use crate::replace::replace_root;

/// Events emitted while an update session runs. The presentation layer
/// consumes these on its own execution context; the worker never waits for
/// rendering.
#[derive(Debug, Clone)]
pub enum UpdateProgress {
    Started,
    Downloading { downloaded: u64, total: u64 },
    Extracting,
    Finished(UpdateOutcome),
}

/// Terminal result of one update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Success { revision: String },
    Failure { message: String },
}

impl UpdateOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Human-readable failure message, if the attempt failed.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message } => Some(message),
        }
    }
}

/// One queued update attempt, split into two explicit phases.
///
/// Phase one downloads the archive to a staging directory and runs the
/// replacement protocol, converting every error into a failure outcome so
/// the queue worker survives. Phase two always follows, reporting the
/// outcome on the event channel. There is no cancellation once phase one
/// has begun; the only abort point is before the session is submitted.
pub struct UpdateSession {
    client: RemoteClient,
    root: PathBuf,
    staging_dir: PathBuf,
    events: mpsc::Sender<UpdateProgress>,
}

impl UpdateSession {
    #[must_use]
    pub fn new(
        client: RemoteClient,
        root: PathBuf,
        staging_dir: PathBuf,
        events: mpsc::Sender<UpdateProgress>,
    ) -> Self {
        Self {
            client,
            root,
            staging_dir,
            events,
        }
    }

    pub async fn run(self) -> UpdateOutcome {
        let outcome = self.download_phase().await;
        self.completion_phase(&outcome).await;
        outcome
    }

    async fn download_phase(&self) -> UpdateOutcome {
        let _ = self.events.send(UpdateProgress::Started).await;
        match self.try_update().await {
            Ok(extraction) => UpdateOutcome::Success {
                revision: extraction.revision,
            },
            Err(error) => {
                log::error!("Library update failed: {error}");
                let mut message = error.to_string();
                if message.is_empty() {
                    message = "unexpected error".to_string();
                }
                UpdateOutcome::Failure { message }
            }
        }
    }

    async fn try_update(&self) -> Result<Extraction, SyncError> {
        std::fs::create_dir_all(&self.staging_dir).map_err(|error| {
            SyncError::io_with_path("failed to create staging directory", &self.staging_dir, &error)
        })?;
        let staging = tempfile::tempdir_in(&self.staging_dir)
            .map_err(|error| SyncError::io("failed to create staging directory", error))?;

        let archive_path = self.client.download_archive(staging.path(), &self.events).await?;

        let _ = self.events.send(UpdateProgress::Extracting).await;
        let archive = std::fs::File::open(&archive_path).map_err(|error| {
            SyncError::io_with_path("failed to open downloaded archive", &archive_path, &error)
        })?;
        replace_root(
            &self.root,
            archive,
            &self.client.source().root_prefix(),
            LIBRARY_FOLDER,
        )
    }

    async fn completion_phase(&self, outcome: &UpdateOutcome) {
        let _ = self
            .events
            .send(UpdateProgress::Finished(outcome.clone()))
            .await;
    }
}
