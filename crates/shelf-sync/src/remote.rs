use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::session::UpdateProgress;
use crate::version::{parse_lenient, shorten_revision};

const USER_AGENT: &str = concat!("shelf/", env!("CARGO_PKG_VERSION"));
const ARCHIVE_FILE_NAME: &str = "library.zip";

/// Remote repository the library content is mirrored from.
///
/// The base URLs default to the public GitHub endpoints and exist as fields
/// so tests can point the client at a local server.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub api_base_url: String,
    pub raw_base_url: String,
}

impl Default for RemoteSource {
    fn default() -> Self {
        Self {
            owner: "richardwilkes".to_string(),
            repo: "gcs_library".to_string(),
            branch: "master".to_string(),
            api_base_url: "https://api.github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

impl RemoteSource {
    /// Top-level folder prefix of the repository's zipball
    /// (`<owner>-<repo>-<revision>`).
    #[must_use]
    pub fn root_prefix(&self) -> String {
        format!("{}-{}-", self.owner, self.repo)
    }

    fn commits_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/commits?per_page=1",
            self.api_base_url, self.owner, self.repo
        )
    }

    fn minimum_version_url(&self) -> String {
        format!(
            "{}/{}/{}/{}/minimum_version.txt",
            self.raw_base_url, self.owner, self.repo, self.branch
        )
    }

    fn zipball_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/zipball/{}",
            self.api_base_url, self.owner, self.repo, self.branch
        )
    }
}

#[derive(Deserialize)]
struct CommitInfo {
    sha: String,
}

pub struct RemoteClient {
    client: reqwest::Client,
    source: RemoteSource,
}

impl RemoteClient {
    #[must_use]
    pub fn new(client: reqwest::Client, source: RemoteSource) -> Self {
        Self { client, source }
    }

    #[must_use]
    pub fn source(&self) -> &RemoteSource {
        &self.source
    }

    /// Most recent revision identifier on the remote, shortened to 7
    /// characters.
    ///
    /// Returns an empty string on any network or parse failure; callers must
    /// treat that as "unknown", never as "up to date".
    pub async fn fetch_latest_revision(&self) -> String {
        match self.latest_revision().await {
            Ok(revision) => revision,
            Err(error) => {
                log::error!("Failed to fetch latest library revision: {error}");
                String::new()
            }
        }
    }

    async fn latest_revision(&self) -> Result<String, SyncError> {
        let response = self
            .client
            .get(self.source.commits_url())
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|error| SyncError::network("failed to query latest revision", error))?;
        if !response.status().is_success() {
            return Err(SyncError::http("revision query failed", response.status()));
        }
        let commits: Vec<CommitInfo> = response
            .json()
            .await
            .map_err(|error| SyncError::network("failed to parse revision response", error))?;
        let sha = commits
            .first()
            .map(|commit| commit.sha.as_str())
            .unwrap_or_default();
        Ok(shorten_revision(sha).to_string())
    }

    /// Minimum application version the remote content requires, or `None`
    /// when the marker cannot be fetched or parsed.
    pub async fn fetch_minimum_app_version(&self) -> Option<semver::Version> {
        match self.minimum_version_text().await {
            Ok(text) => first_non_blank_line(&text).and_then(parse_lenient),
            Err(error) => {
                log::error!("Failed to fetch minimum app version: {error}");
                None
            }
        }
    }

    async fn minimum_version_text(&self) -> Result<String, SyncError> {
        let response = self
            .client
            .get(self.source.minimum_version_url())
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|error| SyncError::network("failed to query minimum version", error))?;
        if !response.status().is_success() {
            return Err(SyncError::http(
                "minimum version query failed",
                response.status(),
            ));
        }
        response
            .text()
            .await
            .map_err(|error| SyncError::network("failed to read minimum version", error))
    }

    /// Stream the library zipball into `dest_dir`, emitting download progress.
    ///
    /// # Errors
    /// Any network or write failure is a hard error; there is no silent
    /// partial success.
    pub async fn download_archive(
        &self,
        dest_dir: &Path,
        progress: &mpsc::Sender<UpdateProgress>,
    ) -> Result<PathBuf, SyncError> {
        let url = self.source.zipball_url();
        log::info!("Downloading library archive from {url}");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|error| SyncError::network("archive download request failed", error))?;
        if !response.status().is_success() {
            return Err(SyncError::http("archive download failed", response.status()));
        }

        let total = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;

        let dest = dest_dir.join(ARCHIVE_FILE_NAME);
        let mut file = tokio::fs::File::create(&dest).await.map_err(|error| {
            SyncError::io_with_path("failed to create archive file", &dest, &error)
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|error| SyncError::network("archive download stream error", error))?;
            file.write_all(&chunk).await.map_err(|error| {
                SyncError::io_with_path("failed to write archive data", &dest, &error)
            })?;
            downloaded += chunk.len() as u64;
            let _ = progress
                .send(UpdateProgress::Downloading { downloaded, total })
                .await;
        }

        file.flush().await.map_err(|error| {
            SyncError::io_with_path("failed to flush archive file", &dest, &error)
        })?;

        log::info!("Archive download complete: {downloaded} bytes");
        Ok(dest)
    }
}

fn first_non_blank_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
}
