use std::path::Path;

use thiserror::Error;

/// Failure taxonomy for the sync engine.
///
/// Network and filesystem failures during an update are converted into a
/// non-fatal [`crate::session::UpdateOutcome`] by the session layer; they
/// never take down the worker queue.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{context}: HTTP {status}")]
    Http {
        context: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{context}: {source}")]
    Archive {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{context}: {source}")]
    Filesystem {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

impl SyncError {
    pub(crate) fn network(context: &'static str, source: reqwest::Error) -> Self {
        Self::Network { context, source }
    }

    pub(crate) fn http(context: &'static str, status: reqwest::StatusCode) -> Self {
        Self::Http { context, status }
    }

    pub(crate) fn archive(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Archive { context, source }
    }

    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Filesystem { context, source }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SyncError;

    #[test]
    fn filesystem_display_includes_context_and_path() {
        let base = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = SyncError::io_with_path(
            "failed to move library aside",
            std::path::Path::new("/srv/library"),
            &base,
        );

        let rendered = error.to_string();
        assert!(rendered.starts_with("failed to move library aside: "));
        assert!(rendered.contains("/srv/library"));
        assert!(rendered.contains("denied"));
    }

    #[test]
    fn invalid_displays_message_verbatim() {
        let error = SyncError::Invalid("archive contained no library entries".to_string());
        assert_eq!(error.to_string(), "archive contained no library entries");
    }
}
