use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::AppPaths;

/// Persisted user preferences. Unknown fields are ignored and missing fields
/// fall back to defaults, so older settings files keep loading after upgrades.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub master_library_dir: Option<PathBuf>,

    #[serde(default)]
    pub user_library_dir: Option<PathBuf>,

    #[serde(default)]
    pub remote_owner: Option<String>,

    #[serde(default)]
    pub remote_repo: Option<String>,

    #[serde(default)]
    pub remote_branch: Option<String>,

    #[serde(default)]
    pub debug_logging: bool,
}

impl Settings {
    #[must_use]
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from(&paths.settings_file())
    }

    fn load_from(settings_path: &Path) -> Self {
        if !settings_path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(settings_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!(
                    "Failed to parse {}, using defaults: {error}",
                    settings_path.display()
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write the settings back to the platform settings file.
    ///
    /// # Errors
    /// Returns an error when the config directory cannot be created or the
    /// file cannot be written.
    pub fn save(&self, paths: &AppPaths) -> Result<(), std::io::Error> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.settings_file(), content)?;
        Ok(())
    }

    /// Configured master library root, or the platform default.
    #[must_use]
    pub fn master_library_dir(&self, paths: &AppPaths) -> PathBuf {
        self.master_library_dir
            .clone()
            .unwrap_or_else(|| paths.default_master_library_dir())
    }

    /// Configured user library root, or the platform default.
    #[must_use]
    pub fn user_library_dir(&self, paths: &AppPaths) -> PathBuf {
        self.user_library_dir
            .clone()
            .unwrap_or_else(|| paths.default_user_library_dir())
    }
}
