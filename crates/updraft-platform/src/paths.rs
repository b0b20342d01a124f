use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine local data directory")]
    DataDirUnavailable,
    #[error("Application name must be a single non-empty path component")]
    InvalidAppName,
}

/// Where the updater keeps its files for one application.
///
/// Preferences and the updater config live in `config_dir`; the diagnostic
/// log lives in `log_dir`. Both are scoped to the embedding application's
/// name, so two applications using the updater never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Resolve the platform directories for `app_name`.
    ///
    /// macOS uses `~/Library/Application Support/<app>` and
    /// `~/Library/Logs/<app>`; elsewhere the user config directory and a
    /// `logs` folder under the local data directory.
    ///
    /// # Errors
    /// Returns an error when `app_name` is not a plain directory name, or
    /// when the user's base directories cannot be determined.
    pub fn for_app(app_name: &str) -> Result<Self, AppPathsError> {
        if !is_plain_component(app_name) {
            return Err(AppPathsError::InvalidAppName);
        }

        #[cfg(target_os = "macos")]
        {
            let library = dirs::home_dir()
                .ok_or(AppPathsError::HomeDirUnavailable)?
                .join("Library");
            Ok(Self {
                config_dir: library.join("Application Support").join(app_name),
                log_dir: library.join("Logs").join(app_name),
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            let config_root = dirs::config_dir().ok_or(AppPathsError::ConfigDirUnavailable)?;
            let data_root = dirs::data_local_dir().ok_or(AppPathsError::DataDirUnavailable)?;
            Ok(Self {
                config_dir: config_root.join(app_name),
                log_dir: data_root.join(app_name).join("logs"),
            })
        }
    }

    /// Keep everything under a single directory, e.g. a portable install.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            log_dir: root.join("logs"),
        }
    }

    /// Durable preference flags (`check_automatically`, `first_boot`, ...).
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("updater.json")
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("updater-config.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("updraft.log")
    }

    /// Create the config and log directories.
    ///
    /// # Errors
    /// Returns an error if either directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        if self.log_dir != self.config_dir {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }
}

fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
