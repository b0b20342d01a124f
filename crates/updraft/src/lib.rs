//! In-application update checks.
//!
//! [`Updater`] is the entry point: it decides at startup whether to ask the
//! user for consent or check quietly, runs manual and periodic checks, and
//! forwards results to the application's [`UpdatePresenter`].
//! [`Updater::bootstrap`] wires it to the on-disk layout from [`AppPaths`]. The engine
//! itself (feed fetching, appcast parsing, version comparison) lives in
//! [`updraft_core`], re-exported here as [`engine`].

pub mod config;
pub mod logging;
pub mod policy;
pub mod presenter;
mod updater;

pub use config::{ConfigError, MAX_CHECK_INTERVAL, UpdaterConfig};
pub use logging::LogSettings;
pub use policy::{PermissionPolicy, StartupPlan};
pub use presenter::{PermissionPrompt, UpdatePresenter};
pub use updater::{Updater, UpdaterError};

pub use updraft_core as engine;
pub use updraft_platform::{AppPaths, SettingsFile};

/// Open the durable preference store for the configured namespace.
#[must_use]
pub fn open_settings(paths: &AppPaths, config: &UpdaterConfig) -> SettingsFile {
    SettingsFile::open(paths.settings_file(), config.settings_namespace.clone())
}
