mod paths;
mod settings_file;

pub use paths::{AppPaths, AppPathsError};
pub use settings_file::{SettingsFile, SettingsFileError};
