use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsFileError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SettingsFileError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// A JSON settings file split into namespaces.
///
/// The file holds one object per namespace; a handle only reads and writes
/// keys inside its own namespace and leaves the others untouched. Every
/// write replaces the file atomically and is flushed to disk before
/// returning.
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    namespace: String,
    document: Map<String, Value>,
}

impl SettingsFile {
    /// Open the settings file at `path`, scoped to `namespace`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file also
    /// starts empty, and is overwritten by the next successful write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        let path = path.into();
        let document = load_document(&path);
        Self {
            path,
            namespace: namespace.into(),
            document,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.document
            .get(&self.namespace)
            .and_then(Value::as_object)
            .and_then(|group| group.get(key))
            .and_then(Value::as_bool)
    }

    /// Store `value` under `key` and persist the whole file.
    ///
    /// The in-memory copy only changes once the file has been replaced.
    ///
    /// # Errors
    /// Returns an error when the settings directory cannot be created or
    /// the file cannot be written, synced, or renamed into place.
    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<(), SettingsFileError> {
        let mut document = self.document.clone();
        let group = document
            .entry(self.namespace.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !group.is_object() {
            *group = Value::Object(Map::new());
        }
        if let Value::Object(group) = group {
            group.insert(key.to_string(), Value::Bool(value));
        }

        write_atomically(&self.path, &document)?;
        debug!(
            "Persisted {}.{key} = {value} to {}",
            self.namespace,
            self.path.display()
        );
        self.document = document;
        Ok(())
    }
}

fn load_document(path: &Path) -> Map<String, Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Map::new(),
        Err(error) => {
            warn!("Failed to read settings file {}: {error}", path.display());
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(document)) => document,
        Ok(_) => {
            warn!(
                "Settings file {} is not a JSON object, ignoring it",
                path.display()
            );
            Map::new()
        }
        Err(error) => {
            warn!("Settings file {} is corrupt: {error}", path.display());
            Map::new()
        }
    }
}

fn write_atomically(path: &Path, document: &Map<String, Value>) -> Result<(), SettingsFileError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|error| SettingsFileError::io("failed to create settings directory", error))?;

    let content = serde_json::to_string_pretty(document)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|error| SettingsFileError::io("failed to create temporary settings file", error))?;
    temp.write_all(content.as_bytes())
        .map_err(|error| SettingsFileError::io("failed to write settings", error))?;
    temp.as_file()
        .sync_all()
        .map_err(|error| SettingsFileError::io("failed to sync settings", error))?;
    temp.persist(path)
        .map_err(|error| SettingsFileError::io("failed to replace settings file", error.error))?;
    Ok(())
}
