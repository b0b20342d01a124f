use std::collections::HashMap;

use thiserror::Error;
use updraft_platform::{SettingsFile, SettingsFileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    CheckAutomatically,
    FirstBoot,
    AskedPermission,
}

impl PreferenceKey {
    pub const ALL: [Self; 3] = [
        Self::CheckAutomatically,
        Self::FirstBoot,
        Self::AskedPermission,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckAutomatically => "check_automatically",
            Self::FirstBoot => "first_boot",
            Self::AskedPermission => "asked_permission",
        }
    }

    /// Value reported when the store has never seen this key.
    #[must_use]
    pub const fn default_value(self) -> bool {
        matches!(self, Self::FirstBoot)
    }
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to persist preference '{key}': {source}")]
    Persist {
        key: &'static str,
        #[source]
        source: SettingsFileError,
    },
    #[error("preference store is read-only")]
    ReadOnly,
}

/// Snapshot of the updater's persisted preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PreferenceState {
    pub check_automatically: bool,
    pub first_boot: bool,
    pub asked_permission: bool,
}

impl Default for PreferenceState {
    fn default() -> Self {
        Self {
            check_automatically: PreferenceKey::CheckAutomatically.default_value(),
            first_boot: PreferenceKey::FirstBoot.default_value(),
            asked_permission: PreferenceKey::AskedPermission.default_value(),
        }
    }
}

/// Durable key/value settings scoped to the updater.
///
/// `set` must not return before the value is durable, so a later process
/// start always observes it.
pub trait PreferenceStore: Send {
    fn get(&self, key: PreferenceKey) -> bool;

    /// Persist `value` for `key`.
    ///
    /// # Errors
    /// Returns an error when the value could not be made durable.
    fn set(&mut self, key: PreferenceKey, value: bool) -> Result<(), PreferenceError>;

    fn state(&self) -> PreferenceState {
        PreferenceState {
            check_automatically: self.get(PreferenceKey::CheckAutomatically),
            first_boot: self.get(PreferenceKey::FirstBoot),
            asked_permission: self.get(PreferenceKey::AskedPermission),
        }
    }
}

impl PreferenceStore for SettingsFile {
    fn get(&self, key: PreferenceKey) -> bool {
        self.get_bool(key.as_str())
            .unwrap_or_else(|| key.default_value())
    }

    fn set(&mut self, key: PreferenceKey, value: bool) -> Result<(), PreferenceError> {
        self.set_bool(key.as_str(), value)
            .map_err(|source| PreferenceError::Persist {
                key: key.as_str(),
                source,
            })
    }
}

/// In-memory store for tests and embedders that handle persistence elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: HashMap<PreferenceKey, bool>,
    writes: Vec<(PreferenceKey, bool)>,
    read_only: bool,
    rejected: Option<PreferenceKey>,
}

impl MemoryPreferenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: PreferenceState) -> Self {
        let mut store = Self::default();
        store
            .values
            .insert(PreferenceKey::CheckAutomatically, state.check_automatically);
        store.values.insert(PreferenceKey::FirstBoot, state.first_boot);
        store
            .values
            .insert(PreferenceKey::AskedPermission, state.asked_permission);
        store
    }

    /// Make every subsequent `set` fail, to exercise persistence errors.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Make writes to `key` fail while other keys still persist.
    #[must_use]
    pub fn rejecting(mut self, key: PreferenceKey) -> Self {
        self.rejected = Some(key);
        self
    }

    /// Every successful write, in order.
    #[must_use]
    pub fn writes(&self) -> &[(PreferenceKey, bool)] {
        &self.writes
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: PreferenceKey) -> bool {
        self.values
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    fn set(&mut self, key: PreferenceKey, value: bool) -> Result<(), PreferenceError> {
        if self.read_only || self.rejected == Some(key) {
            return Err(PreferenceError::ReadOnly);
        }
        self.values.insert(key, value);
        self.writes.push((key, value));
        Ok(())
    }
}
