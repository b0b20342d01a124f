use log::{debug, info};
use updraft_core::{PreferenceError, PreferenceKey, PreferenceState, PreferenceStore};

/// What the application should do right after launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupPlan {
    /// Ask the user whether to check for updates automatically.
    pub ask_permission: bool,
    /// Run one quiet check.
    pub auto_check: bool,
}

/// Startup and consent rules over the persisted [`PreferenceState`].
///
/// The first launch never prompts; the prompt is deferred to the second
/// launch so new users are not greeted by a dialog.
pub struct PermissionPolicy<S> {
    store: S,
}

impl<S: PreferenceStore> PermissionPolicy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn preferences(&self) -> PreferenceState {
        self.store.state()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Decide the startup actions and clear the first-boot flag.
    ///
    /// The flag is written through the store before the plan is returned,
    /// so the next process start sees it cleared.
    ///
    /// # Errors
    /// Returns an error when the first-boot flag cannot be persisted.
    pub fn evaluate_startup(&mut self) -> Result<StartupPlan, PreferenceError> {
        let prefs = self.store.state();
        let plan = StartupPlan {
            ask_permission: !prefs.asked_permission && !prefs.first_boot,
            auto_check: prefs.check_automatically,
        };

        if prefs.first_boot {
            self.store.set(PreferenceKey::FirstBoot, false)?;
            info!("First launch recorded; automatic update checks stay off until the user opts in");
        }

        debug!("Startup plan {plan:?} from {prefs:?}");
        Ok(plan)
    }

    /// Persist the user's answer to the permission prompt.
    ///
    /// Returns whether a quiet check should run now. The answer is stored
    /// before the asked flag; if it cannot be stored the prompt stays pending.
    ///
    /// # Errors
    /// Returns an error when either preference cannot be persisted.
    pub fn record_permission(&mut self, allowed: bool) -> Result<bool, PreferenceError> {
        self.store.set(PreferenceKey::CheckAutomatically, allowed)?;
        self.store.set(PreferenceKey::AskedPermission, true)?;
        info!(
            "Automatic update checks {} by user",
            if allowed { "enabled" } else { "declined" }
        );
        Ok(allowed)
    }

    /// Apply an explicit choice from a settings screen.
    ///
    /// The choice also counts as an answer, so the prompt is not shown later.
    ///
    /// # Errors
    /// Returns an error when either preference cannot be persisted.
    pub fn set_check_automatically(&mut self, enabled: bool) -> Result<(), PreferenceError> {
        self.store.set(PreferenceKey::CheckAutomatically, enabled)?;
        if !self.store.get(PreferenceKey::AskedPermission) {
            self.store.set(PreferenceKey::AskedPermission, true)?;
        }
        Ok(())
    }
}
