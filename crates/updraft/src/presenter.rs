use async_trait::async_trait;
use updraft_core::ReleaseCandidate;

/// Text for the "check automatically?" question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPrompt {
    pub title: String,
    pub message: String,
    pub accept_label: String,
    pub decline_label: String,
}

impl PermissionPrompt {
    #[must_use]
    pub fn for_app(app_name: &str) -> Self {
        Self {
            title: "Check for updates automatically?".to_string(),
            message: format!(
                "Should {app_name} automatically check for updates? \
                 You can always check for updates manually from the menu."
            ),
            accept_label: "Check automatically".to_string(),
            decline_label: "Don't check".to_string(),
        }
    }
}

/// The application's user-facing side of update checks.
///
/// Signals arrive in order for each check: `check_started` first, then
/// exactly one of `check_failed`, `up_to_date` or `update_available`.
/// Automatic checks only surface `update_available`, plus
/// `check_failed_quietly` for failures.
#[async_trait]
pub trait UpdatePresenter: Send + Sync {
    fn check_started(&self) {}

    fn check_failed(&self, reason: &str);

    /// An automatic check failed. Nothing should be shown to the user;
    /// this exists for the application's own diagnostics.
    fn check_failed_quietly(&self, _reason: &str) {}

    fn up_to_date(&self);

    fn update_available(&self, release: &ReleaseCandidate);

    /// Ask whether updates should be checked automatically.
    async fn ask_permission(&self, prompt: &PermissionPrompt) -> bool;
}
