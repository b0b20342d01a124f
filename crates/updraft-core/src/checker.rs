//! Single-flight update check state machine.
//!
//! A check walks `Idle → Fetching → Parsing → Comparing` and ends in exactly
//! one [`CheckResult`]. The checker hands out at most one [`CheckSession`]
//! at a time; the session returns the checker to `Idle` when it is dropped,
//! whether it ran to completion or was abandoned mid-fetch.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use reqwest::Url;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::appcast::{self, ParseError, ReleaseCandidate};
use crate::fetch::{FeedFetcher, FetchError};
use crate::version::{Version, VersionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Idle,
    Fetching,
    Parsing,
    Comparing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("an update check is already in progress")]
    AlreadyChecking,
}

/// Why a check ended in [`CheckResult::Failed`].
///
/// The `Display` output is the human-readable reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("cannot compare against the running version: {0}")]
    InvalidVersion(#[from] VersionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Failed(CheckFailure),
    UpToDate,
    UpdateAvailable(ReleaseCandidate),
}

/// Lifecycle signal for whoever presents a check to the user.
///
/// Every session sends `Started` followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckEvent {
    Started,
    Failed(String),
    UpToDate,
    UpdateAvailable(ReleaseCandidate),
}

impl From<&CheckResult> for CheckEvent {
    fn from(result: &CheckResult) -> Self {
        match result {
            CheckResult::Failed(failure) => Self::Failed(failure.to_string()),
            CheckResult::UpToDate => Self::UpToDate,
            CheckResult::UpdateAvailable(candidate) => Self::UpdateAvailable(candidate.clone()),
        }
    }
}

pub struct UpdateChecker {
    fetcher: Arc<dyn FeedFetcher>,
    current_version: String,
    state: Arc<Mutex<CheckState>>,
}

impl UpdateChecker {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, current_version: impl Into<String>) -> Self {
        Self {
            fetcher,
            current_version: current_version.into(),
            state: Arc::new(Mutex::new(CheckState::Idle)),
        }
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Change the version later sessions compare against.
    pub fn set_current_version(&mut self, version: impl Into<String>) {
        self.current_version = version.into();
    }

    #[must_use]
    pub fn state(&self) -> CheckState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the checker for one session against `url`.
    ///
    /// Nothing is fetched until [`CheckSession::run`] is awaited.
    ///
    /// # Errors
    /// Returns [`CheckError::AlreadyChecking`] while another session is
    /// alive; that session is left untouched.
    pub fn check(&self, url: Url, quiet: bool) -> Result<CheckSession, CheckError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != CheckState::Idle {
                debug!("Rejecting update check for {url}: already {:?}", *state);
                return Err(CheckError::AlreadyChecking);
            }
            *state = CheckState::Fetching;
        }

        debug!("Update check started for {url} (quiet: {quiet})");
        Ok(CheckSession {
            fetcher: Arc::clone(&self.fetcher),
            url,
            quiet,
            current_version: self.current_version.clone(),
            state: Arc::clone(&self.state),
            events: None,
        })
    }

    /// Start a session and run it to completion.
    ///
    /// # Errors
    /// Returns [`CheckError::AlreadyChecking`] while another session is alive.
    pub async fn check_now(&self, url: Url, quiet: bool) -> Result<CheckResult, CheckError> {
        Ok(self.check(url, quiet)?.run().await)
    }
}

/// One in-flight check. Dropping it releases the checker.
pub struct CheckSession {
    fetcher: Arc<dyn FeedFetcher>,
    url: Url,
    quiet: bool,
    current_version: String,
    state: Arc<Mutex<CheckState>>,
    events: Option<mpsc::Sender<CheckEvent>>,
}

impl CheckSession {
    /// Forward lifecycle events to `events` while the session runs.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<CheckEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Drive the session to its terminal result.
    pub async fn run(self) -> CheckResult {
        self.emit(CheckEvent::Started).await;

        let result = self.drive().await;
        match &result {
            CheckResult::Failed(failure) if self.quiet => {
                warn!("Automatic update check failed: {failure}");
            }
            CheckResult::Failed(failure) => warn!("Update check failed: {failure}"),
            CheckResult::UpToDate => info!("Application is up to date ({})", self.current_version),
            CheckResult::UpdateAvailable(candidate) => info!(
                "Update available: {} -> {}",
                self.current_version,
                candidate.version()
            ),
        }

        self.emit(CheckEvent::from(&result)).await;
        result
    }

    async fn drive(&self) -> CheckResult {
        let document = match self.fetcher.fetch(&self.url).await {
            Ok(document) => document,
            Err(error) => return CheckResult::Failed(error.into()),
        };

        self.transition(CheckState::Parsing);
        let candidates = match appcast::parse(document) {
            Ok(candidates) => candidates,
            Err(error) => return CheckResult::Failed(error.into()),
        };

        self.transition(CheckState::Comparing);
        let current = match Version::parse(&self.current_version) {
            Ok(version) => version,
            Err(error) => return CheckResult::Failed(error.into()),
        };
        let Some(best) = select_best(candidates) else {
            return CheckResult::Failed(ParseError::NoCandidates.into());
        };

        if best.version() > &current {
            CheckResult::UpdateAvailable(best)
        } else {
            CheckResult::UpToDate
        }
    }

    fn transition(&self, next: CheckState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Update check {:?} -> {next:?}", *state);
        *state = next;
    }

    async fn emit(&self, event: CheckEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}

impl Drop for CheckSession {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = CheckState::Idle;
    }
}

/// Highest version wins; on ties the earliest candidate is kept.
#[must_use]
pub fn select_best(candidates: Vec<ReleaseCandidate>) -> Option<ReleaseCandidate> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(best) if candidate.version() <= best.version() => Some(best),
        _ => Some(candidate),
    })
}
