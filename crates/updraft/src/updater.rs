use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use updraft_core::{
    CheckError, CheckEvent, CheckResult, FeedFetcher, HttpFeedFetcher, PreferenceError,
    PreferenceState, PreferenceStore, UpdateChecker, Url,
};
use updraft_platform::{AppPaths, SettingsFile};

use crate::config::{ConfigError, MAX_CHECK_INTERVAL, UpdaterConfig};
use crate::logging::{LogSettings, init_logging};
use crate::policy::{PermissionPolicy, StartupPlan};
use crate::presenter::{PermissionPrompt, UpdatePresenter};

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to create updater directories: {0}")]
    Directories(#[source] std::io::Error),
}

/// Ties the checker, the startup policy and the presenter together.
pub struct Updater<S, P> {
    config: UpdaterConfig,
    feed_url: Url,
    checker: UpdateChecker,
    policy: Mutex<PermissionPolicy<S>>,
    presenter: Arc<P>,
}

impl<S: PreferenceStore, P: UpdatePresenter> Updater<S, P> {
    /// Build an updater around an existing fetcher.
    ///
    /// # Errors
    /// Returns an error when the configured feed URL is invalid.
    pub fn new(
        config: UpdaterConfig,
        fetcher: Arc<dyn FeedFetcher>,
        store: S,
        presenter: Arc<P>,
    ) -> Result<Self, UpdaterError> {
        let feed_url = config.feed_url()?;
        let checker = UpdateChecker::new(fetcher, config.current_version.clone());
        Ok(Self {
            config,
            feed_url,
            checker,
            policy: Mutex::new(PermissionPolicy::new(store)),
            presenter,
        })
    }

    /// Build an updater that fetches over HTTP with the configured timeout.
    ///
    /// # Errors
    /// Returns an error when the feed URL is invalid or the HTTP client
    /// cannot be built.
    pub fn with_http(
        config: UpdaterConfig,
        store: S,
        presenter: Arc<P>,
    ) -> Result<Self, UpdaterError> {
        let fetcher = HttpFeedFetcher::new(&config.user_agent(), config.http_timeout())?;
        Self::new(config, Arc::new(fetcher), store, presenter)
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    #[must_use]
    pub fn checker(&self) -> &UpdateChecker {
        &self.checker
    }

    #[must_use]
    pub fn preferences(&self) -> PreferenceState {
        self.lock_policy().preferences()
    }

    /// Run the startup policy: maybe ask for consent, maybe check quietly.
    ///
    /// At most one quiet check runs, even when the user has just opted in
    /// and automatic checks were already enabled.
    ///
    /// # Errors
    /// Returns an error when preferences cannot be persisted.
    pub async fn start(&self) -> Result<StartupPlan, UpdaterError> {
        let plan = self.lock_policy().evaluate_startup()?;
        let mut run_quiet_check = plan.auto_check;

        if plan.ask_permission {
            let prompt = PermissionPrompt::for_app(&self.config.app_name);
            let allowed = self.presenter.ask_permission(&prompt).await;
            let check_now = self.lock_policy().record_permission(allowed)?;
            run_quiet_check |= check_now;
        }

        if run_quiet_check && let Err(error) = self.check_quietly().await {
            debug!("Startup update check skipped: {error}");
        }

        Ok(plan)
    }

    /// Check on the user's request; every outcome is presented.
    ///
    /// # Errors
    /// Returns [`CheckError::AlreadyChecking`] while another check runs.
    pub async fn check_now(&self) -> Result<CheckResult, CheckError> {
        self.run_check(false).await
    }

    /// Check in the background; only an available update is presented.
    ///
    /// # Errors
    /// Returns [`CheckError::AlreadyChecking`] while another check runs.
    pub async fn check_quietly(&self) -> Result<CheckResult, CheckError> {
        self.run_check(true).await
    }

    /// Persist the user's settings-screen choice for automatic checks.
    ///
    /// # Errors
    /// Returns an error when the preference cannot be persisted.
    pub fn set_check_automatically(&self, enabled: bool) -> Result<(), PreferenceError> {
        self.lock_policy().set_check_automatically(enabled)
    }

    /// Check quietly every `interval` while automatic checks are enabled.
    ///
    /// The first check happens one full interval after the call; startup
    /// checks belong to [`Updater::start`]. Never returns.
    ///
    /// The interval is clamped to at most [`MAX_CHECK_INTERVAL`].
    pub async fn run_periodic(&self, interval: Duration) {
        let interval = interval.clamp(Duration::from_millis(1), MAX_CHECK_INTERVAL);
        let Some(first_tick) = Instant::now().checked_add(interval) else {
            warn!("Periodic update checks disabled: no tick fits {interval:?} from now");
            return std::future::pending().await;
        };
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.preferences().check_automatically {
                debug!("Periodic update check skipped: automatic checks are off");
                continue;
            }
            if let Err(CheckError::AlreadyChecking) = self.check_quietly().await {
                debug!("Periodic update check skipped: a check is already running");
            }
        }
    }

    async fn run_check(&self, quiet: bool) -> Result<CheckResult, CheckError> {
        let (tx, mut rx) = mpsc::channel(4);
        let session = self
            .checker
            .check(self.feed_url.clone(), quiet)?
            .with_events(tx);

        let forward = async {
            while let Some(event) = rx.recv().await {
                self.present(event, quiet);
            }
        };
        let (result, ()) = tokio::join!(session.run(), forward);
        Ok(result)
    }

    fn present(&self, event: CheckEvent, quiet: bool) {
        match event {
            CheckEvent::Started if quiet => {}
            CheckEvent::Started => self.presenter.check_started(),
            CheckEvent::Failed(reason) if quiet => {
                debug!("Not presenting automatic check failure: {reason}");
                self.presenter.check_failed_quietly(&reason);
            }
            CheckEvent::Failed(reason) => self.presenter.check_failed(&reason),
            CheckEvent::UpToDate if quiet => {}
            CheckEvent::UpToDate => self.presenter.up_to_date(),
            CheckEvent::UpdateAvailable(release) => {
                info!(
                    "Presenting update {} ({})",
                    release.display_version(),
                    release.download_url()
                );
                self.presenter.update_available(&release);
            }
        }
    }

    fn lock_policy(&self) -> MutexGuard<'_, PermissionPolicy<S>> {
        self.policy.lock().unwrap_or_else(|poisoned| {
            warn!("Updater preference lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl<P: UpdatePresenter> Updater<SettingsFile, P> {
    /// Set up an updater with the standard on-disk layout.
    ///
    /// Creates the directories in `paths`, installs the update log per the
    /// config's `debug_logging` and `max_log_size_bytes`, opens the
    /// preference file and builds an HTTP fetcher. A log file that cannot
    /// be opened is reported but does not stop update checks.
    ///
    /// # Errors
    /// Returns an error when the directories cannot be created, the feed
    /// URL is invalid, or the HTTP client cannot be built.
    pub fn bootstrap(
        paths: &AppPaths,
        config: UpdaterConfig,
        presenter: Arc<P>,
    ) -> Result<Self, UpdaterError> {
        paths.ensure_dirs().map_err(UpdaterError::Directories)?;

        let log_settings = LogSettings::new(paths, &config);
        if let Err(error) = init_logging(&log_settings) {
            warn!(
                "Update log {} unavailable: {error}",
                log_settings.file.display()
            );
        }

        let store = crate::open_settings(paths, &config);
        info!(
            "Updater for {} {} using {}",
            config.app_name,
            config.current_version,
            store.path().display()
        );
        Self::with_http(config, store, presenter)
    }
}
