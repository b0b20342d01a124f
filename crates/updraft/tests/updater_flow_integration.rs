use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use updraft::engine::{
    CheckError, CheckFailure, CheckResult, FeedDocument, FeedFetcher, FetchError,
    MemoryPreferenceStore, PreferenceState, ReleaseCandidate, Url,
};
use updraft::{
    AppPaths, PermissionPrompt, SettingsFile, StartupPlan, UpdatePresenter, Updater,
    UpdaterConfig,
};

const FEED: &str = r#"{ "items": [
    { "version": "1.0.0", "title": "Current", "url": "https://example.com/1.0.0.zip" },
    { "version": "1.1.0", "title": "Next", "url": "https://example.com/1.1.0.zip" }
] }"#;

struct CountingFetcher {
    calls: AtomicUsize,
    response: Result<FeedDocument, FetchError>,
}

impl CountingFetcher {
    fn feed(body: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Ok(FeedDocument::new(body, Some("application/json"))),
        })
    }

    fn failing(error: FetchError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Err(error),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for CountingFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FeedDocument, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

struct RecordingPresenter {
    answer: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("presenter lock").push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("presenter lock").clone()
    }
}

#[async_trait]
impl UpdatePresenter for RecordingPresenter {
    fn check_started(&self) {
        self.record("check_started".to_string());
    }

    fn check_failed(&self, reason: &str) {
        self.record(format!("check_failed: {reason}"));
    }

    fn check_failed_quietly(&self, reason: &str) {
        self.record(format!("check_failed_quietly: {reason}"));
    }

    fn up_to_date(&self) {
        self.record("up_to_date".to_string());
    }

    fn update_available(&self, release: &ReleaseCandidate) {
        self.record(format!("update_available: {}", release.version()));
    }

    async fn ask_permission(&self, prompt: &PermissionPrompt) -> bool {
        self.record(format!("ask_permission: {}", prompt.title));
        self.answer
    }
}

fn config(current_version: &str) -> UpdaterConfig {
    UpdaterConfig::new("Example", current_version, "https://example.com/appcast.json")
}

fn state(check_automatically: bool, first_boot: bool, asked_permission: bool) -> PreferenceState {
    PreferenceState {
        check_automatically,
        first_boot,
        asked_permission,
    }
}

#[tokio::test]
async fn first_launch_neither_prompts_nor_checks() {
    let fetcher = CountingFetcher::feed(FEED);
    let presenter = RecordingPresenter::answering(true);
    let updater = Updater::new(
        config("1.0.0"),
        fetcher.clone(),
        MemoryPreferenceStore::new(),
        presenter.clone(),
    )
    .expect("valid config");

    let plan = updater.start().await.expect("startup succeeds");

    assert_eq!(plan, StartupPlan::default());
    assert!(presenter.calls().is_empty());
    assert_eq!(fetcher.calls(), 0);
    assert!(!updater.preferences().first_boot);
}

#[tokio::test]
async fn second_launch_prompts_and_consent_triggers_one_quiet_check() {
    let fetcher = CountingFetcher::feed(FEED);
    let presenter = RecordingPresenter::answering(true);
    let updater = Updater::new(
        config("1.0.0"),
        fetcher.clone(),
        MemoryPreferenceStore::with_state(state(false, false, false)),
        presenter.clone(),
    )
    .expect("valid config");

    let plan = updater.start().await.expect("startup succeeds");

    assert!(plan.ask_permission);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(
        presenter.calls(),
        [
            "ask_permission: Check for updates automatically?",
            "update_available: 1.1.0",
        ]
    );
    assert_eq!(updater.preferences(), state(true, false, true));
}

#[tokio::test]
async fn declining_consent_is_remembered_without_checking() {
    let fetcher = CountingFetcher::feed(FEED);
    let presenter = RecordingPresenter::answering(false);
    let updater = Updater::new(
        config("1.0.0"),
        fetcher.clone(),
        MemoryPreferenceStore::with_state(state(false, false, false)),
        presenter.clone(),
    )
    .expect("valid config");

    updater.start().await.expect("startup succeeds");

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(updater.preferences(), state(false, false, true));
}

#[tokio::test]
async fn enabled_automatic_checks_run_quietly_at_startup() {
    let fetcher = CountingFetcher::feed(FEED);
    let presenter = RecordingPresenter::answering(true);
    let updater = Updater::new(
        config("1.1.0"),
        fetcher.clone(),
        MemoryPreferenceStore::with_state(state(true, false, true)),
        presenter.clone(),
    )
    .expect("valid config");

    let plan = updater.start().await.expect("startup succeeds");

    assert!(plan.auto_check);
    assert_eq!(fetcher.calls(), 1);
    assert!(
        presenter.calls().is_empty(),
        "quiet up-to-date result should not be presented"
    );
}

#[tokio::test]
async fn quiet_timeout_only_reaches_the_diagnostic_hook() {
    let fetcher = CountingFetcher::failing(FetchError::Network {
        details: "operation timed out".to_string(),
        timed_out: true,
    });
    let presenter = RecordingPresenter::answering(true);
    let updater = Updater::new(
        config("1.0.0"),
        fetcher.clone(),
        MemoryPreferenceStore::with_state(state(true, false, true)),
        presenter.clone(),
    )
    .expect("valid config");

    let quiet = updater.check_quietly().await.expect("checker is idle");
    assert!(matches!(
        quiet,
        CheckResult::Failed(CheckFailure::Fetch(FetchError::Network {
            timed_out: true,
            ..
        }))
    ));
    assert_eq!(
        presenter.calls(),
        ["check_failed_quietly: feed request timed out: operation timed out"]
    );

    let manual = updater.check_now().await.expect("checker is idle");
    assert!(matches!(manual, CheckResult::Failed(_)));
    assert_eq!(
        presenter.calls()[1..],
        [
            "check_started",
            "check_failed: feed request timed out: operation timed out",
        ]
    );
}

#[tokio::test]
async fn manual_check_presents_up_to_date() {
    let presenter = RecordingPresenter::answering(true);
    let updater = Updater::new(
        config("2.0.0"),
        CountingFetcher::feed(FEED),
        MemoryPreferenceStore::new(),
        presenter.clone(),
    )
    .expect("valid config");

    let result = updater.check_now().await.expect("checker is idle");

    assert_eq!(result, CheckResult::UpToDate);
    assert_eq!(presenter.calls(), ["check_started", "up_to_date"]);
}

#[tokio::test]
async fn invalid_feed_url_is_rejected_up_front() {
    let mut bad = config("1.0.0");
    bad.feed_url = "not a url".to_string();

    let result = Updater::new(
        bad,
        CountingFetcher::feed(FEED),
        MemoryPreferenceStore::new(),
        RecordingPresenter::answering(true),
    );

    assert!(result.is_err());
}

#[tokio::test]
async fn preferences_survive_restarts_through_the_settings_file() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let path = temp_dir.path().join("updater.json");

    let first_presenter = RecordingPresenter::answering(true);
    let first = Updater::new(
        config("1.0.0"),
        CountingFetcher::feed(FEED),
        SettingsFile::open(&path, "updater"),
        first_presenter.clone(),
    )
    .expect("valid config");
    first.start().await.expect("first startup succeeds");
    assert!(first_presenter.calls().is_empty());
    drop(first);

    let second_presenter = RecordingPresenter::answering(true);
    let fetcher = CountingFetcher::feed(FEED);
    let second = Updater::new(
        config("1.0.0"),
        fetcher.clone(),
        SettingsFile::open(&path, "updater"),
        second_presenter.clone(),
    )
    .expect("valid config");
    let plan = second.start().await.expect("second startup succeeds");

    assert!(plan.ask_permission);
    assert_eq!(fetcher.calls(), 1);

    let reopened = SettingsFile::open(&path, "updater");
    assert_eq!(reopened.get_bool("first_boot"), Some(false));
    assert_eq!(reopened.get_bool("asked_permission"), Some(true));
    assert_eq!(reopened.get_bool("check_automatically"), Some(true));
}

#[tokio::test(start_paused = true)]
async fn periodic_checks_follow_the_automatic_preference() {
    let fetcher = CountingFetcher::feed(FEED);
    let updater = Updater::new(
        config("1.1.0"),
        fetcher.clone(),
        MemoryPreferenceStore::with_state(state(true, false, true)),
        RecordingPresenter::answering(true),
    )
    .expect("valid config");
    let hour = Duration::from_secs(3600);

    let _ = tokio::time::timeout(hour * 3 + hour / 2, updater.run_periodic(hour)).await;
    assert_eq!(fetcher.calls(), 3);

    updater
        .set_check_automatically(false)
        .expect("memory store accepts writes");
    let _ = tokio::time::timeout(hour * 2 + hour / 2, updater.run_periodic(hour)).await;
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn concurrent_manual_check_is_rejected() {
    let updater = Updater::new(
        config("1.0.0"),
        CountingFetcher::feed(FEED),
        MemoryPreferenceStore::new(),
        RecordingPresenter::answering(true),
    )
    .expect("valid config");

    let session = updater
        .checker()
        .check(updater.config().feed_url().expect("valid url"), true)
        .expect("checker is idle");

    assert!(matches!(
        updater.check_now().await,
        Err(CheckError::AlreadyChecking)
    ));

    drop(session);
    assert!(updater.check_now().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn oversized_periodic_interval_waits_instead_of_panicking() {
    let fetcher = CountingFetcher::feed(FEED);
    let updater = Updater::new(
        config("1.1.0"),
        fetcher.clone(),
        MemoryPreferenceStore::with_state(state(true, false, true)),
        RecordingPresenter::answering(true),
    )
    .expect("valid config");

    let outcome = tokio::time::timeout(
        Duration::from_secs(3600),
        updater.run_periodic(Duration::MAX),
    )
    .await;

    assert!(outcome.is_err(), "run_periodic never returns");
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn bootstrap_uses_the_on_disk_layout() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let paths = AppPaths::under(temp_dir.path());
    let mut config = config("1.0.0");
    config.debug_logging = true;
    config.max_log_size_bytes = 64 * 1024;

    let updater = Updater::bootstrap(&paths, config, RecordingPresenter::answering(true))
        .expect("bootstrap succeeds");
    updater
        .set_check_automatically(true)
        .expect("settings file accepts writes");

    assert!(paths.config_dir.is_dir());
    assert!(paths.log_file().is_file());
    let saved = SettingsFile::open(paths.settings_file(), "updater");
    assert_eq!(saved.get_bool("check_automatically"), Some(true));
    assert_eq!(saved.get_bool("asked_permission"), Some(true));
}
