//! Update-check engine for updraft.
//!
//! This crate holds the pieces that do not depend on how an application
//! presents updates:
//! - Feed retrieval behind the [`FeedFetcher`] trait, with a `reqwest` implementation.
//! - Appcast parsing (Sparkle RSS and JSON) into [`ReleaseCandidate`]s.
//! - Dotted version comparison.
//! - The single-flight [`UpdateChecker`] state machine.
//! - The [`PreferenceStore`] abstraction the startup policy reads and writes.

pub mod appcast;
pub mod checker;
pub mod fetch;
pub mod prefs;
pub mod version;

/// Parsed feed entries and the parser entry point.
pub use appcast::{ParseError, ReleaseCandidate, parse as parse_appcast};
/// Check sessions, their lifecycle events, and results.
pub use checker::{
    CheckError, CheckEvent, CheckFailure, CheckResult, CheckSession, CheckState, UpdateChecker,
    select_best,
};
/// Feed retrieval.
pub use fetch::{FeedDocument, FeedFetcher, FetchError, HttpFeedFetcher};
/// Persisted updater preferences.
pub use prefs::{
    MemoryPreferenceStore, PreferenceError, PreferenceKey, PreferenceState, PreferenceStore,
};
/// Version parsing and ordering.
pub use version::{Version, VersionError, compare as compare_versions};

pub use reqwest::Url;
