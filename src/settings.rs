//! Runtime configuration shared between the configuration surface and the
//! pipeline.
//!
//! [`Settings`] is an owned value; [`SettingsHandle`] wraps it in a
//! `tokio::sync::watch` channel so that every mutation is observable. The
//! pipeline worker holds a receiver and diffs consecutive values to decide
//! between reprocessing, refetching and recreating its refresh timer.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// Default interval between scheduled fetch cycles (30 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1800);

// ============================================================================
// Feed Configuration
// ============================================================================

/// Policy selecting which keyword lists apply to a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordMode {
    /// Only the process-wide keyword lists.
    #[default]
    #[serde(alias = "Global Only", alias = "global_only")]
    GlobalOnly,
    /// Only the feed's own keyword lists.
    #[serde(alias = "Feed Only", alias = "feed_only")]
    FeedOnly,
    /// Union of global and feed lists.
    #[serde(alias = "combined")]
    Combined,
}

/// A configured syndication source.
///
/// Serialized with the field names used by the persisted feed list
/// (`keywordMode`, `negativeKeywords`); snake_case spellings are accepted
/// when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub url: String,
    /// Display name. Articles carry this as their `source`.
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, alias = "keyword_mode")]
    pub keyword_mode: KeywordMode,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, alias = "negative_keywords")]
    pub negative_keywords: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl FeedConfig {
    /// Creates an enabled feed in [`KeywordMode::GlobalOnly`] with no local keywords.
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            name: name.into(),
            enabled: true,
            keyword_mode: KeywordMode::GlobalOnly,
            keywords: Vec::new(),
            negative_keywords: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: KeywordMode) -> Self {
        self.keyword_mode = mode;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_negative_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.negative_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Serializes a feed list in its persisted JSON form.
pub fn feeds_to_json(feeds: &[FeedConfig]) -> serde_json::Result<String> {
    serde_json::to_string(feeds)
}

/// Reads a feed list from its persisted JSON form.
pub fn feeds_from_json(json: &str) -> serde_json::Result<Vec<FeedConfig>> {
    serde_json::from_str(json)
}

// ============================================================================
// Global Keywords and Settings
// ============================================================================

/// Process-wide keyword lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalKeywords {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl GlobalKeywords {
    pub fn new<I, J, S, T>(positive: I, negative: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            positive: positive.into_iter().map(Into::into).collect(),
            negative: negative.into_iter().map(Into::into).collect(),
        }
    }
}

/// Everything the pipeline reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub keywords: GlobalKeywords,
    pub feeds: Vec<FeedConfig>,
    pub refresh_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keywords: GlobalKeywords::default(),
            feeds: Vec::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl Settings {
    /// Feeds that take part in fetch cycles.
    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }
}

/// Which part of [`Settings`] differs between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub keywords: bool,
    pub negative_keywords: bool,
    pub feeds: bool,
    pub refresh_interval: bool,
}

impl SettingsChange {
    pub fn between(old: &Settings, new: &Settings) -> Self {
        Self {
            keywords: old.keywords.positive != new.keywords.positive,
            negative_keywords: old.keywords.negative != new.keywords.negative,
            feeds: old.feeds != new.feeds,
            refresh_interval: old.refresh_interval != new.refresh_interval,
        }
    }

    /// True when stored articles must be re-matched.
    pub fn needs_reprocess(&self) -> bool {
        self.keywords || self.negative_keywords || self.feeds
    }
}

// ============================================================================
// SettingsHandle
// ============================================================================

/// Shared, observable owner of [`Settings`].
///
/// Cloning the handle is cheap; all clones mutate the same value. Mutators
/// only notify subscribers when the stored value actually changes.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Settings>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx: Arc::new(tx) }
    }

    /// Returns a copy of the current settings.
    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Subscribes to changes. The receiver starts with the current value marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn set_keywords(&self, keywords: Vec<String>) -> bool {
        self.modify(|s| replace(&mut s.keywords.positive, keywords))
    }

    pub fn set_negative_keywords(&self, keywords: Vec<String>) -> bool {
        self.modify(|s| replace(&mut s.keywords.negative, keywords))
    }

    pub fn set_feeds(&self, feeds: Vec<FeedConfig>) -> bool {
        self.modify(|s| replace(&mut s.feeds, feeds))
    }

    /// Edits the feed list in place, e.g. to toggle or rename one feed.
    pub fn update_feeds<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<FeedConfig>),
    {
        self.modify(|s| {
            let before = s.feeds.clone();
            f(&mut s.feeds);
            s.feeds != before
        })
    }

    pub fn set_refresh_interval(&self, interval: Duration) -> bool {
        self.modify(|s| replace(&mut s.refresh_interval, interval))
    }

    fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Settings) -> bool,
    {
        let changed = self.tx.send_if_modified(f);
        if changed {
            tracing::debug!("Settings changed");
        }
        changed
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
