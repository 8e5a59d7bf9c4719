//! Configuration file parser for ~/.config/feedsift/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one
//! since they are usually typos.
use serde::Deserialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FetchOptions, DEFAULT_MAX_FEED_BYTES, DEFAULT_REQUEST_TIMEOUT};
use crate::settings::{FeedConfig, GlobalKeywords, Settings, DEFAULT_REFRESH_INTERVAL};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between scheduled fetch cycles.
    pub refresh_interval_secs: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,

    /// Global positive keywords.
    pub keywords: Vec<String>,

    /// Global negative keywords.
    pub negative_keywords: Vec<String>,

    /// Configured feeds, in display order.
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            keywords: Vec::new(),
            negative_keywords: Vec::new(),
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Largest accepted config file (1 MiB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "refresh_interval_secs",
        "request_timeout_secs",
        "max_feed_bytes",
        "keywords",
        "negative_keywords",
        "feeds",
    ];

    /// Reads `path`, treating a missing or blank file as the defaults.
    ///
    /// The file is read through a bounded reader, so an oversized file is
    /// rejected with [`ConfigError::TooLarge`] without being loaded whole.
    /// Unknown keys are accepted and logged.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file absent, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        file.take(Self::MAX_FILE_SIZE + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} exceeds {} bytes",
                path.display(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let unknown: Vec<String> = content
            .parse::<toml::Table>()
            .map(|table| {
                table
                    .keys()
                    .filter(|k| !Self::KNOWN_KEYS.contains(&k.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for key in &unknown {
            tracing::warn!(key = %key, "Ignoring unknown config key");
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            feeds = config.feeds.len(),
            keywords = config.keywords.len(),
            negative_keywords = config.negative_keywords.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        // Zero would make the timer spin
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.request_timeout(),
            max_bytes: self.max_feed_bytes,
        }
    }

    /// Builds the runtime [`Settings`] value the pipeline observes.
    pub fn to_settings(&self) -> Settings {
        Settings {
            keywords: GlobalKeywords {
                positive: self.keywords.clone(),
                negative: self.negative_keywords.clone(),
            },
            feeds: self.feeds.clone(),
            refresh_interval: self.refresh_interval(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::KeywordMode;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refresh_interval_secs, 1800);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        assert!(config.keywords.is_empty());
        assert!(config.feeds.is_empty());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedsift_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.refresh_interval_secs, 1800);
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n  ").unwrap();
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
refresh_interval_secs = 600
keywords = ["rust", "tok*"]
negative_keywords = ["sponsored"]

[[feeds]]
url = "https://example.com/rss"
name = "Example"
keywordMode = "Combined"
keywords = ["async"]
negativeKeywords = ["crypto"]

[[feeds]]
url = "https://other.example/rss"
name = "Other"
enabled = false
keyword_mode = "FeedOnly"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.refresh_interval_secs, 600);
        assert_eq!(config.keywords, vec!["rust", "tok*"]);
        assert_eq!(config.negative_keywords, vec!["sponsored"]);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].keyword_mode, KeywordMode::Combined);
        assert_eq!(config.feeds[0].negative_keywords, vec!["crypto"]);
        assert!(config.feeds[0].enabled);
        assert!(!config.feeds[1].enabled);
        assert_eq!(config.feeds[1].keyword_mode, KeywordMode::FeedOnly);

        let options = config.fetch_options();
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.max_bytes, 10 * 1024 * 1024);

        let settings = config.to_settings();
        assert_eq!(settings.refresh_interval, Duration::from_secs(600));
        assert_eq!(settings.keywords.positive, vec!["rust", "tok*"]);
        assert_eq!(settings.enabled_feeds().count(), 1);
    }

    #[test]
    fn test_zero_interval_clamped() {
        let config = Config::parse("refresh_interval_secs = 0").unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("refresh_interval_secs = 5\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.refresh_interval_secs, 5);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("keywords = 42\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedsift_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("feedsift_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "keywords = [\"kernel\"]\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.keywords, vec!["kernel"]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
