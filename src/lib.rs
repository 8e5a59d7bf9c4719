//! Keyword-filtered feed ingestion.
//!
//! `feedsift` fetches RSS feeds on a schedule, extracts their items, matches
//! them against global and per-feed wildcard keywords and keeps two bounded
//! collections up to date: every recent article, and the matched ones ranked
//! by how many keywords they hit.
//!
//! ```no_run
//! use feedsift::pipeline::{Pipeline, PipelineOptions};
//! use feedsift::settings::{FeedConfig, Settings, SettingsHandle};
//!
//! # async fn run() -> Result<(), feedsift::pipeline::PipelineError> {
//! let settings = SettingsHandle::new(Settings {
//!     feeds: vec![FeedConfig::new("https://example.com/rss", "Example")],
//!     ..Settings::default()
//! });
//! settings.set_keywords(vec!["rust".into(), "tok*o".into()]);
//!
//! let handle = Pipeline::new(reqwest::Client::new(), settings, PipelineOptions::default()).start();
//! let report = handle.refresh_and_wait().await?;
//! for article in &handle.snapshot().matched_articles {
//!     println!("[{}] {}", article.priority(), article.title);
//! }
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod feed;
pub mod keywords;
pub mod pipeline;
pub mod settings;
pub mod store;
pub mod util;
