use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::util::{make_snippet, SNIPPET_MAX_CHARS};

// ============================================================================
// Article
// ============================================================================

/// An article extracted from a feed.
///
/// Created by the parser with an empty classification; `matched_keywords`
/// and `matches_negative_keyword` are rewritten by every ingest or
/// reprocessing pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    /// Raw item body, possibly HTML.
    pub content: String,
    /// Tag-stripped preview of `content`.
    pub snippet: String,
    /// Display name of the feed the article came from.
    pub source: String,
    /// Dedup key when present.
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub published: DateTime<Utc>,
    /// Positive keywords found, in keyword order, original casing.
    pub matched_keywords: Vec<String>,
    pub matches_negative_keyword: bool,
}

impl Article {
    /// Creates an unclassified article with a fresh id, derived snippet and
    /// the current time as publish date.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            snippet: make_snippet(&content, SNIPPET_MAX_CHARS),
            content,
            source: source.into(),
            url: None,
            image_url: None,
            published: Utc::now(),
            matched_keywords: Vec::new(),
            matches_negative_keyword: false,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
        self.published = published;
        self
    }

    /// Number of positive keywords matched; the only ranking key.
    pub fn priority(&self) -> usize {
        self.matched_keywords.len()
    }

    /// `lowercase(title + " " + content)`, the text keywords are matched against.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.content).to_lowercase()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The pair of published collections, always replaced as a unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Insertion order, oldest first.
    pub all_articles: Vec<Arc<Article>>,
    /// Priority descending.
    pub matched_articles: Vec<Arc<Article>>,
}
