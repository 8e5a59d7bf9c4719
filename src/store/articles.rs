use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;

use super::types::{Article, Snapshot};
use crate::keywords::{resolve, resolve_for_source, KeywordMatcher};
use crate::settings::{FeedConfig, GlobalKeywords};

/// Maximum number of articles kept in `all_articles`.
pub const ALL_ARTICLES_CAPACITY: usize = 100;

/// Maximum number of articles kept in `matched_articles`.
pub const MATCHED_ARTICLES_CAPACITY: usize = 50;

/// Outcome of one [`ArticleStore::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: usize,
    pub inserted: usize,
    /// Dropped because a stored article already has the same URL.
    pub duplicates: usize,
    /// Dropped because a negative keyword matched.
    pub rejected: usize,
    /// Removed from the front to stay within capacity.
    pub evicted: usize,
    pub matched: usize,
}

/// Outcome of one [`ArticleStore::reprocess`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReprocessSummary {
    pub kept: usize,
    pub removed: usize,
    pub matched: usize,
}

/// Owner of the two published article collections.
///
/// All mutation goes through `&mut self`, so a single owner (the pipeline
/// worker) serializes ingests and reprocessing. Each mutation ends by
/// publishing a fresh [`Snapshot`] through a `watch` channel; readers never
/// see one collection updated without the other.
///
/// Invariants after every call:
/// - no two articles in `all_articles` share a URL
/// - `all_articles.len() <= 100`, `matched_articles.len() <= 50`
/// - `matched_articles` is the stable priority-descending sort of the
///   matched subset of `all_articles`, truncated to 50
#[derive(Debug)]
pub struct ArticleStore {
    all: Vec<Arc<Article>>,
    matched: Vec<Arc<Article>>,
    publisher: watch::Sender<Arc<Snapshot>>,
}

impl Default for ArticleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArticleStore {
    pub fn new() -> Self {
        let (publisher, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            all: Vec::new(),
            matched: Vec::new(),
            publisher,
        }
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.publisher.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.publisher.borrow().clone()
    }

    pub fn all_articles(&self) -> &[Arc<Article>] {
        &self.all
    }

    pub fn matched_articles(&self) -> &[Arc<Article>] {
        &self.matched
    }

    /// Classifies a freshly parsed batch from `feed` and merges it in.
    ///
    /// Articles hitting a negative keyword are dropped. The rest are appended
    /// unless an article with the same URL is already stored (articles without
    /// a URL are never deduplicated). The oldest articles are then evicted
    /// down to capacity and the matched ranking is rebuilt.
    pub fn ingest(
        &mut self,
        batch: Vec<Article>,
        feed: &FeedConfig,
        global: &GlobalKeywords,
    ) -> IngestSummary {
        let matcher = KeywordMatcher::from_resolved(&resolve(feed, global));
        let mut summary = IngestSummary {
            received: batch.len(),
            ..IngestSummary::default()
        };

        let mut known_urls: HashSet<String> =
            self.all.iter().filter_map(|a| a.url.clone()).collect();

        for mut article in batch {
            matcher.apply(&mut article);

            if article.matches_negative_keyword {
                summary.rejected += 1;
                continue;
            }

            if let Some(url) = &article.url {
                if !known_urls.insert(url.clone()) {
                    summary.duplicates += 1;
                    continue;
                }
            }

            self.all.push(Arc::new(article));
            summary.inserted += 1;
        }

        if self.all.len() > ALL_ARTICLES_CAPACITY {
            let excess = self.all.len() - ALL_ARTICLES_CAPACITY;
            self.all.drain(..excess);
            summary.evicted = excess;
        }

        self.matched = rank_matched(&self.all);
        summary.matched = self.matched.len();
        self.publish();

        tracing::debug!(
            feed = %feed.name,
            received = summary.received,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            evicted = summary.evicted,
            matched = summary.matched,
            "Ingested feed batch"
        );

        summary
    }

    /// Re-classifies every stored article against current configuration.
    ///
    /// Each article's keyword set is resolved through the feed whose display
    /// name equals `article.source`, falling back to the global lists when no
    /// such feed exists. Articles that now hit a negative keyword are removed.
    pub fn reprocess(&mut self, feeds: &[FeedConfig], global: &GlobalKeywords) -> ReprocessSummary {
        let before = self.all.len();
        let mut matchers: HashMap<String, KeywordMatcher> = HashMap::new();

        let rebuilt: Vec<Arc<Article>> = self
            .all
            .iter()
            .filter_map(|stored| {
                let matcher = matchers.entry(stored.source.clone()).or_insert_with(|| {
                    KeywordMatcher::from_resolved(&resolve_for_source(&stored.source, feeds, global))
                });

                let mut article = Article::clone(stored);
                matcher.apply(&mut article);
                (!article.matches_negative_keyword).then(|| Arc::new(article))
            })
            .collect();

        self.all = rebuilt;
        self.matched = rank_matched(&self.all);
        self.publish();

        let summary = ReprocessSummary {
            kept: self.all.len(),
            removed: before - self.all.len(),
            matched: self.matched.len(),
        };
        tracing::debug!(
            kept = summary.kept,
            removed = summary.removed,
            matched = summary.matched,
            "Reprocessed stored articles"
        );
        summary
    }

    fn publish(&self) {
        self.publisher.send_replace(Arc::new(Snapshot {
            all_articles: self.all.clone(),
            matched_articles: self.matched.clone(),
        }));
    }
}

/// Matched subset of `articles`, stable-sorted by priority descending and
/// truncated to [`MATCHED_ARTICLES_CAPACITY`]. Equal priorities keep their
/// relative order from `articles`.
fn rank_matched(articles: &[Arc<Article>]) -> Vec<Arc<Article>> {
    let mut matched: Vec<Arc<Article>> = articles
        .iter()
        .filter(|a| !a.matched_keywords.is_empty())
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.priority().cmp(&a.priority()));
    matched.truncate(MATCHED_ARTICLES_CAPACITY);
    matched
}
