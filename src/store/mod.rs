//! In-memory article collections published to display consumers.
//!
//! [`ArticleStore`] owns `all_articles` (insertion order, capacity 100) and
//! `matched_articles` (priority order, capacity 50) and republishes both as
//! one [`Snapshot`] after every mutation.

mod articles;
mod types;

pub use articles::{
    ArticleStore, IngestSummary, ReprocessSummary, ALL_ARTICLES_CAPACITY,
    MATCHED_ARTICLES_CAPACITY,
};
pub use types::{Article, Snapshot};
