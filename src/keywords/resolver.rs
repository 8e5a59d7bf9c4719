use std::collections::HashSet;

use crate::settings::{FeedConfig, GlobalKeywords, KeywordMode};

/// Effective keyword lists for one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedKeywords {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

/// Computes the keyword lists that apply to `feed` under its [`KeywordMode`].
///
/// `Combined` yields the union of the global and feed lists with exact-string
/// duplicates removed. Callers must treat the combined lists as sets; the
/// current order (global entries first, then new feed entries) is not part of
/// the contract.
pub fn resolve(feed: &FeedConfig, global: &GlobalKeywords) -> ResolvedKeywords {
    match feed.keyword_mode {
        KeywordMode::GlobalOnly => ResolvedKeywords {
            positive: global.positive.clone(),
            negative: global.negative.clone(),
        },
        KeywordMode::FeedOnly => ResolvedKeywords {
            positive: feed.keywords.clone(),
            negative: feed.negative_keywords.clone(),
        },
        KeywordMode::Combined => ResolvedKeywords {
            positive: dedup_union(&global.positive, &feed.keywords),
            negative: dedup_union(&global.negative, &feed.negative_keywords),
        },
    }
}

/// Resolves keywords for articles that only remember their feed's display name.
///
/// Looks up the first feed whose `name` equals `source`. A renamed or removed
/// feed no longer matches, in which case the global lists apply.
pub fn resolve_for_source(
    source: &str,
    feeds: &[FeedConfig],
    global: &GlobalKeywords,
) -> ResolvedKeywords {
    match feeds.iter().find(|f| f.name == source) {
        Some(feed) => resolve(feed, global),
        None => {
            tracing::debug!(source = %source, "No feed config for source, using global keywords");
            ResolvedKeywords {
                positive: global.positive.clone(),
                negative: global.negative.clone(),
            }
        }
    }
}

fn dedup_union(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(first.len() + second.len());
    first
        .iter()
        .chain(second)
        .filter(|k| seen.insert(k.as_str()))
        .cloned()
        .collect()
}
