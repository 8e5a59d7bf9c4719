use regex::{Regex, RegexBuilder};

use super::resolver::ResolvedKeywords;
use crate::store::Article;

/// A keyword compiled once for repeated matching.
///
/// Wildcards are translated into a regex (`*` → `.*`, `?` → `.`); all other
/// characters keep their regex meaning. A keyword whose translation does not
/// compile falls back to plain substring containment.
#[derive(Debug, Clone)]
pub enum KeywordPattern {
    Pattern { keyword: String, regex: Regex },
    Substring { keyword: String, needle: String },
}

impl KeywordPattern {
    /// Compiles `keyword`. Blank keywords match nothing and yield `None`.
    pub fn compile(keyword: &str) -> Option<Self> {
        if keyword.trim().is_empty() {
            return None;
        }

        let lowered = keyword.to_lowercase();
        let translated = lowered.replace('*', ".*").replace('?', ".");
        match RegexBuilder::new(&translated).case_insensitive(true).build() {
            Ok(regex) => Some(Self::Pattern {
                keyword: keyword.to_string(),
                regex,
            }),
            Err(e) => {
                tracing::debug!(
                    keyword = %keyword,
                    error = %e,
                    "Keyword pattern failed to compile, using substring match"
                );
                Some(Self::Substring {
                    keyword: keyword.to_string(),
                    needle: lowered,
                })
            }
        }
    }

    /// The keyword as configured, original casing.
    pub fn keyword(&self) -> &str {
        match self {
            Self::Pattern { keyword, .. } | Self::Substring { keyword, .. } => keyword,
        }
    }

    /// Tests the pattern against already-lowercased text. The search is unanchored.
    pub fn is_match(&self, lowered_text: &str) -> bool {
        match self {
            Self::Pattern { regex, .. } => regex.is_match(lowered_text),
            Self::Substring { needle, .. } => lowered_text.contains(needle.as_str()),
        }
    }
}

/// Positive and negative keyword patterns for one resolved keyword set.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    positive: Vec<KeywordPattern>,
    negative: Vec<KeywordPattern>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(positive: &[S], negative: &[S]) -> Self {
        let compile_all = |keywords: &[S]| {
            keywords
                .iter()
                .filter_map(|k| KeywordPattern::compile(k.as_ref()))
                .collect::<Vec<_>>()
        };
        Self {
            positive: compile_all(positive),
            negative: compile_all(negative),
        }
    }

    pub fn from_resolved(resolved: &ResolvedKeywords) -> Self {
        Self::new(resolved.positive.as_slice(), resolved.negative.as_slice())
    }

    /// Re-classifies `article` in place.
    ///
    /// `matched_keywords` is replaced with every positive keyword found in
    /// `lowercase(title + " " + content)`, in keyword order. Negative keywords
    /// are checked in order until the first hit.
    pub fn apply(&self, article: &mut Article) {
        let text = article.searchable_text();

        article.matched_keywords = self
            .positive
            .iter()
            .filter(|p| p.is_match(&text))
            .map(|p| p.keyword().to_string())
            .collect();
        article.matches_negative_keyword = self.negative.iter().any(|p| p.is_match(&text));
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }
}
