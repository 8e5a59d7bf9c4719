//! Keyword resolution and matching.
//!
//! - `resolver` picks the positive/negative lists that apply to a feed
//! - `matcher` compiles those lists once and classifies articles
//! - `highlight` splits display text into keyword spans

mod highlight;
mod matcher;
mod resolver;

pub use highlight::{highlight, Segment};
pub use matcher::{KeywordMatcher, KeywordPattern};
pub use resolver::{resolve, resolve_for_source, ResolvedKeywords};
