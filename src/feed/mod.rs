//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - one HTTP GET per feed with timeout, size cap and scheme check
//! - [`parser`] - streaming RSS item extraction with `quick-xml`
//!
//! Neither half knows about keywords or the article store; the pipeline
//! glues them together.

pub mod fetcher;
pub mod parser;

pub use fetcher::{
    fetch_feed, FetchError, FetchFailure, FetchOptions, FetchResult, DEFAULT_MAX_FEED_BYTES,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use parser::{parse_feed, parse_pub_date, ParseError, ParseResult};
