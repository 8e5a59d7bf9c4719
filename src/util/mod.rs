//! Utility functions for common operations.
//!
//! - **URL validation**: scheme checks applied before any feed request
//! - **Text processing**: HTML stripping, snippet building and terminal-safe output

mod text;
mod url_validator;

pub use text::{make_snippet, strip_control_chars, strip_html, SNIPPET_MAX_CHARS};
pub use url_validator::{validate_feed_url, UrlValidationError};
