use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum snippet length in characters, excluding the ellipsis.
pub const SNIPPET_MAX_CHARS: usize = 150;

/// Ellipsis appended to truncated snippets
const ELLIPSIS: &str = "...";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Removes anything that looks like an HTML tag.
///
/// This is a textual strip, not an HTML parser: entities are left alone and
/// a stray `<` without a closing `>` is kept.
pub fn strip_html(html: &str) -> Cow<'_, str> {
    HTML_TAG.replace_all(html, "")
}

/// Builds a plain-text preview from raw (possibly HTML) article content.
///
/// Tags are stripped and the result trimmed. Text longer than `max_chars`
/// characters is cut back to the last whitespace inside the limit and `...`
/// is appended; with no whitespace inside the limit the text is cut hard at
/// `max_chars`.
///
/// # Examples
///
/// ```
/// use feedsift::util::make_snippet;
///
/// assert_eq!(make_snippet("<p>Short <b>body</b></p>", 150), "Short body");
/// assert_eq!(make_snippet("alpha beta gamma", 12), "alpha beta...");
/// assert_eq!(make_snippet("abcdefghij", 4), "abcd...");
/// ```
pub fn make_snippet(content: &str, max_chars: usize) -> String {
    let stripped = strip_html(content);
    let cleaned = stripped.trim();

    // Byte offset of the first character past the limit, if any
    let cut = match cleaned.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return cleaned.to_string(),
    };

    let truncated = &cleaned[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(space) => format!("{}{}", &truncated[..space], ELLIPSIS),
        None => format!("{}{}", truncated, ELLIPSIS),
    }
}

/// Strips terminal control characters from feed-supplied text before it is
/// written to a terminal.
///
/// Removes ESC-introduced sequences (CSI up to the final byte, OSC up to BEL
/// or ST, bare ESC) and C0/DEL controls other than tab, newline and carriage
/// return. Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |c: char| {
        c == '\u{1b}' || c == '\u{7f}' || (c < ' ' && c != '\t' && c != '\n' && c != '\r')
    };
    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if !is_control(c) {
                out.push(c);
            }
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                // CSI ends at the first byte in 0x40..=0x7e
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                // OSC ends at BEL or ESC '\'
                while let Some(c) = chars.next() {
                    if c == '\u{07}' {
                        break;
                    }
                    if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_removes_tags() {
        assert_eq!(
            strip_html("<p>Hello <a href=\"x\">world</a></p>"),
            "Hello world"
        );
        assert_eq!(strip_html("no tags"), "no tags");
        assert_eq!(strip_html("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_strip_html_always_strips() {
        assert_eq!(strip_html("<img src=\"a.png\"/>caption<br>"), "caption");
        assert!(matches!(strip_html("plain text"), Cow::Borrowed("plain text")));
    }

    #[test]
    fn test_snippet_short_text_untouched() {
        assert_eq!(make_snippet("  <b>Breaking</b> news  ", 150), "Breaking news");
    }

    #[test]
    fn test_snippet_exact_limit_not_truncated() {
        let text = "a".repeat(150);
        assert_eq!(make_snippet(&text, 150), text);
    }

    #[test]
    fn test_snippet_cuts_at_last_whitespace() {
        let text = format!("{} {}", "word ".repeat(29).trim_end(), "tailing-words-go-past-the-limit");
        let snippet = make_snippet(&text, 150);
        assert!(snippet.ends_with("..."));
        assert!(!snippet.contains("tailing"));
        assert!(snippet.chars().count() <= 153);
    }

    #[test]
    fn test_snippet_hard_cut_without_whitespace() {
        let text = "x".repeat(200);
        let snippet = make_snippet(&text, 150);
        assert_eq!(snippet, format!("{}...", "x".repeat(150)));
    }

    #[test]
    fn test_snippet_counts_chars_not_bytes() {
        let text = "é".repeat(151);
        let snippet = make_snippet(&text, 150);
        assert_eq!(snippet, format!("{}...", "é".repeat(150)));
    }

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "line1\nline2\ttabbed\r\n";
        assert!(matches!(strip_control_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_ansi_and_osc_sequences() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
        assert_eq!(strip_control_chars("a\x00b\x7fc\x1bd"), "abcd");
    }
}
