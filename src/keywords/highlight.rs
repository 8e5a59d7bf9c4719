/// A piece of highlighted text, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub is_keyword: bool,
}

/// Splits `text` into keyword and non-keyword segments.
///
/// Scans left to right. At each step the keyword occurrence with the lowest
/// start position wins (the earlier keyword in `keywords` on a tie); the text
/// before it and the occurrence itself are emitted, and scanning resumes
/// after it. Keywords are matched as literal, case-insensitive substrings;
/// wildcards are not interpreted. Segments borrow from `text`, so joining
/// them always reproduces it exactly.
///
/// # Examples
///
/// ```
/// use feedsift::keywords::highlight;
///
/// let segments = highlight("Rust and rUSTaceans", &["rust"]);
/// let keywords: Vec<_> = segments.iter().filter(|s| s.is_keyword).map(|s| s.text).collect();
/// assert_eq!(keywords, vec!["Rust", "rUST"]);
/// assert_eq!(segments.iter().map(|s| s.text).collect::<String>(), "Rust and rUSTaceans");
/// ```
pub fn highlight<'a, S: AsRef<str>>(text: &'a str, keywords: &[S]) -> Vec<Segment<'a>> {
    let needles: Vec<Vec<char>> = keywords
        .iter()
        .map(|k| k.as_ref())
        .filter(|k| !k.trim().is_empty())
        .map(|k| k.chars().flat_map(char::to_lowercase).collect())
        .collect();

    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];

        let mut earliest: Option<(usize, usize)> = None;
        for needle in &needles {
            if let Some((start, end)) = find_case_insensitive(rest, needle) {
                if earliest.map_or(true, |(best, _)| start < best) {
                    earliest = Some((start, end));
                }
            }
        }

        let Some((start, end)) = earliest else {
            segments.push(Segment {
                text: rest,
                is_keyword: false,
            });
            break;
        };

        if start > 0 {
            segments.push(Segment {
                text: &rest[..start],
                is_keyword: false,
            });
        }
        segments.push(Segment {
            text: &rest[start..end],
            is_keyword: true,
        });
        pos += end;
    }

    segments
}

/// Finds the first occurrence of `needle` (already lowercased) in `haystack`,
/// comparing against the lowercase expansion of each haystack character.
///
/// Returns byte offsets into `haystack`; a match must end on a character boundary.
fn find_case_insensitive(haystack: &str, needle: &[char]) -> Option<(usize, usize)> {
    haystack
        .char_indices()
        .find_map(|(start, _)| match_len_at(&haystack[start..], needle).map(|len| (start, start + len)))
}

fn match_len_at(s: &str, needle: &[char]) -> Option<usize> {
    let mut remaining = needle;
    for (idx, c) in s.char_indices() {
        for lower in c.to_lowercase() {
            match remaining.split_first() {
                Some((first, rest)) if *first == lower => remaining = rest,
                _ => return None,
            }
        }
        if remaining.is_empty() {
            return Some(idx + c.len_utf8());
        }
    }
    None
}
