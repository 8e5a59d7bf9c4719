use chrono::{DateTime, Utc};
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use url::Url;

use crate::store::Article;

/// `EEE, dd MMM yyyy HH:mm:ss Z`
const RSS_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";
/// `yyyy-MM-dd'T'HH:mm:ssZ`
const ISO_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Structural problems found while reading a feed document.
///
/// Never fatal: [`ParseResult::articles`] still holds every item completed
/// before the problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed feed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
    #[error("Feed ended inside an unclosed <item>")]
    UnexpectedEof,
}

/// Items recovered from one document, plus the failure that stopped parsing early.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub articles: Vec<Article>,
    pub error: Option<ParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    InItem,
    InTitle,
    InDescription,
    InLink,
    InPubDate,
}

impl ParserState {
    /// Accumulation state for a child element of `<item>`.
    fn entering(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::InTitle),
            b"description" | b"content:encoded" => Some(Self::InDescription),
            b"link" => Some(Self::InLink),
            b"pubDate" => Some(Self::InPubDate),
            _ => None,
        }
    }
}

/// Per-item accumulators, reset on every `<item>`.
#[derive(Debug, Default)]
struct RawItem {
    title: String,
    description: String,
    link: String,
    pub_date: String,
    image_url: Option<String>,
}

impl RawItem {
    fn accumulator(&mut self, state: ParserState) -> Option<&mut String> {
        match state {
            ParserState::InTitle => Some(&mut self.title),
            ParserState::InDescription => Some(&mut self.description),
            ParserState::InLink => Some(&mut self.link),
            ParserState::InPubDate => Some(&mut self.pub_date),
            ParserState::Idle | ParserState::InItem => None,
        }
    }

    fn take_image(&mut self, e: &BytesStart<'_>, decoder: Decoder) {
        if self.image_url.is_some() {
            return;
        }
        let is_image_type = || {
            attribute(e, "type", decoder).is_some_and(|t| t.starts_with("image/"))
        };
        let accepted = match e.name().as_ref() {
            b"enclosure" => is_image_type(),
            b"media:content" => {
                attribute(e, "medium", decoder).is_some_and(|m| m == "image") || is_image_type()
            }
            b"media:thumbnail" => true,
            _ => false,
        };
        if accepted {
            self.image_url = attribute(e, "url", decoder).filter(|u| !u.is_empty());
        }
    }

    fn into_article(self, source: &str) -> Article {
        let url = if self.link.is_empty() {
            None
        } else {
            // Normalize when possible so equal links compare equal
            Some(Url::parse(&self.link).map(String::from).unwrap_or(self.link))
        };
        let published = parse_pub_date(&self.pub_date).unwrap_or_else(Utc::now);

        let mut article = Article::new(self.title, self.description, source).with_published(published);
        article.url = url;
        article.image_url = self.image_url;
        article
    }
}

/// Parses an RSS document into unclassified articles attributed to `source`.
///
/// Only `<item>` elements are read; inside them `<title>`, `<description>`
/// and `<content:encoded>` (both appended to the description), `<link>` and
/// `<pubDate>` are collected. Each text or CDATA chunk is trimmed before it
/// is appended. Image enclosures and media thumbnails fill the optional image
/// URL. All other elements are ignored.
///
/// Parsing stops at the first XML error; articles completed before it are
/// returned together with the error.
pub fn parse_feed(bytes: &[u8], source: &str) -> ParseResult {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut state = ParserState::Idle;
    let mut item = RawItem::default();
    let mut articles = Vec::new();

    let error = loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                break Some(ParseError::Malformed {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                });
            }
        };

        match event {
            Event::Start(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    item = RawItem::default();
                    state = ParserState::InItem;
                } else if state == ParserState::InItem {
                    match ParserState::entering(name.as_ref()) {
                        Some(next) => state = next,
                        None => item.take_image(&e, reader.decoder()),
                    }
                }
            }
            Event::Empty(e) => {
                if state == ParserState::InItem {
                    item.take_image(&e, reader.decoder());
                }
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    if state != ParserState::Idle {
                        articles.push(std::mem::take(&mut item).into_article(source));
                        state = ParserState::Idle;
                    }
                } else if ParserState::entering(name.as_ref()) == Some(state) {
                    state = ParserState::InItem;
                }
            }
            Event::Text(e) => {
                if let Some(acc) = item.accumulator(state) {
                    match e.unescape() {
                        Ok(text) => append_trimmed(acc, &text),
                        Err(err) => {
                            tracing::debug!(source = %source, error = %err, "Skipping undecodable text");
                        }
                    }
                }
            }
            Event::CData(e) => {
                if let Some(acc) = item.accumulator(state) {
                    append_trimmed(acc, &String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => {
                break (state != ParserState::Idle).then_some(ParseError::UnexpectedEof);
            }
            _ => {}
        }
        buf.clear();
    };

    if let Some(err) = &error {
        tracing::warn!(
            source = %source,
            error = %err,
            recovered = articles.len(),
            "Feed document malformed, keeping items parsed so far"
        );
    }

    ParseResult { articles, error }
}

/// Parses an item's `pubDate`.
///
/// Tries the RSS date format, then any RFC 2822 date (named zones such as
/// `GMT`), then the ISO-8601 `yyyy-MM-ddTHH:mm:ssZ` variant, then RFC 3339.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_str(raw, RSS_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .or_else(|_| DateTime::parse_from_str(raw, ISO_DATE_FORMAT))
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn append_trimmed(acc: &mut String, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        acc.push_str(chunk);
    }
}

fn attribute(e: &BytesStart<'_>, name: &str, decoder: Decoder) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.decode_and_unescape_value(decoder).ok())
        .map(|value| value.into_owned())
}
