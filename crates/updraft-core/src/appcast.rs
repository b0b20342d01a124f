//! Appcast feed parsing.
//!
//! Two formats are understood: Sparkle-style RSS (`<item>` elements with an
//! `<enclosure>`), and a JSON document with an `items` array. Items are
//! parsed one at a time; an item that cannot become a [`ReleaseCandidate`]
//! is logged and skipped, and the parse only fails when nothing usable
//! remains.

use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::fetch::FeedDocument;
use crate::version::{Version, VersionError};

/// A single release entry extracted from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    version: Version,
    display_version: String,
    title: String,
    download_url: Url,
    published_at: Option<DateTime<FixedOffset>>,
    release_notes_url: Option<Url>,
    description: Option<String>,
    download_size: Option<u64>,
}

impl ReleaseCandidate {
    /// Version used for comparison against the running application.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Human-facing version string (`sparkle:shortVersionString` when present).
    #[must_use]
    pub fn display_version(&self) -> &str {
        &self.display_version
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn download_url(&self) -> &Url {
        &self.download_url
    }

    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<FixedOffset>> {
        self.published_at
    }

    #[must_use]
    pub fn release_notes_url(&self) -> Option<&Url> {
        self.release_notes_url.as_ref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn download_size(&self) -> Option<u64> {
        self.download_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed update feed: {0}")]
    Malformed(String),
    #[error("update feed contains no usable releases")]
    NoCandidates,
}

#[derive(Debug, Error)]
enum SkipReason {
    #[error("no version")]
    MissingVersion,
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("no download URL")]
    MissingUrl,
    #[error("invalid download URL '{url}': {details}")]
    InvalidUrl { url: String, details: String },
    #[error("targets another operating system ({0})")]
    OtherOs(String),
    #[error("invalid item: {0}")]
    InvalidJson(String),
}

/// Parse a feed document into candidates, in document order.
///
/// # Errors
/// Returns [`ParseError::Malformed`] when the document is not valid UTF-8
/// or not well-formed XML/JSON, and [`ParseError::NoCandidates`] when no
/// item survives validation.
pub fn parse(doc: FeedDocument) -> Result<Vec<ReleaseCandidate>, ParseError> {
    let json = is_json(&doc);
    let text = String::from_utf8(doc.body)
        .map_err(|error| ParseError::Malformed(format!("feed is not UTF-8: {error}")))?;

    let raw_items = if json {
        parse_json_items(&text)?
    } else {
        parse_rss_items(&text)?
    };
    let total = raw_items.len();

    let candidates: Vec<ReleaseCandidate> = raw_items
        .into_iter()
        .enumerate()
        .filter_map(
            |(idx, item)| match item.and_then(RawItem::into_candidate) {
                Ok(candidate) => Some(candidate),
                Err(reason) => {
                    warn!("Skipping appcast item {idx}: {reason}");
                    None
                }
            },
        )
        .collect();

    debug!(
        "Parsed {} of {total} appcast items ({})",
        candidates.len(),
        if json { "json" } else { "rss" }
    );

    if candidates.is_empty() {
        return Err(ParseError::NoCandidates);
    }
    Ok(candidates)
}

fn is_json(doc: &FeedDocument) -> bool {
    let declared = doc
        .content_type
        .as_deref()
        .is_some_and(|content_type| content_type.to_ascii_lowercase().contains("json"));
    declared
        || doc
            .body
            .iter()
            .find(|byte| !byte.is_ascii_whitespace())
            .is_some_and(|&byte| byte == b'{')
}

#[derive(Debug, Default)]
struct RawItem {
    title: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    release_notes_link: Option<String>,
    version: Option<String>,
    short_version: Option<String>,
    url: Option<String>,
    length: Option<String>,
    os: Option<String>,
}

impl RawItem {
    fn into_candidate(self) -> Result<ReleaseCandidate, SkipReason> {
        if let Some(os) = non_empty(self.os.as_deref())
            && !os.eq_ignore_ascii_case(std::env::consts::OS)
        {
            return Err(SkipReason::OtherOs(os.to_string()));
        }

        let version_text = non_empty(self.version.as_deref())
            .or_else(|| non_empty(self.short_version.as_deref()))
            .ok_or(SkipReason::MissingVersion)?;
        let version = Version::parse(version_text)?;
        let display_version = non_empty(self.short_version.as_deref())
            .unwrap_or(version_text)
            .to_string();

        let url = non_empty(self.url.as_deref()).ok_or(SkipReason::MissingUrl)?;
        let download_url = Url::parse(url).map_err(|error| SkipReason::InvalidUrl {
            url: url.to_string(),
            details: error.to_string(),
        })?;

        let title = non_empty(self.title.as_deref())
            .map_or_else(|| format!("Version {display_version}"), str::to_string);

        Ok(ReleaseCandidate {
            title,
            published_at: non_empty(self.pub_date.as_deref()).and_then(parse_timestamp),
            release_notes_url: non_empty(self.release_notes_link.as_deref())
                .and_then(|link| Url::parse(link).ok()),
            description: non_empty(self.description.as_deref()).map(str::to_string),
            download_size: non_empty(self.length.as_deref())
                .and_then(|length| length.parse::<u64>().ok())
                .filter(|&size| size > 0),
            download_url,
            display_version,
            version,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Description,
    PubDate,
    ReleaseNotesLink,
    Version,
    ShortVersion,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Self::Title),
            b"description" => Some(Self::Description),
            b"pubDate" => Some(Self::PubDate),
            b"sparkle:releaseNotesLink" => Some(Self::ReleaseNotesLink),
            b"sparkle:version" => Some(Self::Version),
            b"sparkle:shortVersionString" => Some(Self::ShortVersion),
            _ => None,
        }
    }

    fn slot(self, item: &mut RawItem) -> &mut Option<String> {
        match self {
            Self::Title => &mut item.title,
            Self::Description => &mut item.description,
            Self::PubDate => &mut item.pub_date,
            Self::ReleaseNotesLink => &mut item.release_notes_link,
            Self::Version => &mut item.version,
            Self::ShortVersion => &mut item.short_version,
        }
    }
}

fn malformed(error: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed(error.to_string())
}

fn parse_rss_items(text: &str) -> Result<Vec<Result<RawItem, SkipReason>>, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    // Field being read and the text collected for it so far.
    let mut pending: Option<(Field, String)> = None;
    let mut depth = 0_usize;
    let mut saw_element = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(element) => {
                saw_element = true;
                depth += 1;
                pending = None;
                match element.name().as_ref() {
                    b"item" => current = Some(RawItem::default()),
                    b"enclosure" => {
                        if let Some(item) = current.as_mut() {
                            read_enclosure(item, &element)?;
                        }
                    }
                    tag => {
                        if current.is_some() {
                            pending = Field::from_tag(tag).map(|field| (field, String::new()));
                        }
                    }
                }
            }
            Event::Empty(element) => {
                saw_element = true;
                if element.name().as_ref() == b"enclosure"
                    && let Some(item) = current.as_mut()
                {
                    read_enclosure(item, &element)?;
                }
            }
            Event::Text(text) => {
                if let Some((_, buffer)) = pending.as_mut() {
                    buffer.push_str(&text.unescape().map_err(malformed)?);
                }
            }
            Event::CData(data) => {
                if let Some((_, buffer)) = pending.as_mut() {
                    let data = data.into_inner();
                    buffer.push_str(std::str::from_utf8(&data).map_err(malformed)?);
                }
            }
            Event::End(element) => {
                depth = depth.saturating_sub(1);
                if let (Some((field, value)), Some(item)) = (pending.take(), current.as_mut())
                    && !value.trim().is_empty()
                {
                    // Element text replaces anything an enclosure attribute set.
                    *field.slot(item) = Some(value);
                }
                if element.name().as_ref() == b"item"
                    && let Some(item) = current.take()
                {
                    items.push(Ok(item));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_element {
        return Err(ParseError::Malformed(
            "feed has no XML root element".to_string(),
        ));
    }
    if depth > 0 {
        return Err(ParseError::Malformed(format!(
            "feed ends with {depth} unclosed element(s)"
        )));
    }
    Ok(items)
}

fn read_enclosure(item: &mut RawItem, element: &BytesStart<'_>) -> Result<(), ParseError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        let slot = match attribute.key.as_ref() {
            b"url" => &mut item.url,
            b"length" => &mut item.length,
            b"sparkle:os" => &mut item.os,
            b"sparkle:version" => &mut item.version,
            b"sparkle:shortVersionString" => &mut item.short_version,
            _ => continue,
        };
        // Element values (e.g. <sparkle:version>) take precedence.
        slot.get_or_insert(value);
    }
    Ok(())
}

#[derive(Deserialize)]
struct JsonFeed {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// One JSON feed entry. Only `version` and `url` are required to have the
/// right type; an optional field of the wrong type is dropped.
#[derive(Deserialize)]
struct JsonItem {
    version: String,
    url: String,
    #[serde(default)]
    short_version: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<serde_json::Value>,
    #[serde(default)]
    published_at: Option<serde_json::Value>,
    #[serde(default)]
    release_notes_url: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    size: Option<serde_json::Value>,
    #[serde(default)]
    os: Option<serde_json::Value>,
}

fn json_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(text) => Some(text),
        _ => None,
    }
}

/// Sizes may be written as a number or as a numeric string, like RSS `length`.
fn json_size(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(number) => number.as_u64().map(|size| size.to_string()),
        serde_json::Value::String(text) => Some(text),
        _ => None,
    }
}

impl From<JsonItem> for RawItem {
    fn from(item: JsonItem) -> Self {
        Self {
            title: json_text(item.title),
            description: json_text(item.description),
            pub_date: json_text(item.published_at),
            release_notes_link: json_text(item.release_notes_url),
            version: Some(item.version),
            short_version: json_text(item.short_version),
            url: Some(item.url),
            length: json_size(item.size),
            os: json_text(item.os),
        }
    }
}

fn parse_json_items(text: &str) -> Result<Vec<Result<RawItem, SkipReason>>, ParseError> {
    let feed: JsonFeed = serde_json::from_str(text).map_err(malformed)?;
    Ok(feed
        .items
        .into_iter()
        .map(|value| {
            serde_json::from_value::<JsonItem>(value)
                .map(RawItem::from)
                .map_err(|error| SkipReason::InvalidJson(error.to_string()))
        })
        .collect())
}
