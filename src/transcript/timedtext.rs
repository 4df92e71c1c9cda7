//! Parsing of YouTube's timedtext caption format.
//!
//! A track is a flat XML document of `<text start="1.5" dur="2.0">line</text>`
//! elements. Text is entity-escaped once at XML level and often once more at
//! HTML level, and may carry `<font>`/`<i>` markup.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use std::time::Duration;

use super::{FetchError, TranscriptSegment};

static TEXT_RE: OnceLock<Regex> = OnceLock::new();
static ATTR_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static ENTITY_RE: OnceLock<Regex> = OnceLock::new();

fn text_re() -> &'static Regex {
    TEXT_RE.get_or_init(|| Regex::new(r"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)").unwrap())
}

fn attr_re() -> &'static Regex {
    ATTR_RE.get_or_init(|| Regex::new(r#"\b(start|dur)="([^"]*)""#).unwrap())
}

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap())
}

fn entity_re() -> &'static Regex {
    ENTITY_RE.get_or_init(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap())
}

/// Parse a timedtext document into chronological segments.
///
/// Elements whose text is blank after cleanup are dropped.
pub fn parse_timedtext(xml: &str) -> Result<Vec<TranscriptSegment>, FetchError> {
    if !xml.contains("<transcript") && !xml.contains("<text") {
        return Err(FetchError::Parse(
            "caption track is not a timedtext document".to_string(),
        ));
    }

    let mut segments = Vec::new();

    for element in text_re().captures_iter(xml) {
        let attrs = element.get(1).map_or("", |m| m.as_str());
        let mut start = None;
        let mut dur = None;
        for attr in attr_re().captures_iter(attrs) {
            match &attr[1] {
                "start" => start = Some(parse_seconds(&attr[2])?),
                _ => dur = Some(parse_seconds(&attr[2])?),
            }
        }

        let Some(start) = start else {
            return Err(FetchError::Parse("text element without start".to_string()));
        };

        let raw = element.get(2).map_or("", |m| m.as_str());
        let text = clean_text(raw);
        if text.is_empty() {
            continue;
        }

        segments.push(TranscriptSegment {
            start,
            duration: dur.unwrap_or(Duration::ZERO),
            text,
        });
    }

    Ok(segments)
}

fn parse_seconds(value: &str) -> Result<Duration, FetchError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| FetchError::Parse(format!("invalid time value {:?}", value)))
}

/// Unescape, strip markup and fold the text onto a single line
fn clean_text(raw: &str) -> String {
    let xml_level = unescape(raw);
    let without_tags = tag_re().replace_all(&xml_level, "");
    let html_level = unescape(&without_tags);

    html_level.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode named and numeric character references
pub fn unescape(text: &str) -> String {
    entity_re()
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let hex = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X"));
            let decoded = if let Some(hex) = hex {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };

            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
