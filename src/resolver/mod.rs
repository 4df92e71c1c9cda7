use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub mod ytdlp;

pub use ytdlp::YtDlpLister;

const YOUTUBE_BASE: &str = "https://www.youtube.com";
const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
const PLAYLIST_PREFIXES: &[&str] = &["PL", "UU", "OL", "FL", "LL", "RD"];
const CHANNEL_TABS: &[&str] = &["videos", "shorts", "streams", "live", "podcasts", "playlists"];

/// One video of a channel or playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    /// Stable YouTube video id, never empty
    pub id: String,

    /// Human readable title, not unique and not filesystem safe
    pub title: String,
}

impl VideoRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Errors raised while turning an identifier into a video list
#[derive(thiserror::Error, Debug)]
pub enum ResolutionError {
    #[error("Unrecognized channel identifier: {0}")]
    Unrecognized(String),

    #[error("yt-dlp is not available ({0}). Please install it: https://github.com/yt-dlp/yt-dlp")]
    ToolMissing(String),

    #[error("Lookup of {url} failed: {reason}")]
    Lookup { url: String, reason: String },

    #[error("Listing of {url} stopped after {listed} videos: {reason}")]
    Interrupted {
        url: String,
        listed: usize,
        reason: String,
    },
}

/// The supported ways of naming a collection of videos
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelIdentifier {
    /// `@handle`, with an optional channel tab
    Handle { handle: String, tab: Option<String> },
    /// `UC...` channel id
    Channel { id: String, tab: Option<String> },
    /// Legacy `/user/<name>` page
    User { name: String, tab: Option<String> },
    /// Legacy `/c/<name>` custom URL
    Custom { name: String, tab: Option<String> },
    Playlist { id: String },
}

impl ChannelIdentifier {
    /// Parse any of the accepted identifier forms
    pub fn parse(input: &str) -> Result<Self, ResolutionError> {
        let trimmed = input.trim();
        let unrecognized = || ResolutionError::Unrecognized(input.to_string());

        if trimmed.is_empty() {
            return Err(unrecognized());
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Self::parse_url(trimmed).ok_or_else(unrecognized);
        }

        // Host without scheme, e.g. "youtube.com/@name"
        if YOUTUBE_HOSTS.iter().any(|host| trimmed.starts_with(&format!("{}/", host))) {
            return Self::parse_url(&format!("https://{}", trimmed)).ok_or_else(unrecognized);
        }

        if let Some(handle) = trimmed.strip_prefix('@') {
            return Self::path_identifier(&["@".to_string() + handle]).ok_or_else(unrecognized);
        }

        if trimmed.contains('/') {
            let segments: Vec<String> = trimmed
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return Self::path_identifier(&segments).ok_or_else(unrecognized);
        }

        if is_channel_id(trimmed) {
            return Ok(ChannelIdentifier::Channel {
                id: trimmed.to_string(),
                tab: None,
            });
        }

        if is_playlist_id(trimmed) {
            return Ok(ChannelIdentifier::Playlist {
                id: trimmed.to_string(),
            });
        }

        Err(unrecognized())
    }

    fn parse_url(input: &str) -> Option<Self> {
        let url = Url::parse(input).ok()?;
        let host = url.host_str()?.to_lowercase();
        if !YOUTUBE_HOSTS.contains(&host.as_str()) {
            return None;
        }

        if let Some((_, list)) = url.query_pairs().find(|(key, _)| key == "list") {
            let list = list.trim();
            if !list.is_empty() && is_valid_id_chars(list) {
                return Some(ChannelIdentifier::Playlist {
                    id: list.to_string(),
                });
            }
        }

        let segments: Vec<String> = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self::path_identifier(&segments)
    }

    fn path_identifier(segments: &[String]) -> Option<Self> {
        let first = segments.first()?;

        if let Some(handle) = first.strip_prefix('@') {
            if handle.is_empty() || !is_valid_handle(handle) {
                return None;
            }
            return Some(ChannelIdentifier::Handle {
                handle: handle.to_string(),
                tab: channel_tab(&segments[1..])?,
            });
        }

        let name = segments.get(1)?;
        if !is_valid_id_chars(name) {
            return None;
        }
        let tab = channel_tab(&segments[2..])?;

        match first.as_str() {
            "channel" if is_channel_id(name) => Some(ChannelIdentifier::Channel {
                id: name.clone(),
                tab,
            }),
            "user" => Some(ChannelIdentifier::User {
                name: name.clone(),
                tab,
            }),
            "c" => Some(ChannelIdentifier::Custom {
                name: name.clone(),
                tab,
            }),
            _ => None,
        }
    }

    /// URL handed to the listing service. Channel-like identifiers default
    /// to their `videos` tab.
    pub fn listing_url(&self) -> String {
        let tab = |tab: &Option<String>| tab.clone().unwrap_or_else(|| "videos".to_string());

        match self {
            ChannelIdentifier::Handle { handle, tab: t } => {
                format!("{}/@{}/{}", YOUTUBE_BASE, handle, tab(t))
            }
            ChannelIdentifier::Channel { id, tab: t } => {
                format!("{}/channel/{}/{}", YOUTUBE_BASE, id, tab(t))
            }
            ChannelIdentifier::User { name, tab: t } => {
                format!("{}/user/{}/{}", YOUTUBE_BASE, name, tab(t))
            }
            ChannelIdentifier::Custom { name, tab: t } => {
                format!("{}/c/{}/{}", YOUTUBE_BASE, name, tab(t))
            }
            ChannelIdentifier::Playlist { id } => {
                format!("{}/playlist?list={}", YOUTUBE_BASE, id)
            }
        }
    }
}

impl fmt::Display for ChannelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelIdentifier::Handle { handle, .. } => write!(f, "@{}", handle),
            ChannelIdentifier::Channel { id, .. } => write!(f, "channel {}", id),
            ChannelIdentifier::User { name, .. } => write!(f, "user {}", name),
            ChannelIdentifier::Custom { name, .. } => write!(f, "custom URL {}", name),
            ChannelIdentifier::Playlist { id } => write!(f, "playlist {}", id),
        }
    }
}

/// `Some(None)` when no tab follows, `None` when what follows is not a tab
fn channel_tab(rest: &[String]) -> Option<Option<String>> {
    match rest {
        [] => Some(None),
        [tab] if CHANNEL_TABS.contains(&tab.as_str()) => Some(Some(tab.clone())),
        _ => None,
    }
}

fn is_valid_id_chars(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_valid_handle(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn is_channel_id(value: &str) -> bool {
    value.len() == 24 && value.starts_with("UC") && is_valid_id_chars(value)
}

fn is_playlist_id(value: &str) -> bool {
    value.len() >= 12
        && PLAYLIST_PREFIXES.iter().any(|p| value.starts_with(p))
        && is_valid_id_chars(value)
}

/// Lazy, finite, non-restartable sequence of videos in upstream order
pub type VideoStream = BoxStream<'static, Result<VideoRef, ResolutionError>>;

/// Service that enumerates the videos behind an identifier
#[async_trait]
pub trait VideoLister: Send + Sync {
    /// Start listing. Errors before the first video are returned here;
    /// a failure after some videos were listed is the last stream item.
    async fn list_videos(
        &self,
        identifier: &ChannelIdentifier,
    ) -> Result<VideoStream, ResolutionError>;

    /// Name of the backing service
    fn service_name(&self) -> &'static str;
}

/// Parse `identifier` and start listing its videos
pub async fn resolve(
    lister: &dyn VideoLister,
    identifier: &str,
) -> Result<VideoStream, ResolutionError> {
    let parsed = ChannelIdentifier::parse(identifier)?;
    tracing::info!("Listing videos of {} via {}", parsed, lister.service_name());
    tracing::debug!("Listing URL: {}", parsed.listing_url());
    lister.list_videos(&parsed).await
}
