use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod timedtext;
pub mod youtube;

pub use youtube::YoutubeTranscriptFetcher;

/// One timed line of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Offset from the start of the video
    pub start: Duration,

    /// How long the line stays on screen
    pub duration: Duration,

    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: Duration, text: impl Into<String>) -> Self {
        Self {
            start,
            duration: Duration::ZERO,
            text: text.into(),
        }
    }
}

/// Why a transcript could not be fetched
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Transcripts are disabled for this video")]
    Disabled,

    #[error("No transcript in {requested:?} (available: {available:?})")]
    NoTranscript {
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("Rate limited by YouTube: {0}")]
    RateLimited(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Video is not playable: {0}")]
    Unplayable(String),

    #[error("Transcript has no text")]
    EmptyTranscript,

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Transport-level rejections that may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited(_) | FetchError::Proxy(_))
    }
}

/// Retrieves the transcript of one video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch the segments of the first available transcript among
    /// `languages`, in chronological order
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Vec<TranscriptSegment>, FetchError>;
}

/// A caption track offered for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub name: String,
    pub base_url: String,
    /// Automatic speech recognition track
    pub is_generated: bool,
}

/// Pick the track to download.
///
/// Languages are tried in order and the first one with any track wins; a
/// manually created track is preferred over a generated one in the same
/// language. Without languages the first manual track, else the first track,
/// is used.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
) -> Option<&'a CaptionTrack> {
    if languages.is_empty() {
        return tracks
            .iter()
            .find(|track| !track.is_generated)
            .or_else(|| tracks.first());
    }

    languages.iter().find_map(|language| {
        let matches = |track: &&CaptionTrack| track.language_code.eq_ignore_ascii_case(language);

        tracks
            .iter()
            .filter(matches)
            .find(|track| !track.is_generated)
            .or_else(|| tracks.iter().find(matches))
    })
}

/// Language codes of all tracks, manual ones first, without duplicates
pub fn available_languages(tracks: &[CaptionTrack]) -> Vec<String> {
    let mut languages: Vec<String> = Vec::new();
    let manual = tracks.iter().filter(|t| !t.is_generated);
    let generated = tracks.iter().filter(|t| t.is_generated);

    for track in manual.chain(generated) {
        let label = if track.is_generated {
            format!("{} (auto)", track.language_code)
        } else {
            track.language_code.clone()
        };
        if !languages.contains(&label) {
            languages.push(label);
        }
    }

    languages
}
