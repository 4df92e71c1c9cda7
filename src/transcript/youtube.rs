use async_trait::async_trait;
use regex::Regex;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};

use super::timedtext::parse_timedtext;
use super::{
    available_languages, select_track, CaptionTrack, FetchError, TranscriptFetcher,
    TranscriptSegment,
};
use crate::session::Session;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?key=";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

static API_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn api_key_re() -> &'static Regex {
    API_KEY_RE.get_or_init(|| Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).unwrap())
}

/// Transcript retrieval from YouTube's innertube player endpoint
pub struct YoutubeTranscriptFetcher {
    session: Arc<Session>,
}

impl YoutubeTranscriptFetcher {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn watch_page(&self, video_id: &str) -> Result<String, FetchError> {
        let url = format!("{}{}", WATCH_URL, video_id);
        let response = self
            .session
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let html = self.check_status(response)?.text().await.map_err(|e| self.transport_error(e))?;

        if html.contains("class=\"g-recaptcha\"") {
            return Err(FetchError::RateLimited(
                "YouTube answered with a reCAPTCHA challenge".to_string(),
            ));
        }

        Ok(html)
    }

    async fn player(&self, video_id: &str, api_key: &str) -> Result<Value, FetchError> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        let response = self
            .session
            .client()
            .post(format!("{}{}", PLAYER_URL, api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.check_status(response)?
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Parse(format!("player response: {}", e)))
    }

    async fn track_text(&self, track: &CaptionTrack) -> Result<String, FetchError> {
        let url = track.base_url.replace("&fmt=srv3", "");
        let response = self
            .session
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.check_status(response)?
            .text()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if self.session.uses_proxy() && (err.is_connect() || err.is_timeout()) {
            FetchError::Proxy(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }

    fn check_status(&self, response: Response) -> Result<Response, FetchError> {
        classify_status(response.status())?;
        Ok(response)
    }
}

/// Map an HTTP status to the fetch error it stands for
pub fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited(format!("HTTP {}", status))),
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
            Err(FetchError::Proxy(format!("HTTP {}", status)))
        }
        s => Err(FetchError::Http(format!("HTTP {}", s))),
    }
}

pub fn extract_api_key(html: &str) -> Option<&str> {
    api_key_re()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Check the player's playability status
pub fn check_playability(player: &Value) -> Result<(), FetchError> {
    let status = &player["playabilityStatus"];
    let reason = status["reason"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| "no reason given".to_string());

    match status["status"].as_str() {
        None | Some("OK") => Ok(()),
        Some("ERROR") => Err(FetchError::NotFound(reason)),
        Some("LOGIN_REQUIRED") if reason.to_lowercase().contains("bot") => {
            Err(FetchError::RateLimited(reason))
        }
        Some(_) => Err(FetchError::Unplayable(reason)),
    }
}

/// Caption tracks announced by a player response
pub fn caption_tracks(player: &Value) -> Result<Vec<CaptionTrack>, FetchError> {
    check_playability(player)?;

    let tracks = player["captions"]["playerCaptionsTracklistRenderer"]["captionTracks"]
        .as_array()
        .ok_or(FetchError::Disabled)?;

    let tracks: Vec<CaptionTrack> = tracks
        .iter()
        .filter_map(|track| {
            let base_url = track["baseUrl"].as_str()?;
            let language_code = track["languageCode"].as_str()?;
            let name = track["name"]["runs"][0]["text"]
                .as_str()
                .or_else(|| track["name"]["simpleText"].as_str())
                .unwrap_or(language_code);

            Some(CaptionTrack {
                language_code: language_code.to_string(),
                name: name.to_string(),
                base_url: base_url.to_string(),
                is_generated: track["kind"].as_str() == Some("asr"),
            })
        })
        .collect();

    if tracks.is_empty() {
        return Err(FetchError::Disabled);
    }

    Ok(tracks)
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptFetcher {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> Result<Vec<TranscriptSegment>, FetchError> {
        tracing::debug!("Fetching transcript for {}", video_id);

        let html = self.watch_page(video_id).await?;
        let api_key = extract_api_key(&html)
            .ok_or_else(|| {
                FetchError::Parse("innertube API key not found on watch page".to_string())
            })?;

        let player = self.player(video_id, api_key).await?;
        let tracks = caption_tracks(&player)?;

        let track = select_track(&tracks, languages).ok_or_else(|| FetchError::NoTranscript {
            requested: languages.to_vec(),
            available: available_languages(&tracks),
        })?;
        tracing::debug!(
            "Using {} track {:?} for {}",
            if track.is_generated { "generated" } else { "manual" },
            track.language_code,
            video_id
        );

        let xml = self.track_text(track).await?;
        let segments = parse_timedtext(&xml)?;

        if segments.is_empty() {
            return Err(FetchError::EmptyTranscript);
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_api_key() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY":"AIzaSyA-test_KEY","OTHER":1})</script>"#;
        assert_eq!(extract_api_key(html), Some("AIzaSyA-test_KEY"));
        assert_eq!(extract_api_key("<html></html>"), None);
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Err(FetchError::RateLimited(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED),
            Err(FetchError::Proxy(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(FetchError::Http(_))
        ));
    }

    #[test]
    fn test_playability() {
        let ok = json!({"playabilityStatus": {"status": "OK"}});
        assert!(check_playability(&ok).is_ok());

        let missing = json!({
            "playabilityStatus": {"status": "ERROR", "reason": "This video is unavailable"}
        });
        assert_eq!(
            check_playability(&missing),
            Err(FetchError::NotFound("This video is unavailable".to_string()))
        );

        let bot = json!({
            "playabilityStatus": {
                "status": "LOGIN_REQUIRED",
                "reason": "Sign in to confirm you're not a bot"
            }
        });
        assert!(matches!(check_playability(&bot), Err(FetchError::RateLimited(_))));

        let private = json!({
            "playabilityStatus": {"status": "LOGIN_REQUIRED", "reason": "This video is private"}
        });
        assert!(matches!(check_playability(&private), Err(FetchError::Unplayable(_))));
    }

    #[test]
    fn test_caption_tracks() {
        let player = json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {
                    "baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=en&fmt=srv3",
                    "languageCode": "en",
                    "name": {"runs": [{"text": "English"}]}
                },
                {
                    "baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=en&kind=asr",
                    "languageCode": "en",
                    "kind": "asr",
                    "name": {"simpleText": "English (auto-generated)"}
                },
                {"languageCode": "de"}
            ]}}
        });

        let tracks = caption_tracks(&player).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "English");
        assert!(!tracks[0].is_generated);
        assert_eq!(tracks[1].name, "English (auto-generated)");
        assert!(tracks[1].is_generated);
    }

    #[test]
    fn test_missing_captions_means_disabled() {
        let player = json!({"playabilityStatus": {"status": "OK"}, "videoDetails": {}});
        assert_eq!(caption_tracks(&player), Err(FetchError::Disabled));

        let empty = json!({"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": []}}});
        assert_eq!(caption_tracks(&empty), Err(FetchError::Disabled));
    }
}
