use futures_util::StreamExt;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RunConfig;
use crate::output::{TranscriptWriter, WriteError, WriteOutcome};
use crate::resolver::{self, VideoLister, VideoRef, YtDlpLister};
use crate::session::Session;
use crate::transcript::{FetchError, TranscriptFetcher, YoutubeTranscriptFetcher};
use crate::RunError;

pub mod retry;
pub mod summary;

pub use retry::{fetch_with_retry, AttemptOutcome, RetryPolicy, RetryState};
pub use summary::{FailedVideo, RunSummary};

/// Why a video was not written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyExists(PathBuf),
}

/// Error category of a failed video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Disabled,
    NoTranscript,
    RateLimited,
    Proxy,
    Unplayable,
    EmptyTranscript,
    Http,
    Parse,
    FileSystem,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Disabled => "disabled",
            FailureKind::NoTranscript => "no_transcript",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Proxy => "proxy",
            FailureKind::Unplayable => "unplayable",
            FailureKind::EmptyTranscript => "empty_transcript",
            FailureKind::Http => "http",
            FailureKind::Parse => "parse",
            FailureKind::FileSystem => "file_system",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&FetchError> for FailureKind {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::NotFound(_) => FailureKind::NotFound,
            FetchError::Disabled => FailureKind::Disabled,
            FetchError::NoTranscript { .. } => FailureKind::NoTranscript,
            FetchError::RateLimited(_) => FailureKind::RateLimited,
            FetchError::Proxy(_) => FailureKind::Proxy,
            FetchError::Unplayable(_) => FailureKind::Unplayable,
            FetchError::EmptyTranscript => FailureKind::EmptyTranscript,
            FetchError::Http(_) => FailureKind::Http,
            FetchError::Parse(_) => FailureKind::Parse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<FetchError> for VideoFailure {
    fn from(err: FetchError) -> Self {
        Self {
            kind: FailureKind::from(&err),
            message: err.to_string(),
        }
    }
}

impl From<WriteError> for VideoFailure {
    fn from(err: WriteError) -> Self {
        Self {
            kind: FailureKind::FileSystem,
            message: err.to_string(),
        }
    }
}

/// Final state of one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadOutcome {
    Saved(PathBuf),
    Skipped(SkipReason),
    Failed(VideoFailure),
}

impl DownloadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed(_))
    }
}

/// Outcome of one video together with its position in the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoOutcome {
    /// 1-based position in the listing
    pub index: usize,
    pub video: VideoRef,
    pub outcome: DownloadOutcome,

    /// Fetch attempts made, 0 when the video was skipped without fetching
    pub attempts: u32,
}

/// Drives a run: list the videos, fetch each transcript and write it out
pub struct DownloadPipeline {
    config: RunConfig,
    lister: Box<dyn VideoLister>,
    fetcher: Box<dyn TranscriptFetcher>,
    writer: TranscriptWriter,
}

impl DownloadPipeline {
    /// Pipeline backed by yt-dlp for listing and YouTube for transcripts,
    /// both going through `session`
    pub fn new(config: RunConfig, session: Arc<Session>, yt_dlp_path: impl Into<String>) -> Self {
        let lister = YtDlpLister::new(yt_dlp_path, &session);
        let fetcher = YoutubeTranscriptFetcher::new(session);

        Self::with_components(config, Box::new(lister), Box::new(fetcher))
    }

    pub fn with_components(
        config: RunConfig,
        lister: Box<dyn VideoLister>,
        fetcher: Box<dyn TranscriptFetcher>,
    ) -> Self {
        let writer = TranscriptWriter::new(
            &config.output_dir,
            config.include_timestamps,
            config.overwrite,
        );

        Self {
            config,
            lister,
            fetcher,
            writer,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Process every listed video in order, reporting each outcome to
    /// `on_outcome` as soon as it is known.
    ///
    /// Only a listing failure aborts the run; video-level errors end up in
    /// the summary.
    pub async fn run<F>(&self, mut on_outcome: F) -> Result<RunSummary, RunError>
    where
        F: FnMut(&VideoOutcome),
    {
        let mut summary = RunSummary::start(&self.config.channel, &self.config.output_dir);
        let mut videos = resolver::resolve(self.lister.as_ref(), &self.config.channel).await?;
        let mut processed = 0usize;

        loop {
            if let Some(max) = self.config.max_videos {
                if processed >= max {
                    tracing::info!("Reached the limit of {} videos", max);
                    break;
                }
            }

            let Some(item) = videos.next().await else {
                break;
            };
            let video = item?;

            if processed > 0 && !self.config.sleep.is_zero() {
                tracing::debug!(
                    "Sleeping {:.1}s before next video",
                    self.config.sleep.as_secs_f64()
                );
                tokio::time::sleep(self.config.sleep).await;
            }

            processed += 1;
            let outcome = self.process(processed, video).await;
            on_outcome(&outcome);
            summary.record(outcome);
        }

        let summary = summary.finish();
        tracing::info!(
            "Run finished: {} saved, {} skipped, {} failed",
            summary.saved,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }

    async fn process(&self, index: usize, video: VideoRef) -> VideoOutcome {
        if let Some(path) = self.writer.would_skip(&video) {
            tracing::info!("[{}] Skipping {}: {} already exists", index, video.id, path.display());
            return VideoOutcome {
                index,
                video,
                outcome: DownloadOutcome::Skipped(SkipReason::AlreadyExists(path)),
                attempts: 0,
            };
        }

        tracing::info!("[{}] Fetching transcript for {} ({})", index, video.id, video.title);
        let fetched = fetch_with_retry(
            self.fetcher.as_ref(),
            &video.id,
            &self.config.languages,
            &self.config.retry,
        )
        .await;

        let outcome = match fetched.result {
            Ok(segments) if segments.iter().all(|s| s.text.trim().is_empty()) => {
                DownloadOutcome::Failed(FetchError::EmptyTranscript.into())
            }
            Ok(segments) => match self.writer.write(&video, &segments) {
                Ok(WriteOutcome::Saved(path)) => DownloadOutcome::Saved(path),
                Ok(WriteOutcome::AlreadyExists(path)) => {
                    DownloadOutcome::Skipped(SkipReason::AlreadyExists(path))
                }
                Err(e) => DownloadOutcome::Failed(e.into()),
            },
            Err(e) => DownloadOutcome::Failed(e.into()),
        };

        match &outcome {
            DownloadOutcome::Saved(path) => tracing::info!("[{}] Saved {}", index, path.display()),
            DownloadOutcome::Skipped(SkipReason::AlreadyExists(path)) => {
                tracing::info!("[{}] Kept existing {}", index, path.display())
            }
            DownloadOutcome::Failed(failure) => tracing::warn!(
                "[{}] Failed {} after {} attempt(s): {}",
                index,
                video.id,
                fetched.attempts,
                failure.message
            ),
        }

        VideoOutcome {
            index,
            video,
            outcome,
            attempts: fetched.attempts,
        }
    }
}
