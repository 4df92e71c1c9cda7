use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use super::{DownloadOutcome, FailureKind, VideoOutcome};
use crate::utils::format_duration;

/// A video that ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedVideo {
    pub id: String,
    pub title: String,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Aggregate result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier as given on the command line
    pub channel: String,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailedVideo>,

    /// Every processed video, in listing order
    pub outcomes: Vec<VideoOutcome>,
}

impl RunSummary {
    pub(crate) fn start(channel: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            channel: channel.into(),
            output_dir: output_dir.into(),
            started_at: now,
            finished_at: now,
            saved: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, outcome: VideoOutcome) {
        match &outcome.outcome {
            DownloadOutcome::Saved(_) => self.saved += 1,
            DownloadOutcome::Skipped(_) => self.skipped += 1,
            DownloadOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(FailedVideo {
                    id: outcome.video.id.clone(),
                    title: outcome.video.title.clone(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                    attempts: outcome.attempts,
                });
            }
        }
        self.outcomes.push(outcome);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Wall-clock duration of the run in seconds
    pub fn elapsed_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Counts followed by one line per failed video
    pub fn to_text(&self) -> String {
        let mut text = String::new();

        let _ = writeln!(
            text,
            "{} videos processed in {}: {} saved, {} skipped, {} failed",
            self.total(),
            format_duration(self.elapsed_seconds()),
            self.saved,
            self.skipped,
            self.failed
        );
        let _ = writeln!(text, "Output directory: {}", self.output_dir.display());

        if !self.failures.is_empty() {
            let _ = writeln!(text, "Failed videos:");
            for failure in &self.failures {
                let _ = writeln!(
                    text,
                    "  {} [{}] {} (after {} attempt{})",
                    failure.id,
                    failure.kind,
                    failure.message,
                    failure.attempts,
                    if failure.attempts == 1 { "" } else { "s" }
                );
            }
        }

        text
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{SkipReason, VideoFailure};
    use crate::resolver::VideoRef;

    fn outcome(index: usize, id: &str, outcome: DownloadOutcome, attempts: u32) -> VideoOutcome {
        VideoOutcome {
            index,
            video: VideoRef::new(id, format!("Title {}", id)),
            outcome,
            attempts,
        }
    }

    fn sample() -> RunSummary {
        let mut summary = RunSummary::start("@someone", "subtitles");
        let saved = DownloadOutcome::Saved(PathBuf::from("subtitles/a.txt"));
        summary.record(outcome(1, "a", saved, 1));
        summary.record(outcome(
            2,
            "b",
            DownloadOutcome::Skipped(SkipReason::AlreadyExists(PathBuf::from("subtitles/b.txt"))),
            0,
        ));
        summary.record(outcome(
            3,
            "c",
            DownloadOutcome::Failed(VideoFailure {
                kind: FailureKind::RateLimited,
                message: "Rate limited by YouTube: HTTP 429".to_string(),
            }),
            3,
        ));
        summary.finish()
    }

    #[test]
    fn test_counts_and_failures() {
        let summary = sample();

        assert_eq!(summary.total(), 3);
        assert_eq!((summary.saved, summary.skipped, summary.failed), (1, 1, 1));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].id, "c");
        assert_eq!(summary.failures[0].attempts, 3);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn test_text_lists_failed_ids_with_kind() {
        let text = sample().to_text();

        assert!(text.starts_with("3 videos processed in "));
        assert!(text.contains("1 saved, 1 skipped, 1 failed"));
        assert!(
            text.contains("  c [rate_limited] Rate limited by YouTube: HTTP 429 (after 3 attempts)")
        );
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();

        assert_eq!(json["channel"], "@someone");
        assert_eq!(json["saved"], 1);
        assert_eq!(json["failures"][0]["kind"], "rate_limited");
        assert_eq!(json["outcomes"][0]["outcome"]["saved"], "subtitles/a.txt");
        assert_eq!(
            json["outcomes"][1]["outcome"]["skipped"]["already_exists"],
            "subtitles/b.txt"
        );
        assert_eq!(json["outcomes"][2]["video"]["id"], "c");
    }
}
