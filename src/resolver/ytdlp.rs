use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::{ChannelIdentifier, ResolutionError, VideoLister, VideoRef, VideoStream};
use crate::session::Session;

/// Print template: one `id<TAB>title` line per video
const PRINT_FORMAT: &str = "%(id)s\t%(title)s";
const FALLBACK_TITLE: &str = "video";

/// Channel and playlist listing using yt-dlp in flat-playlist mode
pub struct YtDlpLister {
    yt_dlp_path: String,
    proxy_url: Option<String>,
}

impl YtDlpLister {
    pub fn new(yt_dlp_path: impl Into<String>, session: &Session) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            proxy_url: session.proxy().url().map(str::to_string),
        }
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args([
            "--flat-playlist",
            "--print",
            PRINT_FORMAT,
            "--encoding",
            "utf-8",
            "--no-warnings",
            "-q",
        ]);
        if let Some(proxy) = &self.proxy_url {
            cmd.args(["--proxy", proxy]);
        }
        cmd.arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

struct Listing {
    stdout: BufReader<ChildStdout>,
    child: Child,
    /// Collects stderr while stdout is read so neither pipe can fill up
    stderr: Option<JoinHandle<Vec<u8>>>,
    url: String,
    listed: usize,
}

impl Listing {
    fn new(mut child: Child, stdout: ChildStdout, url: String) -> Self {
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    tracing::debug!("Could not read yt-dlp stderr: {}", e);
                }
                buf
            })
        });

        Self {
            stdout: BufReader::new(stdout),
            child,
            stderr,
            url,
            listed: 0,
        }
    }

    /// Next stdout line. Bytes that are not UTF-8 are replaced rather than
    /// ending the listing.
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.stdout.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Pull the next video, or the exit status once stdout is exhausted
    async fn next_video(mut self) -> Option<(Result<VideoRef, ResolutionError>, Option<Self>)> {
        loop {
            match self.next_line().await {
                Ok(Some(line)) => {
                    if let Some(video) = parse_listing_line(&line) {
                        self.listed += 1;
                        return Some((Ok(video), Some(self)));
                    }
                    tracing::debug!("Skipping listing line without id: {:?}", line);
                }
                Ok(None) => return self.finish().await.map(|err| (Err(err), None)),
                Err(e) => {
                    let err = self.failure(e.to_string());
                    return Some((Err(err), None));
                }
            }
        }
    }

    async fn finish(self) -> Option<ResolutionError> {
        let Listing {
            mut child,
            stderr,
            url,
            listed,
            ..
        } = self;

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => return Some(failure(url, listed, e.to_string())),
        };

        if status.success() {
            tracing::debug!("yt-dlp listed {} videos from {}", listed, url);
            return None;
        }

        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        let stderr = String::from_utf8_lossy(&stderr);
        let reason = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .unwrap_or_else(|| format!("yt-dlp exited with {}", status));

        Some(failure(url, listed, reason))
    }

    fn failure(&self, reason: String) -> ResolutionError {
        failure(self.url.clone(), self.listed, reason)
    }
}

fn failure(url: String, listed: usize, reason: String) -> ResolutionError {
    if listed == 0 {
        ResolutionError::Lookup { url, reason }
    } else {
        ResolutionError::Interrupted {
            url,
            listed,
            reason,
        }
    }
}

/// Parse one `id<TAB>title` line. Lines without an id are dropped.
pub fn parse_listing_line(line: &str) -> Option<VideoRef> {
    let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
    let (id, title) = line.split_once('\t').unwrap_or((line, ""));

    let id = id.trim();
    if id.is_empty() || id == "NA" {
        return None;
    }

    let title = title.trim();
    let title = if title.is_empty() || title == "NA" {
        FALLBACK_TITLE
    } else {
        title
    };

    Some(VideoRef::new(id, title))
}

#[async_trait]
impl VideoLister for YtDlpLister {
    async fn list_videos(
        &self,
        identifier: &ChannelIdentifier,
    ) -> Result<VideoStream, ResolutionError> {
        let url = identifier.listing_url();
        let mut child = self.command(&url).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResolutionError::ToolMissing(format!("{} not found", self.yt_dlp_path))
            } else {
                ResolutionError::Lookup {
                    url: url.clone(),
                    reason: format!("failed to start {}: {}", self.yt_dlp_path, e),
                }
            }
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ResolutionError::Lookup {
            url: url.clone(),
            reason: "yt-dlp stdout was not captured".to_string(),
        })?;

        let mut listing = Listing::new(child, stdout, url);

        // Pull the first entry eagerly so that a failed lookup is reported
        // here rather than as a stream item.
        let first = match listing.next_line().await {
            Ok(first) => first,
            Err(e) => return Err(listing.failure(e.to_string())),
        };

        let Some(first) = first else {
            return match listing.finish().await {
                Some(err) => Err(err),
                None => Ok(stream::empty().boxed()),
            };
        };

        let head: Vec<Result<VideoRef, ResolutionError>> = match parse_listing_line(&first) {
            Some(video) => {
                listing.listed += 1;
                vec![Ok(video)]
            }
            None => Vec::new(),
        };

        let tail = stream::unfold(Some(listing), |state| async move {
            match state {
                Some(listing) => listing.next_video().await,
                None => None,
            }
        });

        Ok(stream::iter(head).chain(tail).boxed())
    }

    fn service_name(&self) -> &'static str {
        "yt-dlp"
    }
}
