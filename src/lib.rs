//! yxd - download the transcripts of every video in a YouTube channel
//!
//! This library enumerates the videos of a channel, handle, user page or playlist
//! and saves a transcript for each of them to a local text file, optionally routing
//! every request through a single HTTP(S) proxy.

pub mod cli;
pub mod config;
pub mod download;
pub mod output;
pub mod proxy;
pub mod resolver;
pub mod session;
pub mod transcript;
pub mod utils;

pub use cli::{Cli, Commands, SummaryFormat};
pub use config::{Config, RunConfig};
pub use download::{DownloadOutcome, DownloadPipeline, RunSummary};
pub use proxy::ProxyConfig;
pub use resolver::{ChannelIdentifier, VideoLister, VideoRef};
pub use session::Session;
pub use transcript::{FetchError, TranscriptFetcher, TranscriptSegment};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors that abort a whole run
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("Channel resolution failed: {0}")]
    Resolution(#[from] resolver::ResolutionError),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Session setup failed: {0}")]
    Session(String),
}

impl From<proxy::ProxyError> for RunError {
    fn from(err: proxy::ProxyError) -> Self {
        match err {
            proxy::ProxyError::Cancelled => RunError::Cancelled,
            other => RunError::Session(other.to_string()),
        }
    }
}
