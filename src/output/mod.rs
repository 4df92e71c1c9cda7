use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::resolver::VideoRef;
use crate::transcript::TranscriptSegment;
use crate::utils::{format_timestamp, sanitize_filename, sanitize_title};

/// Result of writing one transcript file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Saved(PathBuf),
    /// The target existed and overwriting is disabled; nothing was touched
    AlreadyExists(PathBuf),
}

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("File operation failed for {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    fn at(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
        move |source| WriteError::FileSystem {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `"<sanitized title> [<video id>].txt"`
pub fn transcript_filename(video: &VideoRef) -> String {
    format!(
        "{} [{}].txt",
        sanitize_title(&video.title),
        sanitize_filename(&video.id)
    )
}

/// One line per segment, in order, optionally prefixed with `[HH:MM:SS] `
pub fn format_transcript(segments: &[TranscriptSegment], include_timestamps: bool) -> String {
    let mut content = String::new();

    for segment in segments {
        let text = segment.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }

        if include_timestamps {
            content.push_str(&format!("[{}] ", format_timestamp(segment.start)));
        }
        content.push_str(&text);
        content.push('\n');
    }

    content
}

/// Writes transcripts into one output directory
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    output_dir: PathBuf,
    include_timestamps: bool,
    overwrite: bool,
}

impl TranscriptWriter {
    pub fn new(output_dir: impl Into<PathBuf>, include_timestamps: bool, overwrite: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            include_timestamps,
            overwrite,
        }
    }

    pub fn target_path(&self, video: &VideoRef) -> PathBuf {
        self.output_dir.join(transcript_filename(video))
    }

    /// The target already exists and would be left alone
    pub fn would_skip(&self, video: &VideoRef) -> Option<PathBuf> {
        let path = self.target_path(video);
        (!self.overwrite && path.exists()).then_some(path)
    }

    pub fn write(
        &self,
        video: &VideoRef,
        segments: &[TranscriptSegment],
    ) -> Result<WriteOutcome, WriteError> {
        write_transcript(
            &self.output_dir,
            video,
            segments,
            self.include_timestamps,
            self.overwrite,
        )
    }
}

/// Write the transcript of `video` into `output_dir`.
///
/// The content goes to a temporary file in the same directory which is then
/// renamed over the target, so a crash never leaves a truncated transcript.
/// With `overwrite` disabled an existing target is reported and left as is.
pub fn write_transcript(
    output_dir: &Path,
    video: &VideoRef,
    segments: &[TranscriptSegment],
    include_timestamps: bool,
    overwrite: bool,
) -> Result<WriteOutcome, WriteError> {
    fs_err::create_dir_all(output_dir).map_err(WriteError::at(output_dir))?;

    let path = output_dir.join(transcript_filename(video));
    if !overwrite && path.exists() {
        return Ok(WriteOutcome::AlreadyExists(path));
    }

    let content = format_transcript(segments, include_timestamps);

    let mut temp = tempfile::Builder::new()
        .prefix(".yxd-")
        .suffix(".part")
        .tempfile_in(output_dir)
        .map_err(WriteError::at(output_dir))?;
    temp.write_all(content.as_bytes()).map_err(WriteError::at(temp.path()))?;
    temp.as_file().sync_all().map_err(WriteError::at(&path))?;

    if overwrite {
        temp.persist(&path).map_err(|e| WriteError::at(&path)(e.error))?;
        return Ok(WriteOutcome::Saved(path));
    }

    match temp.persist_noclobber(&path) {
        Ok(_) => Ok(WriteOutcome::Saved(path)),
        // Someone created the file since the existence check
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(WriteOutcome::AlreadyExists(path))
        }
        Err(e) => Err(WriteError::at(&path)(e.error)),
    }
}
