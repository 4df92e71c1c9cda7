use std::time::Duration;

/// Longest title kept in a file name, in characters
pub const MAX_TITLE_LENGTH: usize = 150;
/// Longest title kept in a file name, in UTF-8 bytes. Leaves room for the
/// ` [<id>].txt` suffix within the usual 255-byte name limit.
pub const MAX_TITLE_BYTES: usize = 200;
const FALLBACK_TITLE: &str = "video";

/// Replace characters that are illegal in file names with underscores
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Make a video title usable as the stem of a file name.
///
/// Illegal characters become underscores, whitespace runs collapse to one
/// space, leading and trailing dots and spaces are removed and the result is
/// truncated to [`MAX_TITLE_LENGTH`] characters and [`MAX_TITLE_BYTES`] bytes.
pub fn sanitize_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let sanitized = sanitize_filename(&collapsed);
    let trimmed = sanitized.trim_matches(|c: char| c == '.' || c == ' ');

    let mut truncated = String::new();
    for c in trimmed.chars().take(MAX_TITLE_LENGTH) {
        if truncated.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        truncated.push(c);
    }
    let truncated = truncated.trim_end_matches(|c: char| c == '.' || c == ' ');

    if truncated.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        truncated.to_string()
    }
}

/// Format an offset as `HH:MM:SS`
pub fn format_timestamp(offset: Duration) -> String {
    let total_seconds = offset.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
