//! Display formatting for the numeric fields of a media info document.

/// Shown when a video carries no usable duration.
pub const UNKNOWN_DURATION: &str = "Unknown";

/// Formats whole seconds as `h:mm:ss`, or `m:ss` when under an hour.
pub fn format_duration(seconds: Option<u64>) -> String {
    let seconds = match seconds {
        Some(s) if s > 0 => s,
        _ => return UNKNOWN_DURATION.to_string(),
    };
    let (minutes, secs) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Formats a view/like/comment count with a `K` or `M` suffix.
pub fn format_number(count: Option<u64>) -> String {
    match count {
        None | Some(0) => "0".to_string(),
        Some(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}
