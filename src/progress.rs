/// Prefix our `--progress-template` puts in front of every progress line.
pub const PROGRESS_PREFIX: &str = "ytgrab-progress:";

/// Status tag reported by the collaborator's progress hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    InProgress,
    Complete,
}

/// Progress exactly as the collaborator reported it. All strings are best-effort.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProgress {
    pub status: ProgressStatus,
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// A displayable progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// 0.0 to 100.0
    pub percent: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub terminal: bool,
}

/// Converts raw collaborator progress into a [`ProgressEvent`].
///
/// Never fails: an unparseable percentage becomes `0.0`.
pub fn project(raw: &RawProgress) -> ProgressEvent {
    match raw.status {
        ProgressStatus::Complete => ProgressEvent {
            percent: 100.0,
            speed: Some("Done".to_string()),
            eta: Some("0s".to_string()),
            terminal: true,
        },
        ProgressStatus::InProgress => ProgressEvent {
            percent: raw.percent.as_deref().map(parse_percent).unwrap_or(0.0),
            speed: raw.speed.as_deref().and_then(display_field),
            eta: raw.eta.as_deref().and_then(display_field),
            terminal: false,
        },
    }
}

fn parse_percent(text: &str) -> f32 {
    let cleaned = strip_ansi(text);
    let number = cleaned.trim().trim_end_matches('%').trim();
    match number.parse::<f32>() {
        Ok(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

fn display_field(text: &str) -> Option<String> {
    let cleaned = strip_ansi(text);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "NA" || trimmed.starts_with("Unknown") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Removes `ESC [ ... <letter>` colour sequences.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Recognises one line of collaborator output as a progress report.
///
/// Lines look like `ytgrab-progress:downloading|  42.0%|1.20MiB/s|00:13`.
pub fn parse_progress_line(line: &str) -> Option<RawProgress> {
    let rest = line.trim_start().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split('|');
    let status = match fields.next()?.trim() {
        "downloading" => ProgressStatus::InProgress,
        "finished" => ProgressStatus::Complete,
        _ => return None,
    };
    let mut next_field = || fields.next().map(|s| s.trim().to_string());
    Some(RawProgress {
        status,
        percent: next_field(),
        speed: next_field(),
        eta: next_field(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress(percent: &str) -> RawProgress {
        RawProgress {
            status: ProgressStatus::InProgress,
            percent: Some(percent.to_string()),
            speed: Some("1.5MiB/s".to_string()),
            eta: Some("00:10".to_string()),
        }
    }

    #[test]
    fn parses_padded_percentage() {
        let event = project(&in_progress("  42.5%"));
        assert_eq!(event.percent, 42.5);
        assert_eq!(event.speed.as_deref(), Some("1.5MiB/s"));
        assert_eq!(event.eta.as_deref(), Some("00:10"));
        assert!(!event.terminal);
    }

    #[test]
    fn malformed_percentage_defaults_to_zero() {
        assert_eq!(project(&in_progress("abc%")).percent, 0.0);
        assert_eq!(project(&in_progress("")).percent, 0.0);
        assert_eq!(project(&in_progress("NaN")).percent, 0.0);

        let missing = RawProgress { percent: None, ..in_progress("") };
        assert_eq!(project(&missing).percent, 0.0);
    }

    #[test]
    fn strips_colour_codes() {
        assert_eq!(project(&in_progress("\u{1b}[0;94m 12.3%\u{1b}[0m")).percent, 12.3);
    }

    #[test]
    fn complete_forces_terminal_values() {
        let raw = RawProgress {
            status: ProgressStatus::Complete,
            percent: Some("garbage".to_string()),
            speed: None,
            eta: None,
        };
        let event = project(&raw);
        assert_eq!(event.percent, 100.0);
        assert_eq!(event.speed.as_deref(), Some("Done"));
        assert_eq!(event.eta.as_deref(), Some("0s"));
        assert!(event.terminal);
    }

    #[test]
    fn unknown_speed_and_eta_are_absent() {
        let raw = RawProgress {
            speed: Some("NA".to_string()),
            eta: Some("Unknown".to_string()),
            ..in_progress("5%")
        };
        let event = project(&raw);
        assert_eq!(event.speed, None);
        assert_eq!(event.eta, None);
    }

    #[test]
    fn recognises_progress_lines() {
        let raw = parse_progress_line("ytgrab-progress:downloading|  7.1%|2.00MiB/s|00:42").unwrap();
        assert_eq!(raw.status, ProgressStatus::InProgress);
        assert_eq!(raw.percent.as_deref(), Some("7.1%"));
        assert_eq!(raw.speed.as_deref(), Some("2.00MiB/s"));
        assert_eq!(raw.eta.as_deref(), Some("00:42"));

        let done = parse_progress_line("ytgrab-progress:finished|100%|NA|NA").unwrap();
        assert_eq!(done.status, ProgressStatus::Complete);
    }

    #[test]
    fn ignores_other_output() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("ytgrab-progress:error|0%|NA|NA").is_none());
        assert!(parse_progress_line("").is_none());
    }
}
