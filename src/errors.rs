use std::path::PathBuf;

use thiserror::Error;

/// Failures of the external media collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("could not launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The message yt-dlp printed after `ERROR:`.
    #[error("{0}")]
    Extraction(String),
    #[error("yt-dlp exited with {}", exit_code_text(.0))]
    ExitStatus(Option<i32>),
    #[error("yt-dlp returned no info document")]
    MissingInfo,
    #[error("malformed info document: {0}")]
    MalformedInfo(#[from] serde_json::Error),
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to yt-dlp: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("thumbnail request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("thumbnail could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Rejected before any background work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please enter at least one YouTube URL.")]
    NoUrl,
}

/// Outcome of a background task that did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("background task panicked: {0}")]
    Panicked(String),
}
