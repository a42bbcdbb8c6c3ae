//! Turns button presses into background operations.
//!
//! Every entry point runs on the UI thread. It claims the matching
//! [`Enablement`](crate::state::Enablement) slot before starting work, and the
//! slot is released only by the completion callback delivered through the
//! bridge, whether the operation succeeded or not.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bridge::Dispatcher;
use crate::downloader::{AudioSettings, DownloadOptions, MediaCollaborator, ResolveOptions};
use crate::errors::{InputError, MediaError};
use crate::model::{DownloadMode, MediaInfo, OperationRequest, VideoQuality};
use crate::progress::project;
use crate::runner::TaskRunner;
use crate::state::{ActionKind, AppState};
use crate::thumbnail::ThumbnailLoader;

/// Pre-filled hint text; never treated as a URL.
pub const URL_PLACEHOLDER: &str = "Enter YouTube URLs here...";

/// Non-empty lines of the URL box, in order.
pub fn parse_urls(input: &str) -> Result<Vec<String>, InputError> {
    let urls: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != URL_PLACEHOLDER)
        .map(str::to_owned)
        .collect();
    if urls.is_empty() {
        return Err(InputError::NoUrl);
    }
    Ok(urls)
}

#[derive(Debug, Default)]
struct BatchSummary {
    succeeded: usize,
    failed: usize,
}

#[derive(Clone)]
pub struct Controller {
    /// Resolves and downloads media; shared with every background task
    collaborator: Arc<dyn MediaCollaborator>,
    /// Starts fetch and download threads
    runner: TaskRunner<AppState>,
    /// Refreshes the thumbnail whenever the info card changes
    thumbnails: ThumbnailLoader,
    /// Where downloads are written; created on demand
    download_dir: PathBuf,
    /// Codec and bitrate for audio-only downloads
    audio: AudioSettings,
}

impl Controller {
    pub fn new(
        collaborator: Arc<dyn MediaCollaborator>,
        runner: TaskRunner<AppState>,
        thumbnails: ThumbnailLoader,
        download_dir: PathBuf,
        audio: AudioSettings,
    ) -> Self {
        Self { collaborator, runner, thumbnails, download_dir, audio }
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    pub fn set_download_dir(&mut self, dir: PathBuf) {
        info!(dir = %dir.display(), "download directory changed");
        self.download_dir = dir;
    }

    /// Fetches metadata for the first URL in `input`.
    pub fn fetch_info(&self, state: &mut AppState, input: &str) {
        let url = match parse_urls(input) {
            Ok(urls) => urls[0].clone(),
            Err(err) => {
                state.modal_error = Some(err.to_string());
                return;
            }
        };
        if !state.enablement.try_begin(ActionKind::Fetch) {
            debug!("fetch already in flight, ignoring");
            return;
        }
        state.log_status("🔍 Fetching info...");

        let collaborator = Arc::clone(&self.collaborator);
        let thumbnails = self.thumbnails.clone();
        let spawned = self.runner.run(
            "fetch",
            move |_| collaborator.resolve(&url, &ResolveOptions::default()),
            move |state: &mut AppState, outcome| {
                match outcome {
                    Ok(info) => {
                        show_info(state, &thumbnails, info);
                        state.log_success("Info fetched");
                    }
                    Err(err) => state.log_failure(err),
                }
                state.enablement.finish(ActionKind::Fetch);
            },
        );
        if let Err(err) = spawned {
            state.log_failure(format!("could not start fetch: {err}"));
            state.enablement.finish(ActionKind::Fetch);
        }
    }

    /// Downloads every URL in `input`, one after another, on one background thread.
    pub fn download(&self, state: &mut AppState, input: &str, mode: DownloadMode, quality: Option<VideoQuality>) {
        let requests: Vec<OperationRequest> = match parse_urls(input) {
            Ok(urls) => urls
                .into_iter()
                .map(|url| OperationRequest::new(url, mode, quality))
                .collect(),
            Err(err) => {
                state.modal_error = Some(err.to_string());
                return;
            }
        };
        if !state.enablement.try_begin(ActionKind::Download) {
            debug!("download already in flight, ignoring");
            return;
        }
        state.log_status("⬇️ Starting download...");

        let collaborator = Arc::clone(&self.collaborator);
        let thumbnails = self.thumbnails.clone();
        let download_dir = self.download_dir.clone();
        let audio = self.audio.clone();
        let batch = requests.len();
        let spawned = self.runner.run(
            "download",
            move |ui: &Dispatcher<AppState>| -> Result<BatchSummary, MediaError> {
                let mut summary = BatchSummary::default();
                for request in requests {
                    let options = DownloadOptions::for_request(&request, &download_dir, &audio);
                    match download_one(collaborator.as_ref(), ui, &request, &options) {
                        Ok(Some(info)) => {
                            summary.succeeded += 1;
                            let thumbnails = thumbnails.clone();
                            ui.post(move |state| {
                                state.log_success(format!("Downloaded: {}", info.display_title()));
                                show_info(state, &thumbnails, info);
                            });
                        }
                        // Nothing to show, so the current info card stays.
                        Ok(None) => {
                            summary.succeeded += 1;
                            let url = request.url.clone();
                            ui.post(move |state| state.log_success(format!("Downloaded: {url}")));
                        }
                        Err(err) => {
                            summary.failed += 1;
                            warn!(url = %request.url, error = %err, "download failed");
                            ui.post(move |state| state.log_failure(err));
                        }
                    }
                }
                Ok(summary)
            },
            move |state: &mut AppState, outcome| {
                match outcome {
                    Ok(summary) => {
                        info!(succeeded = summary.succeeded, failed = summary.failed, "downloads finished");
                        if batch > 1 {
                            state.log_status("All downloads finished.");
                        }
                    }
                    Err(err) => state.log_failure(err),
                }
                state.enablement.finish(ActionKind::Download);
            },
        );
        if let Err(err) = spawned {
            state.log_failure(format!("could not start download: {err}"));
            state.enablement.finish(ActionKind::Download);
        }
    }
}

/// One URL of a batch. Runs on the background thread.
fn download_one(
    collaborator: &dyn MediaCollaborator,
    ui: &Dispatcher<AppState>,
    request: &OperationRequest,
    options: &DownloadOptions,
) -> Result<Option<MediaInfo>, MediaError> {
    let url = request.url.clone();
    ui.post(move |state| {
        state.progress.reset();
        state.log_status(format!("Processing: {url}"));
    });
    collaborator.download(&request.url, options, &mut |raw| {
        let event = project(&raw);
        ui.post(move |state| state.progress.apply(&event));
    })
}

fn show_info(state: &mut AppState, thumbnails: &ThumbnailLoader, info: MediaInfo) {
    thumbnails.load(state, info.thumbnail.as_deref());
    state.info = Some(info);
}
