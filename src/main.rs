//! YouTube audio/video downloader with a native egui window, driving yt-dlp.

// egui window and widgets
mod app;
// Hands background results to the UI thread
mod bridge;
mod config;
// Button presses to background operations
mod controller;
// yt-dlp collaborator
mod downloader;
mod errors;
mod format;
mod model;
// Progress line parsing and projection
mod progress;
mod runner;
mod state;
// Thumbnail fetching and decoding
mod thumbnail;

use std::sync::Arc;

use anyhow::Context as _;
use eframe::egui;
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::YtGrabApp;
use config::AppConfig;
use controller::Controller;
use downloader::{AudioSettings, YtDlp};
use runner::TaskRunner;
use state::AppState;
use thumbnail::{HttpThumbnails, ThumbnailLoader};

// Global Tokio runtime driving yt-dlp child processes
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytgrab=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().unwrap_or_else(|err| {
        warn!(error = %err, "falling back to default configuration");
        AppConfig::default()
    });
    info!(download_dir = %config.download_dir.display(), ytdlp = %config.ytdlp_program.display(), "starting");

    let runtime = RUNTIME
        .get_or_try_init(Runtime::new)
        .context("failed to start the async runtime")?;
    let thumbnails = Arc::new(HttpThumbnails::new(config.thumbnail_size).context("failed to build HTTP client")?);
    let collaborator = Arc::new(YtDlp::new(
        config.ytdlp_program.clone(),
        config.ytdlp_args.clone(),
        runtime.handle().clone(),
    ));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("YouTube Downloader")
            .with_inner_size([960.0, 680.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Downloader",
        options,
        Box::new(move |cc| {
            // Wake the window whenever a background thread posts something.
            let repaint = cc.egui_ctx.clone();
            let (dispatcher, queue) = bridge::channel::<AppState>();
            let runner = TaskRunner::new(dispatcher.with_waker(move || repaint.request_repaint()));
            let controller = Controller::new(
                collaborator,
                runner.clone(),
                ThumbnailLoader::new(runner, thumbnails),
                config.download_dir.clone(),
                AudioSettings {
                    codec: config.audio_codec.clone(),
                    quality: config.audio_quality.clone(),
                },
            );
            Box::new(YtGrabApp::new(&cc.egui_ctx, &config, controller, queue))
        }),
    )
    .map_err(|err| anyhow::anyhow!("window closed with an error: {err}"))
}
