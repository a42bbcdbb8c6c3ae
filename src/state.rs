//! Everything the window shows. Only mutated on the UI thread.

use eframe::egui::ColorImage;

use crate::model::MediaInfo;
use crate::progress::ProgressEvent;

/// The two user actions that run in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Fetch,
    Download,
}

/// Which action buttons currently accept clicks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enablement {
    fetch_in_flight: bool,
    download_in_flight: bool,
}

impl Enablement {
    fn slot(&mut self, kind: ActionKind) -> &mut bool {
        match kind {
            ActionKind::Fetch => &mut self.fetch_in_flight,
            ActionKind::Download => &mut self.download_in_flight,
        }
    }

    /// Claims the action. Returns `false` if one is already in flight.
    pub fn try_begin(&mut self, kind: ActionKind) -> bool {
        let slot = self.slot(kind);
        if *slot {
            return false;
        }
        *slot = true;
        true
    }

    pub fn finish(&mut self, kind: ActionKind) {
        *self.slot(kind) = false;
    }

    pub fn is_enabled(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Fetch => !self.fetch_in_flight,
            ActionKind::Download => !self.download_in_flight,
        }
    }
}

/// Progress bar contents for the current download.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub percent: f32,
    pub speed: String,
    pub eta: String,
}

impl Default for ProgressView {
    fn default() -> Self {
        Self {
            percent: 0.0,
            speed: "--".to_string(),
            eta: "--".to_string(),
        }
    }
}

impl ProgressView {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The percentage never moves backwards within one operation.
    pub fn apply(&mut self, event: &ProgressEvent) {
        if event.terminal {
            self.percent = 100.0;
        } else if event.percent > self.percent {
            self.percent = event.percent;
        }
        self.speed = event.speed.clone().unwrap_or_else(|| "--".to_string());
        self.eta = event.eta.clone().unwrap_or_else(|| "--".to_string());
    }
}

#[derive(Default)]
pub enum ThumbnailSlot {
    #[default]
    Empty,
    Loading,
    /// Decoded but not yet uploaded as a texture
    Decoded(ColorImage),
    Displayed,
    Unavailable(&'static str),
}

/// Thumbnail area. The generation guards against a slow fetch for an older
/// video landing after a newer one.
#[derive(Default)]
pub struct ThumbnailView {
    generation: u64,
    pub slot: ThumbnailSlot,
}

impl ThumbnailView {
    /// Starts a new thumbnail and returns its generation.
    pub fn begin(&mut self, slot: ThumbnailSlot) -> u64 {
        self.generation += 1;
        self.slot = slot;
        self.generation
    }

    /// Stores a result unless a newer thumbnail was started since.
    pub fn resolve(&mut self, generation: u64, slot: ThumbnailSlot) -> bool {
        if generation != self.generation {
            return false;
        }
        self.slot = slot;
        true
    }

    /// Hands a freshly decoded image to the renderer exactly once.
    pub fn take_decoded(&mut self) -> Option<ColorImage> {
        match std::mem::replace(&mut self.slot, ThumbnailSlot::Displayed) {
            ThumbnailSlot::Decoded(image) => Some(image),
            other => {
                self.slot = other;
                None
            }
        }
    }
}

#[derive(Default)]
pub struct AppState {
    /// Last successfully fetched or downloaded media; failures keep it
    pub info: Option<MediaInfo>,
    pub thumbnail: ThumbnailView,
    pub progress: ProgressView,
    pub log: Vec<String>,
    pub enablement: Enablement,
    /// Shown as a blocking dialog until dismissed
    pub modal_error: Option<String>,
}

impl AppState {
    /// Buttons, text fields and shortcuts stay inert while the error dialog is open.
    pub fn accepts_input(&self) -> bool {
        self.modal_error.is_none()
    }

    pub fn log_status(&mut self, msg: impl Into<String>) {
        self.log.push(msg.into());
    }

    pub fn log_success(&mut self, msg: impl std::fmt::Display) {
        self.log.push(format!("✅ {msg}"));
    }

    pub fn log_failure(&mut self, msg: impl std::fmt::Display) {
        self.log.push(format!("❌ {msg}"));
    }
}
