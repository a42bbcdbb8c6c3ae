//! The egui window. Renders [`AppState`] and forwards clicks to the [`Controller`].

use eframe::{App, Frame, egui};
use egui::{Color32, RichText, TextureHandle, TextureOptions, Visuals};
use rfd::FileDialog;

use crate::bridge::DispatchQueue;
use crate::config::AppConfig;
use crate::controller::{Controller, URL_PLACEHOLDER};
use crate::format::{format_duration, format_number};
use crate::model::{DownloadMode, VideoQuality};
use crate::state::{ActionKind, AppState, ThumbnailSlot};

const ACCENT: Color32 = Color32::from_rgb(0x3a, 0x86, 0xff);

pub struct YtGrabApp {
    /// Everything background tasks report back
    state: AppState,
    /// Drained once at the start of every frame
    queue: DispatchQueue<AppState>,
    controller: Controller,
    /// Raw contents of the URL box, one URL per line
    url_input: String,
    mode: DownloadMode,
    /// Ignored for audio downloads
    quality: VideoQuality,
    /// Folder text field; applied to the controller when a download starts
    download_folder: String,
    /// GPU copy of the current thumbnail
    thumbnail: Option<TextureHandle>,
    dark_mode: bool,
}

impl YtGrabApp {
    pub fn new(
        ctx: &egui::Context,
        config: &AppConfig,
        controller: Controller,
        queue: DispatchQueue<AppState>,
    ) -> Self {
        ctx.set_visuals(visuals(config.dark_mode));
        Self {
            state: AppState::default(),
            queue,
            download_folder: controller.download_dir().display().to_string(),
            controller,
            url_input: String::new(),
            mode: config.default_mode,
            quality: config.default_quality,
            thumbnail: None,
            dark_mode: config.dark_mode,
        }
    }

    fn fetch(&mut self) {
        self.controller.fetch_info(&mut self.state, &self.url_input);
    }

    fn download(&mut self) {
        let folder = self.download_folder.trim();
        if !folder.is_empty() && folder != self.controller.download_dir().to_string_lossy() {
            self.controller.set_download_dir(folder.into());
        }
        let quality = (self.mode == DownloadMode::Video).then_some(self.quality);
        self.controller.download(&mut self.state, &self.url_input, self.mode, quality);
    }

    fn upload_thumbnail(&mut self, ctx: &egui::Context) {
        if let Some(image) = self.state.thumbnail.take_decoded() {
            self.thumbnail = Some(ctx.load_texture("thumbnail", image, TextureOptions::LINEAR));
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (ctrl_enter, ctrl_d) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Enter) && i.modifiers.command,
                i.key_pressed(egui::Key::D) && i.modifiers.command,
            )
        });
        if ctrl_enter && self.state.enablement.is_enabled(ActionKind::Fetch) {
            self.fetch();
        }
        if ctrl_d && self.state.enablement.is_enabled(ActionKind::Download) {
            self.download();
        }
    }

    fn input_panel(&mut self, ui: &mut egui::Ui) {
        ui.label("YouTube URLs (one per line):");
        ui.add(
            egui::TextEdit::multiline(&mut self.url_input)
                .hint_text(URL_PLACEHOLDER)
                .desired_rows(4)
                .desired_width(f32::INFINITY),
        );

        ui.horizontal(|ui| {
            ui.label("Download folder:");
            ui.text_edit_singleline(&mut self.download_folder);
            if ui.button("Browse…").clicked() {
                if let Some(folder) = FileDialog::new().set_directory(&self.download_folder).pick_folder() {
                    self.download_folder = folder.display().to_string();
                }
            }
        });

        ui.horizontal(|ui| {
            ui.radio_value(&mut self.mode, DownloadMode::Video, "Video (MP4)");
            ui.radio_value(&mut self.mode, DownloadMode::Audio, "Audio (MP3)");
            ui.add_enabled_ui(self.mode == DownloadMode::Video, |ui| {
                egui::ComboBox::from_id_source("quality")
                    .selected_text(self.quality.label())
                    .show_ui(ui, |ui| {
                        for q in VideoQuality::ALL {
                            ui.selectable_value(&mut self.quality, q, q.label());
                        }
                    });
            });
        });

        ui.horizontal(|ui| {
            let fetch_enabled = self.state.enablement.is_enabled(ActionKind::Fetch);
            if ui.add_enabled(fetch_enabled, egui::Button::new("🔍 Fetch Info")).clicked() {
                self.fetch();
            }
            let download_enabled = self.state.enablement.is_enabled(ActionKind::Download);
            let download = egui::Button::new(RichText::new("⬇ Start Download").strong()).fill(ACCENT);
            if ui.add_enabled(download_enabled, download).clicked() {
                self.download();
            }
        });
    }

    fn progress_panel(&self, ui: &mut egui::Ui) {
        let progress = &self.state.progress;
        ui.add(
            egui::ProgressBar::new(progress.percent / 100.0)
                .text(format!("{:.1}%", progress.percent)),
        );
        ui.horizontal(|ui| {
            ui.label(format!("Speed: {}", progress.speed));
            ui.separator();
            ui.label(format!("ETA: {}", progress.eta));
        });
    }

    fn info_panel(&self, ui: &mut egui::Ui) {
        match (&self.state.thumbnail.slot, &self.thumbnail) {
            (ThumbnailSlot::Displayed, Some(texture)) => {
                ui.image(texture);
            }
            (ThumbnailSlot::Loading, _) => {
                ui.spinner();
            }
            (ThumbnailSlot::Unavailable(reason), _) => {
                ui.weak(*reason);
            }
            _ => {}
        }

        let Some(info) = &self.state.info else {
            ui.weak("Fetch a URL to see its details.");
            return;
        };
        ui.label(RichText::new(info.display_title()).heading());
        ui.label(format!("📺 {}", info.display_channel()));
        ui.label(format!("⏱ {}", format_duration(info.duration_secs())));
        ui.horizontal(|ui| {
            ui.label(format!("👁 {}", format_number(info.view_count)));
            ui.label(format!("👍 {}", format_number(info.like_count)));
            ui.label(format!("💬 {}", format_number(info.comment_count)));
        });
    }

    fn status_log(&self, ui: &mut egui::Ui) {
        ui.label("Status:");
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.state.log {
                    ui.monospace(line);
                }
            });
    }

    fn modal(&mut self, ctx: &egui::Context) {
        let Some(message) = self.state.modal_error.clone() else {
            return;
        };
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.state.modal_error = None;
                }
            });
    }
}

fn visuals(dark: bool) -> Visuals {
    if dark { Visuals::dark() } else { Visuals::light() }
}

impl App for YtGrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Everything background threads produced since the last frame.
        self.queue.drain(&mut self.state);
        self.upload_thumbnail(ctx);
        if self.state.accepts_input() {
            self.handle_shortcuts(ctx);
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("YouTube Audio / Video Downloader");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.dark_mode { "☀ Light" } else { "🌙 Dark" };
                    if ui.button(label).clicked() {
                        self.dark_mode = !self.dark_mode;
                        ctx.set_visuals(visuals(self.dark_mode));
                    }
                });
            });
        });

        egui::SidePanel::right("info_panel")
            .min_width(360.0)
            .show(ctx, |ui| self.info_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let enabled = self.state.accepts_input();
            ui.add_enabled_ui(enabled, |ui| self.input_panel(ui));
            ui.separator();
            self.progress_panel(ui);
            ui.separator();
            self.status_log(ui);
        });

        self.modal(ctx);
    }
}
