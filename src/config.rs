use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::model::{DownloadMode, VideoQuality};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "YTGRAB_CONFIG";
pub const DOWNLOAD_DIR_ENV: &str = "YTGRAB_DOWNLOAD_DIR";
pub const YTDLP_ENV: &str = "YTGRAB_YTDLP";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Receives one file per completed download; created on demand
    pub download_dir: PathBuf,
    pub ytdlp_program: PathBuf,
    /// Inserted before our own arguments, e.g. `["-m", "yt_dlp"]` with `python3`
    pub ytdlp_args: Vec<String>,
    pub default_mode: DownloadMode,
    pub default_quality: VideoQuality,
    pub audio_codec: String,
    /// Passed to `--audio-quality`; bare numbers are kbit/s
    pub audio_quality: Option<String>,
    pub thumbnail_size: [u32; 2],
    pub dark_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            ytdlp_program: PathBuf::from(if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" }),
            ytdlp_args: Vec::new(),
            default_mode: DownloadMode::Video,
            default_quality: VideoQuality::P720,
            audio_codec: "mp3".to_string(),
            audio_quality: Some("192".to_string()),
            thumbnail_size: [340, 191],
            dark_mode: true,
        }
    }
}

impl AppConfig {
    /// `$YTGRAB_CONFIG`, else `<config dir>/ytgrab/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("ytgrab").join("config.json"))
    }

    /// Loads the config file if there is one, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(DOWNLOAD_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(program) = lookup(YTDLP_ENV).filter(|v| !v.trim().is_empty()) {
            self.ytdlp_program = PathBuf::from(program);
        }
    }
}
