use serde::Deserialize;

/// What the user wants out of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    /// Best video and audio merged into an MP4
    #[default]
    Video,
    /// Best audio extracted to the configured codec
    Audio,
}

/// Upper bound on the video height picked by yt-dlp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum VideoQuality {
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4K")]
    Uhd4K,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 3] = [VideoQuality::P720, VideoQuality::P1080, VideoQuality::Uhd4K];

    pub fn label(self) -> &'static str {
        match self {
            VideoQuality::P720 => "720p",
            VideoQuality::P1080 => "1080p",
            VideoQuality::Uhd4K => "4K",
        }
    }

    pub fn max_height(self) -> u32 {
        match self {
            VideoQuality::P720 => 720,
            VideoQuality::P1080 => 1080,
            VideoQuality::Uhd4K => 2160,
        }
    }
}

/// A single fetch or download, fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub url: String,
    pub mode: DownloadMode,
    /// Only meaningful for [`DownloadMode::Video`]
    pub quality: Option<VideoQuality>,
}

impl OperationRequest {
    pub fn new(url: impl Into<String>, mode: DownloadMode, quality: Option<VideoQuality>) -> Self {
        let quality = match mode {
            DownloadMode::Video => quality,
            DownloadMode::Audio => None,
        };
        Self { url: url.into(), mode, quality }
    }
}

/// The subset of yt-dlp's info document the window shows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    /// Seconds; yt-dlp reports fractional durations for some extractors
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub thumbnail: Option<String>,
}

impl MediaInfo {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }

    pub fn display_channel(&self) -> &str {
        self.uploader
            .as_deref()
            .or(self.channel.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_info_document() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "uploader": "Rick Astley",
            "duration": 212.0,
            "view_count": 1500000000,
            "like_count": null,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "formats": []
        }"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.display_title(), "Never Gonna Give You Up");
        assert_eq!(info.display_channel(), "Rick Astley");
        assert_eq!(info.duration_secs(), Some(212));
        assert_eq!(info.view_count, Some(1_500_000_000));
        assert_eq!(info.like_count, None);
        assert_eq!(info.comment_count, None);
    }

    #[test]
    fn channel_falls_back_when_uploader_missing() {
        let info = MediaInfo { channel: Some("Chan".into()), ..MediaInfo::default() };
        assert_eq!(info.display_channel(), "Chan");
        assert_eq!(MediaInfo::default().display_channel(), "Unknown");
    }

    #[test]
    fn audio_requests_drop_quality() {
        let req = OperationRequest::new("u", DownloadMode::Audio, Some(VideoQuality::P1080));
        assert_eq!(req.quality, None);
        let req = OperationRequest::new("u", DownloadMode::Video, Some(VideoQuality::P1080));
        assert_eq!(req.quality, Some(VideoQuality::P1080));
    }
}
