use std::sync::Arc;
use std::time::Duration;

use eframe::egui::ColorImage;
use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::errors::ThumbnailError;
use crate::runner::TaskRunner;
use crate::state::{AppState, ThumbnailSlot};

/// Turns a thumbnail URL into pixels ready for an egui texture.
pub trait ThumbnailSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<ColorImage, ThumbnailError>;
}

/// Downloads thumbnails over HTTP and scales them to a fixed size.
pub struct HttpThumbnails {
    client: reqwest::blocking::Client,
    size: [u32; 2],
}

impl HttpThumbnails {
    pub fn new(size: [u32; 2]) -> Result<Self, ThumbnailError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, size })
    }
}

impl ThumbnailSource for HttpThumbnails {
    fn fetch(&self, url: &str) -> Result<ColorImage, ThumbnailError> {
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        decode(&bytes, self.size)
    }
}

/// Decodes any format `image` understands and resizes to `size`.
pub fn decode(bytes: &[u8], size: [u32; 2]) -> Result<ColorImage, ThumbnailError> {
    let img = image::load_from_memory(bytes)?
        .resize_exact(size[0], size[1], FilterType::Lanczos3)
        .to_rgba8();
    let dims = [img.width() as usize, img.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(dims, &img))
}

/// Fetches thumbnails in the background without affecting the operation
/// that asked for them.
#[derive(Clone)]
pub struct ThumbnailLoader {
    runner: TaskRunner<AppState>,
    source: Arc<dyn ThumbnailSource>,
}

impl ThumbnailLoader {
    pub fn new(runner: TaskRunner<AppState>, source: Arc<dyn ThumbnailSource>) -> Self {
        Self { runner, source }
    }

    /// Must be called on the UI thread.
    pub fn load(&self, state: &mut AppState, url: Option<&str>) {
        let Some(url) = url.filter(|u| !u.trim().is_empty()).map(str::to_owned) else {
            state.thumbnail.begin(ThumbnailSlot::Unavailable("No thumbnail"));
            return;
        };
        let generation = state.thumbnail.begin(ThumbnailSlot::Loading);
        let source = Arc::clone(&self.source);
        let spawned = self.runner.run(
            "thumbnail",
            move |_| source.fetch(&url),
            move |state: &mut AppState, result| {
                let slot = match result {
                    Ok(image) => ThumbnailSlot::Decoded(image),
                    Err(err) => {
                        debug!(error = %err, "thumbnail unavailable");
                        ThumbnailSlot::Unavailable("Thumbnail error")
                    }
                };
                state.thumbnail.resolve(generation, slot);
            },
        );
        if let Err(err) = spawned {
            warn!(error = %err, "could not start thumbnail fetch");
            state.thumbnail.resolve(generation, ThumbnailSlot::Unavailable("Thumbnail error"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn decodes_and_resizes() {
        let image = decode(&png(4, 4), [8, 6]).unwrap();
        assert_eq!(image.size, [8, 6]);
        assert_eq!(image.pixels.len(), 48);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode(b"not an image", [8, 6]), Err(ThumbnailError::Decode(_))));
    }
}
