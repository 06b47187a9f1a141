//! Item photo storage.
//!
//! Uploaded images are normalized before they are written: converted to
//! RGB, shrunk to fit a square bounding box (aspect ratio kept, never
//! enlarged), and re-encoded as JPEG at a fixed quality. The store only ever
//! sees the returned reference string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::config::PhotosConfig;

/// Persists photo bytes and returns a reference the frontend can resolve.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>) -> Result<String>;
}

/// Writes normalized JPEGs as `<uuid>.jpg` into a directory.
pub struct JpegPhotoStore {
    dir: PathBuf,
    url_prefix: String,
    max_dimension: u32,
    quality: u8,
}

impl JpegPhotoStore {
    pub fn new(config: &PhotosConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
            max_dimension: config.max_dimension,
            quality: config.jpeg_quality,
        }
    }
}

#[async_trait]
impl PhotoStore for JpegPhotoStore {
    async fn store(&self, bytes: Vec<u8>) -> Result<String> {
        let max_dimension = self.max_dimension;
        let quality = self.quality;
        let jpeg = tokio::task::spawn_blocking(move || normalize(&bytes, max_dimension, quality))
            .await
            .context("photo worker panicked")??;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let filename = format!("{}.jpg", Uuid::new_v4());
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, &jpeg)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = jpeg.len(), "stored photo");

        Ok(format!("{}/{}", self.url_prefix, filename))
    }
}

/// Decodes `bytes`, fits it within `max_dimension` on both sides, and
/// returns it as an RGB JPEG.
pub fn normalize(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("failed to decode image")?;

    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.thumbnail(max_dimension, max_dimension)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode_image(&rgb)
            .context("failed to encode JPEG")?;
    }
    Ok(out)
}
