use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub photos: PhotosConfig,
    #[serde(default)]
    pub qr: QrConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8099".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhotosConfig {
    #[serde(default = "default_photos_dir")]
    pub dir: PathBuf,
    /// Public path prefix under which stored photos are served.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Largest accepted upload body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for PhotosConfig {
    fn default() -> Self {
        Self {
            dir: default_photos_dir(),
            url_prefix: default_url_prefix(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_photos_dir() -> PathBuf {
    PathBuf::from("./data/photos")
}
fn default_url_prefix() -> String {
    "/api/photos".to_string()
}
fn default_max_dimension() -> u32 {
    800
}
fn default_jpeg_quality() -> u8 {
    85
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct QrConfig {
    /// Link encoded in a box's code image; `{slug}` is replaced by the box slug.
    #[serde(default = "default_link_template")]
    pub link_template: String,
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default = "default_border")]
    pub border: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            link_template: default_link_template(),
            scale: default_scale(),
            border: default_border(),
        }
    }
}

fn default_link_template() -> String {
    "/hassio/ingress/whereisit/#/box/{slug}".to_string()
}
fn default_scale() -> u32 {
    8
}
fn default_border() -> u32 {
    4
}

impl QrConfig {
    pub fn link_for(&self, slug: &str) -> String {
        self.link_template.replace("{slug}", slug)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FrontendConfig {
    /// Directory holding the built single-page app (`index.html` + assets).
    pub dist: Option<PathBuf>,
}

impl Config {
    /// Config with every section defaulted and the database at `db_path`.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig::default(),
            photos: PhotosConfig::default(),
            qr: QrConfig::default(),
            frontend: FrontendConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.photos.max_dimension == 0 {
            anyhow::bail!("photos.max_dimension must be > 0");
        }
        if !(1..=100).contains(&self.photos.jpeg_quality) {
            anyhow::bail!("photos.jpeg_quality must be in [1, 100]");
        }
        if !self.photos.url_prefix.starts_with('/') {
            anyhow::bail!("photos.url_prefix must start with '/'");
        }
        if !self.qr.link_template.contains("{slug}") {
            anyhow::bail!("qr.link_template must contain {{slug}}");
        }
        if self.qr.scale == 0 {
            anyhow::bail!("qr.scale must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
