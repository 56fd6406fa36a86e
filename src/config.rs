use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::validate::DEFAULT_MAX_UPLOAD_MB;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_colormap")]
    pub colormap: String,
    #[serde(default = "default_scale")]
    pub scale: String,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_use_accelerated")]
    pub use_accelerated: bool,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub font_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            public_prefix: default_public_prefix(),
            retention_hours: default_retention_hours(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: default_colormap(),
            scale: default_scale(),
            fft_size: default_fft_size(),
            mode: default_mode(),
            use_accelerated: default_use_accelerated(),
            font: None,
            font_url: None,
        }
    }
}

fn default_upload_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_output_dir() -> PathBuf { PathBuf::from("outputs") }
fn default_public_prefix() -> String { "/outputs".into() }
fn default_retention_hours() -> u64 { 24 }
fn default_max_upload_mb() -> u64 { DEFAULT_MAX_UPLOAD_MB }
fn default_colormap() -> String { "magma".into() }
fn default_scale() -> String { "linear".into() }
fn default_fft_size() -> usize { 2048 }
fn default_mode() -> String { "classic".into() }
fn default_use_accelerated() -> bool { true }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Explicit path, else `./specgram.toml`, else the user config directories.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("specgram.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("specgram").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("specgram").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.storage.retention_hours, 24);
        assert_eq!(config.storage.max_upload_mb, 100);
        assert_eq!(config.storage.public_prefix, "/outputs");
        assert_eq!(config.render.colormap, "magma");
        assert_eq!(config.render.fft_size, 2048);
        assert!(config.render.use_accelerated);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [render]
            mode = "sharp"
            font_url = "https://example.com/font.ttf"

            [storage]
            output_dir = "/tmp/specs"
            "#,
        )
        .unwrap();
        assert_eq!(config.render.mode, "sharp");
        assert_eq!(config.render.scale, "linear");
        assert_eq!(config.render.font_url.as_deref(), Some("https://example.com/font.ttf"));
        assert_eq!(config.storage.output_dir, PathBuf::from("/tmp/specs"));
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/somewhere/custom.toml");
        assert_eq!(find_config(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn unreadable_config_is_none() {
        assert!(load_config(Path::new("/nonexistent/specgram.toml")).is_none());
    }
}
