use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::StorageConfig;
use crate::error::{Result, SpectrogramError};
use crate::validate::RenderRequest;

pub const IMAGE_EXT: &str = "jpg";

/// Upload and output directories, namespaced by task id.
#[derive(Clone, Debug)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    public_prefix: String,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, public_prefix: &str) -> Result<Self> {
        let upload_dir = upload_dir.into();
        let output_dir = output_dir.into();
        for dir in [&upload_dir, &output_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                SpectrogramError::Storage(format!("Cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok(Self {
            upload_dir,
            output_dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(config.upload_dir.clone(), config.output_dir.clone(), &config.public_prefix)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Copy an input file into the upload directory as `{id}{ext}`.
    pub fn stage_upload(&self, id: &str, source: &Path) -> Result<PathBuf> {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let dest = self.upload_dir.join(format!("{}{}", id, ext));
        fs::copy(source, &dest).map_err(|e| {
            SpectrogramError::Storage(format!("Cannot stage {}: {}", source.display(), e))
        })?;
        Ok(dest)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Write an artifact next to its final name and move it into place, so
    /// the public path never shows a partial file.
    pub fn write_output(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dest = self.output_path(file_name);
        let partial = self.output_dir.join(format!("{}.part", file_name));
        let write = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, &dest));
        if let Err(e) = write {
            let _ = fs::remove_file(&partial);
            return Err(SpectrogramError::Storage(format!(
                "Cannot write {}: {}",
                dest.display(),
                e
            )));
        }
        Ok(dest)
    }

    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix, file_name)
    }

    /// Delete regular files older than `max_age` from both directories.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for dir in [&self.output_dir, &self.upload_dir] {
            let entries = fs::read_dir(dir).map_err(|e| {
                SpectrogramError::Storage(format!("Cannot list {}: {}", dir.display(), e))
            })?;
            for entry in entries.flatten() {
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let age = meta
                    .modified()
                    .ok()
                    .and_then(|m| now.duration_since(m).ok())
                    .unwrap_or_default();
                if age > max_age {
                    match fs::remove_file(entry.path()) {
                        Ok(()) => removed += 1,
                        Err(e) => log::warn!("Failed to remove {}: {}", entry.path().display(), e),
                    }
                }
            }
        }
        log::info!("Cleanup removed {} files older than {:?}", removed, max_age);
        Ok(removed)
    }
}

/// Stem of an uploaded file name, or `audio` when it has none.
pub fn safe_stem(original_name: &str) -> String {
    Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("audio")
        .to_string()
}

pub fn final_name(id: &str, original_name: &str) -> String {
    format!("{}_{}_2d.{}", id, safe_stem(original_name), IMAGE_EXT)
}

pub fn preview_name(id: &str, request: &RenderRequest) -> String {
    format!("{}_{}_preview.{}", id, preview_hash(request), IMAGE_EXT)
}

pub fn download_name(id: &str) -> String {
    format!("{}_4k.{}", id, IMAGE_EXT)
}

/// First 8 hex digits of the SHA-256 of `colormap_scale_fftsize_mode`.
pub fn preview_hash(request: &RenderRequest) -> String {
    let params = format!(
        "{}_{}_{}_{}",
        request.colormap,
        request.scale,
        request.fft_size.get(),
        request.mode
    );
    let digest = Sha256::digest(params.as_bytes());
    hex::encode(digest)[..8].to_string()
}
