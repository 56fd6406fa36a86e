//! Parameter and upload checks run before any pipeline starts.

use serde::Serialize;
use std::path::Path;

use crate::error::{Result, SpectrogramError};
use crate::spectrum::{Mode, Scale};

pub const SUPPORTED_FORMATS: [&str; 7] = [".mp3", ".wav", ".flac", ".ogg", ".m4a", ".aac", ".wma"];
pub const FFT_SIZES: [usize; 5] = [1024, 2048, 4096, 8192, 16384];
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// An FFT size from [`FFT_SIZES`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FftSize(usize);

impl FftSize {
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for FftSize {
    fn default() -> Self {
        Self(2048)
    }
}

impl TryFrom<usize> for FftSize {
    type Error = SpectrogramError;

    fn try_from(n: usize) -> Result<Self> {
        if FFT_SIZES.contains(&n) {
            Ok(Self(n))
        } else {
            Err(SpectrogramError::InvalidInput(format!(
                "FFT size must be one of 1024, 2048, 4096, 8192 or 16384, got {}",
                n
            )))
        }
    }
}

/// Validated rendering parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderRequest {
    pub colormap: String,
    pub scale: Scale,
    pub fft_size: FftSize,
    pub mode: Mode,
    pub use_accelerated: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            colormap: "magma".to_string(),
            scale: Scale::default(),
            fft_size: FftSize::default(),
            mode: Mode::default(),
            use_accelerated: true,
        }
    }
}

impl RenderRequest {
    /// Parse raw request values. Scale and mode are case-insensitive; the
    /// colour map is taken as given.
    pub fn parse(
        colormap: &str,
        scale: &str,
        fft_size: usize,
        mode: &str,
        use_accelerated: bool,
    ) -> Result<Self> {
        Ok(Self {
            colormap: colormap.trim().to_string(),
            scale: scale.parse()?,
            fft_size: FftSize::try_from(fft_size)?,
            mode: mode.parse()?,
            use_accelerated,
        })
    }
}

/// Reject files whose extension is not a supported audio format.
pub fn validate_audio_file(file_name: &str) -> Result<()> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()));
    match ext {
        Some(ext) if SUPPORTED_FORMATS.contains(&ext.as_str()) => Ok(()),
        _ => Err(SpectrogramError::InvalidInput(format!(
            "Unsupported format. Allowed: {}",
            SUPPORTED_FORMATS.join(", ")
        ))),
    }
}

pub fn validate_upload_size(bytes: u64, max_mb: u64) -> Result<()> {
    if bytes > max_mb * 1024 * 1024 {
        return Err(SpectrogramError::InvalidInput(format!(
            "File is too large. Maximum: {} MB",
            max_mb
        )));
    }
    Ok(())
}

/// Extension and size checks for an audio file on disk.
pub fn validate_upload(path: &Path, max_mb: u64) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    validate_audio_file(name)?;
    let meta = std::fs::metadata(path).map_err(|e| {
        SpectrogramError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
    })?;
    validate_upload_size(meta.len(), max_mb)
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub accelerated: bool,
    pub supported_formats: Vec<&'static str>,
    pub max_file_size_mb: u64,
}

pub fn service_status(accelerated: bool, max_file_size_mb: u64) -> ServiceStatus {
    ServiceStatus {
        status: "online",
        accelerated,
        supported_formats: SUPPORTED_FORMATS.to_vec(),
        max_file_size_mb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_mixed_case() {
        let req = RenderRequest::parse("custom", "LOG", 4096, "Sharper", false).unwrap();
        assert_eq!(req.scale, Scale::Log);
        assert_eq!(req.mode, Mode::Sharper);
        assert_eq!(req.fft_size.get(), 4096);
        assert_eq!(req.colormap, "custom");
    }

    #[test]
    fn parse_rejects_bad_values() {
        for (scale, fft, mode) in [("bark", 2048, "classic"), ("mel", 512, "classic"), ("mel", 2048, "soft")] {
            let err = RenderRequest::parse("magma", scale, fft, mode, true).unwrap_err();
            assert!(matches!(err, SpectrogramError::InvalidInput(_)));
        }
    }

    #[test]
    fn extensions_are_checked_case_insensitively() {
        assert!(validate_audio_file("song.MP3").is_ok());
        assert!(validate_audio_file("take.flac").is_ok());
        assert!(validate_audio_file("notes.txt").is_err());
        assert!(validate_audio_file("noext").is_err());
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate_upload_size(100 * 1024 * 1024, 100).is_ok());
        assert!(validate_upload_size(100 * 1024 * 1024 + 1, 100).is_err());
    }

    #[test]
    fn status_reports_formats() {
        let status = service_status(false, 100);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "online");
        assert_eq!(json["supported_formats"].as_array().unwrap().len(), 7);
    }
}
