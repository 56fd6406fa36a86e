use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;

use crate::audio::{decode_audio, Waveform};
use crate::encode::encode_jpeg;
use crate::error::{Result, SpectrogramError};
use crate::render::{enhance, FigureSpec, Palette, RenderProfile, Renderer};
use crate::spectrum::{display_bounds, DisplayBounds, DynamicRange, Scale, SpectrogramMatrix, TransformEngine};
use crate::validate::RenderRequest;

/// Numeric summary returned with every rendered image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpectrogramInfo {
    /// Seconds, rounded to two decimals
    pub duration: f64,
    pub sample_rate: u32,
    pub frequency_bins: usize,
    pub time_frames: usize,
}

#[derive(Clone, Debug)]
pub struct RenderedImage {
    /// Encoded JPEG
    pub bytes: Vec<u8>,
    pub info: SpectrogramInfo,
}

/// A compressed spectrogram ready to be drawn.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub matrix: SpectrogramMatrix,
    pub bounds: DisplayBounds,
    pub range: DynamicRange,
    pub hop_length: usize,
    pub sample_rate: u32,
    pub duration: f64,
}

impl Analysis {
    pub fn info(&self) -> SpectrogramInfo {
        SpectrogramInfo {
            duration: (self.duration * 100.0).round() / 100.0,
            sample_rate: self.sample_rate,
            frequency_bins: self.matrix.frequency_bins(),
            time_frames: self.matrix.time_frames(),
        }
    }
}

/// Waveform to finished image: transform, compress, lay out, draw, enhance
/// and encode.
pub struct Pipeline {
    engine: TransformEngine,
    renderer: Renderer,
}

impl Pipeline {
    pub fn new(engine: TransformEngine, renderer: Renderer) -> Self {
        Self { engine, renderer }
    }

    pub fn is_accelerated(&self) -> bool {
        self.engine.is_accelerated()
    }

    /// Everything up to drawing. The result does not depend on the profile,
    /// so final and preview renders of one request agree on it.
    pub fn analyze(&self, waveform: &Waveform, request: &RenderRequest) -> Result<Analysis> {
        if waveform.sample_rate == 0 {
            return Err(SpectrogramError::Transform("sample rate is zero".into()));
        }
        let config = request.mode.config();
        let n_fft = request.fft_size.get();
        let hop_length = config.hop_length(n_fft);
        let sr = waveform.sample_rate;

        let samples = match config.apply_preemphasis(&waveform.samples) {
            Some(filtered) => Cow::Owned(filtered),
            None => Cow::Borrowed(waveform.samples.as_slice()),
        };

        let bounds = display_bounds(sr, request.scale);
        let mut matrix = match request.scale {
            Scale::Mel => self.engine.compute_mel_spectrogram(
                &samples,
                sr,
                n_fft,
                hop_length,
                bounds.min,
                bounds.data_fmax,
                request.use_accelerated,
            )?,
            Scale::Linear | Scale::Log => {
                self.engine
                    .compute_spectrogram(&samples, n_fft, hop_length, request.use_accelerated)?
            }
        };

        let range = config.compress(&mut matrix);
        let bounds = bounds.auto_trim(&matrix, sr, request.scale);

        log::debug!(
            "Analysed {} bins x {} frames, range {:.1}..{:.1} dB, axis {:.0}..{:.0} Hz",
            matrix.frequency_bins(),
            matrix.time_frames(),
            range.vmin,
            range.vmax,
            bounds.min,
            bounds.max
        );

        Ok(Analysis {
            matrix,
            bounds,
            range,
            hop_length,
            sample_rate: sr,
            duration: waveform.duration(),
        })
    }

    /// Draw and enhance an analysed spectrogram without encoding it.
    pub fn draw(
        &self,
        analysis: &Analysis,
        request: &RenderRequest,
        profile: &RenderProfile,
    ) -> Result<image::DynamicImage> {
        let palette = Palette::from_name(&request.colormap);
        let spec = FigureSpec {
            matrix: &analysis.matrix,
            sample_rate: analysis.sample_rate,
            hop_length: analysis.hop_length,
            scale: request.scale,
            bounds: analysis.bounds,
            range: analysis.range,
            palette: &palette,
        };
        let raster = self.renderer.render(&spec, profile)?;
        Ok(enhance(image::DynamicImage::ImageRgb8(raster), request.mode))
    }

    pub fn generate(
        &self,
        waveform: &Waveform,
        request: &RenderRequest,
        profile: &RenderProfile,
    ) -> Result<RenderedImage> {
        let analysis = self.analyze(waveform, request)?;
        let image = self.draw(&analysis, request, profile)?;
        let bytes = encode_jpeg(&image)?;
        log::info!(
            "Rendered {} spectrogram {}x{} ({} bytes)",
            profile.name,
            image.width(),
            image.height(),
            bytes.len()
        );
        Ok(RenderedImage {
            bytes,
            info: analysis.info(),
        })
    }

    pub fn generate_final(&self, waveform: &Waveform, request: &RenderRequest) -> Result<RenderedImage> {
        self.generate(waveform, request, &RenderProfile::final_render())
    }

    pub fn generate_preview(&self, waveform: &Waveform, request: &RenderRequest) -> Result<RenderedImage> {
        self.generate(waveform, request, &RenderProfile::preview())
    }

    /// Decode `path` and render it with `profile`.
    pub fn generate_from_path(
        &self,
        path: &Path,
        request: &RenderRequest,
        profile: &RenderProfile,
    ) -> Result<RenderedImage> {
        let waveform = load_waveform(path)?;
        self.generate(&waveform, request, profile)
    }
}

pub fn load_waveform(path: &Path) -> Result<Waveform> {
    decode_audio(path).map_err(|e| SpectrogramError::Decode(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{Mode, DB_FLOOR};
    use crate::validate::FftSize;

    fn pipeline() -> Pipeline {
        Pipeline::new(TransformEngine::scalar(), Renderer::without_text())
    }

    fn request(scale: Scale, mode: Mode) -> RenderRequest {
        RenderRequest {
            scale,
            mode,
            fft_size: FftSize::try_from(1024).unwrap(),
            ..RenderRequest::default()
        }
    }

    fn chirp(sr: u32, seconds: f32) -> Waveform {
        let n = (sr as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sr as f32;
                (2.0 * std::f32::consts::PI * (200.0 + 1500.0 * t) * t).sin() * 0.5
            })
            .collect();
        Waveform::new(samples, sr)
    }

    #[test]
    fn compressed_matrix_stays_within_range() {
        let wave = chirp(16000, 1.0);
        for mode in Mode::ALL {
            for scale in [Scale::Linear, Scale::Log, Scale::Mel] {
                let a = pipeline().analyze(&wave, &request(scale, mode)).unwrap();
                assert!(a.matrix.min() >= DB_FLOOR);
                assert!(a.matrix.min() <= a.range.vmax);
                assert!(a.bounds.min < a.bounds.max);
                assert!(a.bounds.data_fmax <= a.bounds.max);
            }
        }
    }

    #[test]
    fn hop_follows_mode() {
        let wave = chirp(8000, 0.5);
        let a = pipeline().analyze(&wave, &request(Scale::Linear, Mode::Sharper)).unwrap();
        assert_eq!(a.hop_length, 64);
        assert_eq!(a.info().frequency_bins, 513);
    }

    #[test]
    fn duration_is_rounded() {
        let wave = Waveform::new(vec![0.1; 12345], 10000);
        let a = pipeline().analyze(&wave, &request(Scale::Linear, Mode::Classic)).unwrap();
        assert_eq!(a.info().duration, 1.23);
    }

    #[test]
    fn preview_is_a_jpeg() {
        let wave = chirp(8000, 0.5);
        let out = pipeline()
            .generate_preview(&wave, &request(Scale::Mel, Mode::Sharp))
            .unwrap();
        assert_eq!(&out.bytes[..2], &[0xff, 0xd8]);
        assert_eq!(out.info.sample_rate, 8000);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = pipeline()
            .generate_from_path(
                Path::new("/nonexistent/input.wav"),
                &RenderRequest::default(),
                &RenderProfile::preview(),
            )
            .unwrap_err();
        assert!(matches!(err, SpectrogramError::Decode(_)));
    }
}
