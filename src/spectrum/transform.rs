use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::matrix::{SpectrogramMatrix, AMPLITUDE_EPSILON};
use super::mel::{band_count, MelFilterbank, MEL_BANDS};
use crate::accel::Capability;
use crate::error::{Result, SpectrogramError};

/// Waveform to dB matrix, on the accelerated backend when one was detected
/// and the caller asks for it, on the scalar path otherwise.
pub struct TransformEngine {
    capability: Capability,
}

impl TransformEngine {
    pub fn new(capability: Capability) -> Self {
        Self { capability }
    }

    pub fn scalar() -> Self {
        Self::new(Capability::ScalarOnly)
    }

    pub fn is_accelerated(&self) -> bool {
        self.capability.is_accelerated()
    }

    /// Linear-frequency STFT magnitude in dB, peak at 0 dB, floored at
    /// [`DB_FLOOR`](super::matrix::DB_FLOOR). Shape `[n_fft/2 + 1, frames]`.
    pub fn compute_spectrogram(
        &self,
        samples: &[f32],
        n_fft: usize,
        hop_length: usize,
        prefer_accelerated: bool,
    ) -> Result<SpectrogramMatrix> {
        let mut frames = self.magnitudes(samples, n_fft, hop_length, prefer_accelerated)?;
        let bins = n_fft / 2 + 1;

        let peak = frames.iter().flatten().copied().fold(0.0f32, f32::max);
        frames.par_iter_mut().flatten().for_each(|v| {
            *v = 20.0 * v.max(AMPLITUDE_EPSILON).log10();
        });

        let mut matrix = SpectrogramMatrix::from_frames(frames, bins);
        matrix.normalize_to_peak(peak <= AMPLITUDE_EPSILON);
        Ok(matrix)
    }

    /// Mel-filtered power spectrogram in dB relative to its own maximum.
    /// Shape `[min(MEL_BANDS, n_fft/2 + 1), frames]`.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_mel_spectrogram(
        &self,
        samples: &[f32],
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
        fmin: f32,
        fmax: f32,
        prefer_accelerated: bool,
    ) -> Result<SpectrogramMatrix> {
        let frames = self.magnitudes(samples, n_fft, hop_length, prefer_accelerated)?;
        let n_mels = band_count(n_fft, MEL_BANDS);
        let filterbank = MelFilterbank::new(sample_rate, n_fft, n_mels, fmin, fmax);

        // Power replaces magnitude in place; each frame then shrinks to its bands.
        let mut mel_frames: Vec<Vec<f32>> = frames
            .into_par_iter()
            .map(|mut frame| {
                frame.iter_mut().for_each(|m| *m *= *m);
                filterbank.apply(&frame)
            })
            .collect();

        let peak = mel_frames.iter().flatten().copied().fold(0.0f32, f32::max);
        mel_frames.par_iter_mut().flatten().for_each(|p| {
            *p = 10.0 * p.max(AMPLITUDE_EPSILON).log10();
        });

        let mut matrix = SpectrogramMatrix::from_frames(mel_frames, n_mels);
        matrix.normalize_to_peak(peak <= AMPLITUDE_EPSILON);
        Ok(matrix)
    }

    /// Frame-major STFT magnitudes, `n_fft/2 + 1` bins per frame.
    fn magnitudes(
        &self,
        samples: &[f32],
        n_fft: usize,
        hop_length: usize,
        prefer_accelerated: bool,
    ) -> Result<Vec<Vec<f32>>> {
        if samples.is_empty() {
            return Err(SpectrogramError::Transform("waveform is empty".into()));
        }
        if n_fft < 2 || hop_length == 0 {
            return Err(SpectrogramError::Transform(format!(
                "invalid frame geometry: n_fft={}, hop={}",
                n_fft, hop_length
            )));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(SpectrogramError::Transform(
                "waveform contains non-finite samples".into(),
            ));
        }

        if prefer_accelerated {
            if let Capability::Accelerated(ref gpu) = self.capability {
                match gpu.stft_magnitudes(samples, n_fft, hop_length) {
                    Ok(frames) => return Ok(frames),
                    Err(e) => log::warn!("{}; falling back to scalar transform", e),
                }
            }
        }

        Ok(stft_magnitudes(samples, n_fft, hop_length))
    }
}

/// Number of analysis frames: one for anything up to `n_fft` samples, then
/// one more per (possibly partial) hop.
pub fn frame_count(len: usize, n_fft: usize, hop_length: usize) -> usize {
    if len <= n_fft {
        1
    } else {
        1 + (len - n_fft).div_ceil(hop_length)
    }
}

/// Copy frame `index` into `out`, zero padding past the end of the signal.
pub fn fill_frame(samples: &[f32], index: usize, hop_length: usize, out: &mut [f32]) {
    let start = index * hop_length;
    let available = samples.len().saturating_sub(start).min(out.len());
    out[..available].copy_from_slice(&samples[start..start + available]);
    out[available..].iter_mut().for_each(|s| *s = 0.0);
}

/// Scalar STFT used whenever no accelerated backend runs.
pub fn stft_magnitudes(samples: &[f32], n_fft: usize, hop_length: usize) -> Vec<Vec<f32>> {
    let total_frames = frame_count(samples.len(), n_fft, hop_length);
    let window = hann_window(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let bins = n_fft / 2 + 1;

    log::debug!(
        "Scalar STFT: {} frames, n_fft={}, hop={}",
        total_frames, n_fft, hop_length
    );

    (0..total_frames)
        .into_par_iter()
        .map_init(
            || (vec![0.0f32; n_fft], vec![Complex::new(0.0f32, 0.0); n_fft]),
            |(frame, buffer), index| {
                fill_frame(samples, index, hop_length, frame);
                for ((c, &s), &w) in buffer.iter_mut().zip(frame.iter()).zip(window.iter()) {
                    *c = Complex::new(s * w, 0.0);
                }
                fft.process(buffer);
                buffer[..bins].iter().map(|c| c.norm()).collect()
            },
        )
        .collect()
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::matrix::DB_FLOOR;

    fn sine(freq: f32, sr: u32, seconds: f32) -> Vec<f32> {
        let n = (sr as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn frame_count_pads_the_tail() {
        assert_eq!(frame_count(100, 2048, 512), 1);
        assert_eq!(frame_count(2048, 2048, 512), 1);
        assert_eq!(frame_count(2049, 2048, 512), 2);
        assert_eq!(frame_count(2048 + 1024, 2048, 512), 3);
    }

    #[test]
    fn short_waveform_yields_single_frame() {
        let engine = TransformEngine::scalar();
        let m = engine.compute_spectrogram(&sine(440.0, 8000, 0.01), 1024, 256, false).unwrap();
        assert_eq!(m.time_frames(), 1);
        assert_eq!(m.frequency_bins(), 513);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sr = 44100;
        let n_fft = 2048;
        let engine = TransformEngine::scalar();
        let m = engine
            .compute_spectrogram(&sine(440.0, sr, 0.5), n_fft, 512, false)
            .unwrap();
        assert_eq!(m.max(), 0.0);
        let maxima = m.bin_maxima();
        let loudest = maxima
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let hz_per_bin = sr as f32 / n_fft as f32;
        assert!((loudest as f32 * hz_per_bin - 440.0).abs() <= hz_per_bin);
    }

    #[test]
    fn silence_sits_on_the_floor() {
        let engine = TransformEngine::scalar();
        let m = engine.compute_spectrogram(&vec![0.0; 4096], 1024, 256, false).unwrap();
        assert!(m.values().iter().all(|&v| v == DB_FLOOR));
        let mel = engine
            .compute_mel_spectrogram(&vec![0.0; 4096], 16000, 1024, 256, 20.0, 8000.0, false)
            .unwrap();
        assert!(mel.values().iter().all(|&v| v == DB_FLOOR));
    }

    #[test]
    fn empty_waveform_is_a_transform_error() {
        let engine = TransformEngine::scalar();
        let err = engine.compute_spectrogram(&[], 1024, 256, false).unwrap_err();
        assert!(matches!(err, SpectrogramError::Transform(_)));
    }

    #[test]
    fn mel_band_count_is_capped_by_fft_size() {
        let engine = TransformEngine::scalar();
        let m = engine
            .compute_mel_spectrogram(&sine(1000.0, 16000, 0.2), 16000, 512, 128, 20.0, 8000.0, false)
            .unwrap();
        assert_eq!(m.frequency_bins(), 257);
        assert_eq!(m.max(), 0.0);
        assert!(m.min() >= DB_FLOOR);
    }

    #[test]
    fn decibels_follow_the_peak_magnitude() {
        let wave = sine(500.0, 8000, 0.25);
        let engine = TransformEngine::scalar();
        let m = engine.compute_spectrogram(&wave, 256, 64, false).unwrap();

        let raw = stft_magnitudes(&wave, 256, 64);
        let peak = raw.iter().flatten().copied().fold(0.0f32, f32::max);
        for (t, frame) in raw.iter().enumerate().step_by(7) {
            for (bin, &mag) in frame.iter().enumerate().step_by(11) {
                let expected = (20.0 * (mag.max(AMPLITUDE_EPSILON) / peak).log10()).max(DB_FLOOR);
                assert!((m.get(bin, t) - expected).abs() < 1e-3, "bin {} frame {}", bin, t);
            }
        }
    }

    #[test]
    fn accelerated_preference_without_device_matches_scalar() {
        let engine = TransformEngine::scalar();
        let wave = sine(1234.0, 22050, 0.3);
        let a = engine.compute_spectrogram(&wave, 1024, 256, true).unwrap();
        let b = engine.compute_spectrogram(&wave, 1024, 256, false).unwrap();
        assert_eq!(a, b);
    }
}
