//! HTK-style mel filterbank.
//!
//! Triangular filters with unit peak (no area normalisation), band edges
//! spread evenly on the mel axis between `fmin` and `fmax`.

/// Default number of mel bands before capping at `n_fft / 2 + 1`.
pub const MEL_BANDS: usize = 384;

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// `n_mels + 2` band edges spaced evenly on the mel axis over `[fmin, fmax]`.
pub fn mel_edges(n_mels: usize, fmin: f32, fmax: f32) -> Vec<f32> {
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax.max(fmin + 1.0));
    (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
        .collect()
}

/// Centre frequency of every band, in Hz.
pub fn band_centers(n_mels: usize, fmin: f32, fmax: f32) -> Vec<f32> {
    let n_mels = n_mels.max(1);
    mel_edges(n_mels, fmin, fmax)[1..=n_mels].to_vec()
}

/// Band count actually used for a given FFT size.
pub fn band_count(n_fft: usize, requested: usize) -> usize {
    requested.min(n_fft / 2 + 1).max(1)
}

#[derive(Clone, Debug)]
pub struct MelFilterbank {
    n_mels: usize,
    n_freqs: usize,
    /// `n_mels × n_freqs`, row-major
    weights: Vec<f32>,
    /// Centre frequency of every band, in Hz
    centers: Vec<f32>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Self {
        let n_freqs = n_fft / 2 + 1;
        let n_mels = n_mels.max(1);

        let edges = mel_edges(n_mels, fmin, fmax);

        let fft_freqs: Vec<f32> = (0..n_freqs)
            .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let mut weights = vec![0.0f32; n_mels * n_freqs];
        for m in 0..n_mels {
            let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
            let lower_width = (center - left).max(f32::EPSILON);
            let upper_width = (right - center).max(f32::EPSILON);
            let row = &mut weights[m * n_freqs..(m + 1) * n_freqs];
            for (w, &f) in row.iter_mut().zip(fft_freqs.iter()) {
                let lower = (f - left) / lower_width;
                let upper = (right - f) / upper_width;
                *w = lower.min(upper).max(0.0);
            }
        }

        let centers = edges[1..=n_mels].to_vec();

        Self {
            n_mels,
            n_freqs,
            weights,
            centers,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn centers(&self) -> &[f32] {
        &self.centers
    }

    /// Project one power spectrum frame (`n_fft/2 + 1` bins) onto the bands.
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        debug_assert_eq!(power.len(), self.n_freqs);
        self.weights
            .chunks(self.n_freqs)
            .map(|row| row.iter().zip(power.iter()).map(|(w, p)| w * p).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htk_round_trip() {
        for hz in [0.0f32, 20.0, 440.0, 1000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.05);
        }
        assert!((hz_to_mel(1000.0) - 1000.0).abs() < 0.5);
    }

    #[test]
    fn band_count_is_capped() {
        assert_eq!(band_count(512, MEL_BANDS), 257);
        assert_eq!(band_count(2048, MEL_BANDS), 384);
    }

    #[test]
    fn filters_are_triangles_with_unit_peak() {
        let fb = MelFilterbank::new(16000, 1024, 40, 20.0, 8000.0);
        assert_eq!(fb.n_mels(), 40);
        for m in 0..fb.n_mels() {
            let row = &fb.weights[m * fb.n_freqs..(m + 1) * fb.n_freqs];
            let peak = row.iter().copied().fold(0.0f32, f32::max);
            assert!(peak <= 1.0 + 1e-6);
            assert!(row.iter().all(|&w| w >= 0.0));
        }
        assert!(fb.centers().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(fb.centers(), band_centers(40, 20.0, 8000.0).as_slice());
    }

    #[test]
    fn tone_lands_in_band_around_its_frequency() {
        let sr = 16000;
        let n_fft = 1024;
        let fb = MelFilterbank::new(sr, n_fft, 64, 20.0, 8000.0);
        let mut power = vec![0.0f32; n_fft / 2 + 1];
        let bin = (1000.0 * n_fft as f32 / sr as f32).round() as usize;
        power[bin] = 1.0;
        let bands = fb.apply(&power);
        let (best, _) = bands
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert!((fb.centers()[best] - 1000.0).abs() < 150.0);
    }
}
