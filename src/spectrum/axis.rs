use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::matrix::SpectrogramMatrix;
use crate::error::SpectrogramError;

/// Lower display bound for linear frequency axes.
pub const FREQ_MIN_HZ: f32 = 0.0;
/// Lower display bound for log and mel axes.
pub const LOG_MIN_HZ: f32 = 20.0;
/// Linear region half-width of the symmetric-log axis, per scale.
pub const LOG_LINTHRESH_HZ: f32 = 20.0;
pub const MEL_LINTHRESH_HZ: f32 = 200.0;
/// Bins whose loudest frame stays under this level are trimmed off the axis.
pub const AUTO_FREQ_MAX_DB: f32 = -60.0;
pub const AUTO_FREQ_MAX_PAD_HZ: f32 = 100.0;

const CANONICAL_TICKS_HZ: [f32; 10] = [
    20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0,
];

/// Frequency display scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Linear,
    Log,
    Mel,
}

impl Scale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Linear => "linear",
            Scale::Log => "log",
            Scale::Mel => "mel",
        }
    }

    pub fn axis_label(&self) -> &'static str {
        match self {
            Scale::Linear => "Frequency (Hz)",
            Scale::Log => "Frequency (Hz, pseudo log)",
            Scale::Mel => "Mel Spectrogram (HTK, Hz)",
        }
    }

    fn display_floor(&self) -> f32 {
        match self {
            Scale::Linear => FREQ_MIN_HZ,
            Scale::Log | Scale::Mel => LOG_MIN_HZ,
        }
    }

    /// Vertical axis transform used when drawing this scale.
    pub fn axis_transform(&self) -> AxisTransform {
        match self {
            Scale::Linear => AxisTransform::Linear,
            Scale::Log => AxisTransform::SymLog {
                linthresh: LOG_LINTHRESH_HZ,
            },
            Scale::Mel => AxisTransform::SymLog {
                linthresh: MEL_LINTHRESH_HZ,
            },
        }
    }
}

impl FromStr for Scale {
    type Err = SpectrogramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Scale::Linear),
            "log" => Ok(Scale::Log),
            "mel" => Ok(Scale::Mel),
            other => Err(SpectrogramError::InvalidInput(format!(
                "Scale must be 'linear', 'log' or 'mel', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frequency bounds of the rendered axis, in Hz.
///
/// Always `min < max` and `data_fmax <= max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayBounds {
    pub min: f32,
    pub max: f32,
    pub data_fmax: f32,
}

pub fn display_bounds(sample_rate: u32, scale: Scale) -> DisplayBounds {
    let nyquist = sample_rate as f32 / 2.0;
    let min = scale.display_floor();
    let mut max = nyquist;
    if max <= min {
        max = min + 1.0;
    }

    let mut data_fmax = max.min(nyquist);
    if data_fmax <= min {
        data_fmax = min + 1.0;
    }

    DisplayBounds {
        min,
        max,
        data_fmax,
    }
}

impl DisplayBounds {
    /// Tighten `max` to the highest STFT bin carrying energy above
    /// [`AUTO_FREQ_MAX_DB`]. Mel matrices are left untouched.
    pub fn auto_trim(self, matrix: &SpectrogramMatrix, sample_rate: u32, scale: Scale) -> Self {
        if scale == Scale::Mel || matrix.frequency_bins() < 2 {
            return self;
        }

        let n_fft = 2 * (matrix.frequency_bins() - 1);
        let maxima = matrix.bin_maxima();
        let Some(top_bin) = maxima.iter().rposition(|&db| db > AUTO_FREQ_MAX_DB) else {
            return self;
        };

        let auto_max = top_bin as f32 * sample_rate as f32 / n_fft as f32 + AUTO_FREQ_MAX_PAD_HZ;
        let mut max = self.max.min(auto_max);
        if max <= self.min {
            max = self.min + 1.0;
        }
        let data_fmax = self.data_fmax.min(max);

        log::debug!("Auto-trimmed frequency axis to {:.0} Hz", max);

        Self {
            min: self.min,
            max,
            data_fmax,
        }
    }

    /// Tick positions for the frequency axis.
    pub fn ticks(&self, scale: Scale) -> Vec<f32> {
        let candidates: Vec<f32> = match scale {
            Scale::Log | Scale::Mel => CANONICAL_TICKS_HZ.to_vec(),
            Scale::Linear => nice_ticks(self.min, self.max, 8),
        };
        let mut ticks: Vec<f32> = candidates
            .into_iter()
            .filter(|&t| t >= self.min && t <= self.max)
            .map(|t| (t * 1e6).round() / 1e6)
            .collect();
        if ticks.is_empty() {
            ticks = vec![self.min, self.max];
        }
        ticks.sort_by(f32::total_cmp);
        ticks.dedup();
        ticks
    }
}

/// Vertical axis mapping from Hz to a coordinate that is linear on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisTransform {
    Linear,
    /// Linear within `±linthresh`, base-10 logarithmic beyond.
    SymLog { linthresh: f32 },
}

impl AxisTransform {
    pub fn forward(&self, hz: f32) -> f32 {
        match *self {
            AxisTransform::Linear => hz,
            AxisTransform::SymLog { linthresh } => {
                let a = hz.abs();
                let v = if a <= linthresh {
                    a / linthresh
                } else {
                    1.0 + (a / linthresh).log10()
                };
                v.copysign(hz)
            }
        }
    }

    pub fn inverse(&self, y: f32) -> f32 {
        match *self {
            AxisTransform::Linear => y,
            AxisTransform::SymLog { linthresh } => {
                let a = y.abs();
                let v = if a <= 1.0 {
                    a * linthresh
                } else {
                    linthresh * 10.0_f32.powf(a - 1.0)
                };
                v.copysign(y)
            }
        }
    }
}

/// Round tick positions covering `[lo, hi]` with at most `max_ticks` steps,
/// picking the step from the 1/2/2.5/5 × 10^k ladder.
pub fn nice_ticks(lo: f32, hi: f32, max_ticks: usize) -> Vec<f32> {
    if !(hi > lo) || max_ticks == 0 {
        return vec![lo];
    }
    let raw_step = (hi - lo) as f64 / max_ticks as f64;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw_step)
        .unwrap_or(10.0 * magnitude);

    let first = (lo as f64 / step).ceil() as i64;
    let last = (hi as f64 / step).floor() as i64;
    (first..=last).map(|i| (i as f64 * step) as f32).collect()
}
