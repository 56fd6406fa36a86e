use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::matrix::{SpectrogramMatrix, DB_FLOOR};
use crate::error::SpectrogramError;

/// Enhancement mode: trades dynamic range for visual punch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Classic,
    Sharp,
    Sharper,
}

/// Transform and clipping parameters resolved from a [`Mode`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeConfig {
    pub top_db: Option<f32>,
    pub hop_divisor: usize,
    pub preemphasis: Option<f32>,
    pub vmax_percentile: Option<f32>,
}

/// Display range chosen by [`ModeConfig::compress`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicRange {
    pub vmin: f32,
    pub vmax: f32,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Classic, Mode::Sharp, Mode::Sharper];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Classic => "classic",
            Mode::Sharp => "sharp",
            Mode::Sharper => "sharper",
        }
    }

    pub fn config(&self) -> ModeConfig {
        match self {
            Mode::Classic => ModeConfig {
                top_db: None,
                hop_divisor: 4,
                preemphasis: None,
                vmax_percentile: None,
            },
            Mode::Sharp => ModeConfig {
                top_db: Some(80.0),
                hop_divisor: 8,
                preemphasis: Some(0.97),
                vmax_percentile: Some(99.7),
            },
            Mode::Sharper => ModeConfig {
                top_db: Some(50.0),
                hop_divisor: 16,
                preemphasis: Some(0.98),
                vmax_percentile: Some(99.5),
            },
        }
    }

    /// Lenient lookup used where a name has not been validated; unknown names
    /// resolve to `classic`.
    pub fn from_name_or_classic(name: &str) -> Mode {
        name.parse().unwrap_or_else(|_| {
            log::warn!("Unknown mode '{}', using classic", name);
            Mode::Classic
        })
    }
}

impl FromStr for Mode {
    type Err = SpectrogramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Mode::Classic),
            "sharp" => Ok(Mode::Sharp),
            "sharper" => Ok(Mode::Sharper),
            other => Err(SpectrogramError::InvalidInput(format!(
                "Mode must be 'classic', 'sharp' or 'sharper', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ModeConfig {
    pub fn hop_length(&self, n_fft: usize) -> usize {
        (n_fft / self.hop_divisor.max(1)).max(1)
    }

    /// Apply `y[n] - coef * y[n-1]` when the mode asks for pre-emphasis.
    /// The sample before the first is extrapolated linearly as
    /// `2 * y[0] - y[1]`, so a DC offset does not leave a step at the start.
    pub fn apply_preemphasis(&self, samples: &[f32]) -> Option<Vec<f32>> {
        let coef = self.preemphasis?;
        let mut out = Vec::with_capacity(samples.len());
        let mut prev = match samples {
            [first, second, ..] => 2.0 * first - second,
            [first] => *first,
            [] => 0.0,
        };
        for &s in samples {
            out.push(s - coef * prev);
            prev = s;
        }
        Some(out)
    }

    /// Single dynamic-range compression step shared by every render profile.
    /// Clamps `matrix` in place and returns the colour range to render with.
    pub fn compress(&self, matrix: &mut SpectrogramMatrix) -> DynamicRange {
        let vmax = match self.vmax_percentile {
            Some(q) => matrix.percentile(q),
            None => matrix.max(),
        };
        let vmin = match self.top_db {
            Some(top_db) => vmax - top_db,
            None => matrix.min(),
        };
        let vmin = vmin.min(DB_FLOOR);
        matrix.clamp_min(vmin);
        DynamicRange { vmin, vmax }
    }
}
