use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Lowest representable energy, in dB.
pub const DB_FLOOR: f32 = -120.0;

/// Smallest magnitude treated as signal before taking a logarithm.
pub const AMPLITUDE_EPSILON: f32 = 1e-10;

/// Decibel-scaled energy laid out row-major as `[frequency_bins × time_frames]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrogramMatrix {
    data: Vec<f32>,
    bins: usize,
    frames: usize,
}

impl SpectrogramMatrix {
    pub fn new(data: Vec<f32>, bins: usize, frames: usize) -> Self {
        debug_assert_eq!(data.len(), bins * frames, "matrix shape mismatch");
        Self { data, bins, frames }
    }

    /// Build a matrix from frame-major columns (`frames[t][bin]`). Each
    /// column is released as soon as it has been copied.
    pub fn from_frames(columns: Vec<Vec<f32>>, bins: usize) -> Self {
        let frames = columns.len();
        let mut data = vec![DB_FLOOR; bins * frames];
        for (t, column) in columns.into_iter().enumerate() {
            for (bin, value) in column.into_iter().take(bins).enumerate() {
                data[bin * frames + t] = value;
            }
        }
        Self { data, bins, frames }
    }

    pub fn filled(value: f32, bins: usize, frames: usize) -> Self {
        Self {
            data: vec![value; bins * frames],
            bins,
            frames,
        }
    }

    pub fn frequency_bins(&self) -> usize {
        self.bins
    }

    pub fn time_frames(&self) -> usize {
        self.frames
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, bin: usize, frame: usize) -> f32 {
        self.data[bin * self.frames + frame]
    }

    pub fn row(&self, bin: usize) -> &[f32] {
        &self.data[bin * self.frames..(bin + 1) * self.frames]
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Maximum over time for every frequency bin.
    pub fn bin_maxima(&self) -> Vec<f32> {
        (0..self.bins)
            .map(|bin| self.row(bin).iter().copied().fold(f32::NEG_INFINITY, f32::max))
            .collect()
    }

    /// Percentile (0-100) with linear interpolation between the closest ranks.
    ///
    /// High percentiles only keep the values above the requested rank, so the
    /// whole matrix is copied only for `q` below the median.
    pub fn percentile(&self, q: f32) -> f32 {
        if self.data.is_empty() {
            return DB_FLOOR;
        }
        let n = self.data.len();
        let rank = (q.clamp(0.0, 100.0) as f64 / 100.0) * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = (rank - lo as f64) as f32;

        let (lo_val, hi_val) = if n - lo <= n / 2 {
            self.upper_ranks(n - lo)
        } else {
            let mut scratch = self.data.clone();
            let (_, lo_val, upper) = scratch.select_nth_unstable_by(lo, f32::total_cmp);
            // The next rank is the smallest value of the upper partition.
            let hi_val = upper.iter().copied().fold(f32::INFINITY, f32::min);
            (*lo_val, hi_val)
        };
        if hi == lo || frac == 0.0 {
            return lo_val;
        }
        lo_val + (hi_val - lo_val) * frac
    }

    /// The `k`-th and `(k-1)`-th largest values, found with a `k`-sized heap.
    fn upper_ranks(&self, k: usize) -> (f32, f32) {
        let mut top: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
        for &v in &self.data {
            if top.len() < k {
                top.push(Reverse(Ranked(v)));
            } else if top.peek().is_some_and(|min| v.total_cmp(&min.0 .0).is_gt()) {
                top.pop();
                top.push(Reverse(Ranked(v)));
            }
        }
        let kth = top.pop().map_or(DB_FLOOR, |r| r.0 .0);
        let next = top.peek().map_or(kth, |r| r.0 .0);
        (kth, next)
    }

    /// Clamp every value to be at least `floor`.
    pub fn clamp_min(&mut self, floor: f32) {
        for v in &mut self.data {
            if *v < floor {
                *v = floor;
            }
        }
    }

    /// Shift so the peak sits at 0 dB, then clamp at [`DB_FLOOR`].
    ///
    /// `silent` marks input whose peak never rose above the epsilon; such
    /// matrices are flattened to the floor instead of normalised.
    pub fn normalize_to_peak(&mut self, silent: bool) {
        if silent {
            self.data.iter_mut().for_each(|v| *v = DB_FLOOR);
            return;
        }
        let peak = self.max();
        for v in &mut self.data {
            *v = (*v - peak).max(DB_FLOOR);
        }
    }
}

/// `f32` under IEEE total order.
#[derive(Clone, Copy, PartialEq)]
struct Ranked(f32);

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_frames_transposes_columns() {
        let m = SpectrogramMatrix::from_frames(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]], 2);
        assert_eq!(m.frequency_bins(), 2);
        assert_eq!(m.time_frames(), 3);
        assert_eq!(m.row(0), &[1.0, 3.0, 5.0]);
        assert_eq!(m.row(1), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let m = SpectrogramMatrix::new((0..=10).map(|v| v as f32).collect(), 1, 11);
        assert_eq!(m.percentile(100.0), 10.0);
        assert_eq!(m.percentile(0.0), 0.0);
        assert!((m.percentile(50.0) - 5.0).abs() < 1e-6);
        assert!((m.percentile(95.0) - 9.5).abs() < 1e-5);
    }

    #[test]
    fn high_percentiles_match_a_full_sort() {
        // Scrambled ramp with duplicates.
        let values: Vec<f32> = (0..997).map(|i| -(((i * 37) % 500) as f32) * 0.25).collect();
        let mut sorted = values.clone();
        sorted.sort_by(f32::total_cmp);
        let m = SpectrogramMatrix::new(values, 1, 997);

        for q in [99.7f32, 99.5, 90.0, 50.0, 10.0] {
            let rank = (q as f64 / 100.0) * 996.0;
            let lo = rank.floor() as usize;
            let frac = (rank - lo as f64) as f32;
            let expected = sorted[lo] + (sorted[(lo + 1).min(996)] - sorted[lo]) * frac;
            assert!((m.percentile(q) - expected).abs() < 1e-4, "q = {}", q);
        }
    }

    #[test]
    fn normalize_puts_peak_at_zero_and_respects_floor() {
        let mut m = SpectrogramMatrix::new(vec![-10.0, -50.0, -300.0, -20.0], 2, 2);
        m.normalize_to_peak(false);
        assert_eq!(m.max(), 0.0);
        assert_eq!(m.min(), DB_FLOOR);
        assert_eq!(m.get(0, 1), -40.0);
    }

    #[test]
    fn silent_matrix_flattens_to_floor() {
        let mut m = SpectrogramMatrix::filled(-200.0, 3, 4);
        m.normalize_to_peak(true);
        assert!(m.values().iter().all(|&v| v == DB_FLOOR));
    }

    #[test]
    fn bin_maxima_reduce_over_time() {
        let m = SpectrogramMatrix::new(vec![-3.0, -1.0, -7.0, -9.0, -2.0, -8.0], 2, 3);
        assert_eq!(m.bin_maxima(), vec![-1.0, -2.0]);
    }
}
