//! Boxplot summaries (median, boxes, whiskers and fliers) of a set of dots.
use serde::{Deserialize, Serialize};

use crate::error::SpinalError;

use super::percentile::{percentile_sorted, sorted, Interpolation};

/// The boxplot summary of a set of dots.
///
/// The ordering `flier_low <= whisker_low <= q1 <= median <= q3 <= whisker_high <= flier_high` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxplotSummary {
    pub median: f64,
    /// Lower box border (25th percentile).
    pub q1: f64,
    /// Upper box border (75th percentile).
    pub q3: f64,
    /// The lowest dot within the lower fence, or Q1 if there is none below Q1.
    pub whisker_low: f64,
    /// The highest dot within the upper fence, or Q3 if there is none above Q3.
    pub whisker_high: f64,
    /// The lowest dot beyond the lower fence, or the lower whisker if there is none.
    pub flier_low: f64,
    /// The highest dot beyond the upper fence, or the upper whisker if there is none.
    pub flier_high: f64,
}

impl BoxplotSummary {
    /// Compute the boxplot summary of the dots.
    /// The fences are `Q1 - whisker_factor * IQR` and `Q3 + whisker_factor * IQR`.
    /// Returns an error if there is no dot.
    pub fn compute(
        dots: &[f64],
        whisker_factor: f64,
        interpolation: Interpolation,
    ) -> Result<BoxplotSummary, SpinalError> {
        let sorted_dots = sorted(dots)?;
        let q1 = percentile_sorted(&sorted_dots, 25.0, interpolation);
        let median = percentile_sorted(&sorted_dots, 50.0, interpolation);
        let q3 = percentile_sorted(&sorted_dots, 75.0, interpolation);

        let iqr = q3 - q1;
        let low_fence = q1 - whisker_factor * iqr;
        let high_fence = q3 + whisker_factor * iqr;

        let mut whisker_high = q3;
        let mut whisker_low = q1;
        for &dot in dots {
            if q3 < dot && dot <= high_fence && dot > whisker_high {
                whisker_high = dot;
            }
            if low_fence <= dot && dot < q1 && dot < whisker_low {
                whisker_low = dot;
            }
        }

        // Fliers only move outwards from the whiskers, the whiskers are left untouched.
        let mut flier_high = whisker_high;
        let mut flier_low = whisker_low;
        for &dot in dots {
            if dot > high_fence && dot > flier_high {
                flier_high = dot;
            }
            if dot < low_fence && dot < flier_low {
                flier_low = dot;
            }
        }

        Ok(BoxplotSummary {
            median,
            q1,
            q3,
            whisker_low,
            whisker_high,
            flier_low,
            flier_high,
        })
    }

    /// The summary as `[median, q3, q1, whisker_high, whisker_low, flier_high, flier_low]`.
    pub fn to_array(&self) -> [f64; 7] {
        [
            self.median,
            self.q3,
            self.q1,
            self.whisker_high,
            self.whisker_low,
            self.flier_high,
            self.flier_low,
        ]
    }

    /// Returns the summary shifted vertically by the given offset.
    pub fn shifted(&self, offset: f64) -> BoxplotSummary {
        BoxplotSummary {
            median: self.median + offset,
            q1: self.q1 + offset,
            q3: self.q3 + offset,
            whisker_low: self.whisker_low + offset,
            whisker_high: self.whisker_high + offset,
            flier_low: self.flier_low + offset,
            flier_high: self.flier_high + offset,
        }
    }

    /// Check the ordering of the summary statistics.
    pub fn is_ordered(&self) -> bool {
        self.flier_low <= self.whisker_low
            && self.whisker_low <= self.q1
            && self.q1 <= self.median
            && self.median <= self.q3
            && self.q3 <= self.whisker_high
            && self.whisker_high <= self.flier_high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const DOTS: [f64; 11] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 100.0];

    #[test]
    fn test_linear_summary() {
        let summary = BoxplotSummary::compute(&DOTS, 1.5, Interpolation::Linear).unwrap();
        assert_relative_eq!(summary.q1, 3.5);
        assert_relative_eq!(summary.median, 6.0);
        assert_relative_eq!(summary.q3, 8.5);
        assert_eq!(summary.whisker_high, 10.0);
        assert_eq!(summary.flier_high, 100.0);
        assert_eq!(summary.whisker_low, 1.0);
        assert_eq!(summary.flier_low, 1.0);
    }

    #[test]
    fn test_lower_summary() {
        let summary = BoxplotSummary::compute(&DOTS, 1.5, Interpolation::Lower).unwrap();
        assert_eq!(summary.q1, 3.0);
        assert_eq!(summary.median, 6.0);
        assert_eq!(summary.q3, 8.0);
        assert_eq!(summary.whisker_high, 10.0);
        assert_eq!(summary.flier_high, 100.0);
        assert_eq!(summary.to_array().len(), 7);
    }

    #[test]
    fn test_degenerate_whiskers() {
        // All dots equal: whiskers and fliers collapse on the quartiles
        let summary = BoxplotSummary::compute(&[2.0; 5], 1.5, Interpolation::Linear).unwrap();
        assert_eq!(summary.to_array(), [2.0; 7]);

        let summary = BoxplotSummary::compute(&[3.0], 1.5, Interpolation::Linear).unwrap();
        assert_eq!(summary.whisker_low, 3.0);
        assert_eq!(summary.whisker_high, 3.0);
    }

    #[test]
    fn test_low_flier() {
        let dots = vec![-100.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let summary = BoxplotSummary::compute(&dots, 1.5, Interpolation::Linear).unwrap();
        assert_eq!(summary.whisker_low, 1.0);
        assert_eq!(summary.flier_low, -100.0);
        assert_eq!(summary.whisker_high, 10.0);
        assert_eq!(summary.flier_high, 10.0);
    }

    #[test]
    fn test_empty() {
        assert!(matches!(
            BoxplotSummary::compute(&[], 1.5, Interpolation::Linear),
            Err(SpinalError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_ordering_random() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let n = rng.gen_range(1..40);
            let dots: Vec<f64> = (0..n)
                .map(|_| {
                    let x: f64 = rng.gen_range(-1.0..1.0);
                    if rng.gen_bool(0.1) {
                        x * 50.0
                    } else {
                        x
                    }
                })
                .collect();
            let summary = BoxplotSummary::compute(&dots, 1.5, Interpolation::Linear).unwrap();
            assert!(summary.is_ordered(), "{:?} for {:?}", summary, dots);
        }
    }

    #[test]
    fn test_shifted() {
        let summary = BoxplotSummary::compute(&DOTS, 1.5, Interpolation::Lower).unwrap();
        let shifted = summary.shifted(6.0);
        assert_eq!(shifted.median, 12.0);
        assert_eq!(shifted.flier_high, 106.0);
        assert_eq!(shifted.q1, 9.0);
    }
}
