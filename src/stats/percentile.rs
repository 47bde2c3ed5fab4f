//! Percentiles of unordered samples.
use serde::{Deserialize, Serialize};

use crate::error::SpinalError;

/// The method used when a percentile falls between two samples of ranks `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// `x_i + (x_j - x_i) * fraction`.
    #[default]
    Linear,
    /// `x_i`.
    Lower,
    /// `x_j`.
    Higher,
    /// The closest of `x_i` and `x_j` (ties go to the even rank).
    Nearest,
    /// `(x_i + x_j) / 2`.
    Midpoint,
}

/// Returns a sorted copy of the values.
/// Returns an error if the values are empty or contain NaN.
pub fn sorted(values: &[f64]) -> Result<Vec<f64>, SpinalError> {
    if values.is_empty() {
        return Err(SpinalError::EmptyInput(
            "Cannot compute percentiles of an empty sample".to_string(),
        ));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(SpinalError::InvalidParameter(
            "Cannot compute percentiles of a sample containing NaN".to_string(),
        ));
    }
    let mut values = values.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));
    Ok(values)
}

/// Returns the q-th percentile (q in [0, 100]) of already sorted values.
pub fn percentile_sorted(sorted: &[f64], q: f64, interpolation: Interpolation) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let fraction = rank - lo as f64;

    match interpolation {
        Interpolation::Linear => sorted[lo] + (sorted[hi] - sorted[lo]) * fraction,
        Interpolation::Lower => sorted[lo],
        Interpolation::Higher => sorted[hi],
        Interpolation::Nearest => {
            if fraction < 0.5 || (fraction == 0.5 && lo % 2 == 0) {
                sorted[lo]
            } else {
                sorted[hi]
            }
        }
        Interpolation::Midpoint => (sorted[lo] + sorted[hi]) / 2.0,
    }
}

/// Returns the percentiles of the values, one per entry of `qs`.
pub fn percentiles(
    values: &[f64],
    qs: &[f64],
    interpolation: Interpolation,
) -> Result<Vec<f64>, SpinalError> {
    if let Some(q) = qs.iter().find(|q| !(0.0..=100.0).contains(*q)) {
        return Err(SpinalError::InvalidParameter(format!(
            "Percentiles must be in [0, 100], got {}",
            q
        )));
    }
    let sorted = sorted(values)?;
    Ok(qs
        .iter()
        .map(|q| percentile_sorted(&sorted, *q, interpolation))
        .collect())
}
