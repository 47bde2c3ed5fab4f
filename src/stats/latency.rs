//! Latency of the poly-synaptic response within each slice.
use log::trace;

use crate::config::AnalysisConfig;
use crate::error::SpinalError;
use crate::slicer::SlicedDataset;

use super::percentile::{percentile_sorted, sorted, Interpolation};
use super::signal::{gradient, smooth_preserving_edges};

/// The width of the box filter applied before differentiating a slice.
pub const LATENCY_SMOOTHING: usize = 2;

/// Lower and upper percentiles of the gradient used as crossing thresholds.
const GRADIENT_PERCENTILES: (f64, f64) = (20.0, 80.0);

/// Returns the (20th, 80th) percentiles of a gradient sample, or the given fallback if empty.
fn thresholds(values: &[f64], fallback: f64) -> (f64, f64) {
    match sorted(values) {
        Ok(values) => (
            percentile_sorted(&values, GRADIENT_PERCENTILES.0, Interpolation::Linear),
            percentile_sorted(&values, GRADIENT_PERCENTILES.1, Interpolation::Linear),
        ),
        Err(_) => (fallback, fallback),
    }
}

/// Returns the latency index of a slice, i.e., the first sample after the mono-response border
/// where the gradient of the (lightly smoothed) signal is unusually steep.
///
/// A sample is steep if its gradient exceeds the 80th percentile of the positive gradients,
/// or falls below the 20th percentile of the negative gradients, both taken after the border,
/// and if its magnitude exceeds `micro_gradient`.
/// If no sample is steep, the last index of the slice is returned.
///
/// The result always lies in `[0, slice.len() - 1]` for a non-empty slice.
pub fn latency_index(slice: &[f64], border: usize, micro_gradient: f64) -> usize {
    if slice.is_empty() {
        return 0;
    }
    let smoothed = smooth_preserving_edges(slice, LATENCY_SMOOTHING);
    let grad = gradient(&smoothed);
    let poly_gradient = grad.get(border..).unwrap_or(&[]);

    let positive: Vec<f64> = poly_gradient.iter().copied().filter(|g| *g > 0.0).collect();
    let negative: Vec<f64> = poly_gradient.iter().copied().filter(|g| *g < 0.0).collect();
    let (_, pos_high) = thresholds(&positive, f64::INFINITY);
    let (neg_low, _) = thresholds(&negative, f64::NEG_INFINITY);

    match poly_gradient
        .iter()
        .position(|g| (*g > pos_high || *g < neg_low) && g.abs() > micro_gradient)
    {
        Some(index) => index + border,
        None => {
            trace!("No latency found after sample {}, falling back to the last index", border);
            slice.len() - 1
        }
    }
}

/// Returns the latency index of every slice of every test, as `[test][slice]`.
/// Returns an error if the configuration is invalid.
pub fn latency_matrix(
    dataset: &SlicedDataset,
    config: &AnalysisConfig,
) -> Result<Vec<Vec<usize>>, SpinalError> {
    if config.micro_gradient < 0.0 {
        return Err(SpinalError::InvalidParameter(
            "The micro gradient threshold must be non-negative".to_string(),
        ));
    }
    let border = crate::config::duration_to_samples(config.mono_border, dataset.step());

    Ok((0..dataset.num_tests())
        .map(|test_index| {
            dataset
                .slices_iter(test_index)
                .map(|slice| latency_index(slice, border, config.micro_gradient))
                .collect()
        })
        .collect())
}
