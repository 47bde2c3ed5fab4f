//! Elementary signal processing on sampled traces.
use crate::error::SpinalError;

/// The number of samples kept raw at each border of a smoothed slice.
pub const RAW_BORDER: usize = 2;

/// Smooth the data with a box filter of `box_pts` samples.
///
/// The output has the same length as the input and is aligned like a centered ("same") convolution:
/// `out[k] = (data[k - h] + ... + data[k - h + box_pts - 1]) / box_pts` with `h = box_pts / 2`,
/// missing samples counting as zeros.
pub fn smooth(data: &[f64], box_pts: usize) -> Vec<f64> {
    if box_pts <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let half = box_pts / 2;
    let n = data.len() as isize;
    (0..data.len() as isize)
        .map(|k| {
            let start = k - half as isize;
            (start..start + box_pts as isize)
                .filter(|i| *i >= 0 && *i < n)
                .map(|i| data[i as usize])
                .sum::<f64>()
                / box_pts as f64
        })
        .collect()
}

/// Smooth the data as in [`smooth`] but keep the first and last [`RAW_BORDER`] samples raw.
pub fn smooth_preserving_edges(data: &[f64], box_pts: usize) -> Vec<f64> {
    let mut smoothed = smooth(data, box_pts);
    let n = data.len();
    for i in (0..RAW_BORDER.min(n)).chain(n.saturating_sub(RAW_BORDER)..n) {
        smoothed[i] = data[i];
    }
    smoothed
}

/// Returns the discrete gradient of the data (per sample).
/// Central differences are used inside, one-sided differences at both ends.
pub fn gradient(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    match n {
        0 => vec![],
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    data[1] - data[0]
                } else if i == n - 1 {
                    data[n - 1] - data[n - 2]
                } else {
                    (data[i + 1] - data[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Normalize the data.
///
/// If `zero_relative` is set, every value is expressed relatively to the first one and divided by the magnitude of the minimum,
/// i.e., `(x - x[0]) / |min(x)|`. Otherwise, the data is linearly mapped onto `[a, b]`.
/// Returns an error if `a >= b`, if the data is empty, or if the normalization constant vanishes.
pub fn normalization(
    data: &[f64],
    a: f64,
    b: f64,
    zero_relative: bool,
) -> Result<Vec<f64>, SpinalError> {
    if a >= b {
        return Err(SpinalError::InvalidParameter(format!(
            "Left interval bound {} must be less than right bound {}",
            a, b
        )));
    }
    let first = *data.first().ok_or_else(|| {
        SpinalError::EmptyInput("Cannot normalize an empty trace".to_string())
    })?;
    let min_x = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if zero_relative {
        let minimal = min_x.abs();
        if minimal == 0.0 {
            return Err(SpinalError::InvalidParameter(
                "Zero-relative normalization requires a non-zero minimum".to_string(),
            ));
        }
        Ok(data.iter().map(|x| (x - first) / minimal).collect())
    } else {
        if max_x == min_x {
            return Err(SpinalError::InvalidParameter(
                "Cannot normalize a constant trace".to_string(),
            ));
        }
        let scale = (b - a) / (max_x - min_x);
        Ok(data.iter().map(|x| (x - min_x) * scale + a).collect())
    }
}

/// The kind of relative extrema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Maximum,
    Minimum,
}

/// Returns the (strict) relative extrema of the data as (index, value) pairs.
///
/// A sample is a maximum (resp. minimum) if it is strictly greater (resp. less) than both neighbors,
/// hence the first and last samples and plateaus never qualify.
/// Among consecutive extrema with the same value, only the last one is kept.
pub fn find_extrema(data: &[f64], kind: Extremum) -> Vec<(usize, f64)> {
    let candidates: Vec<(usize, f64)> = data
        .windows(3)
        .enumerate()
        .filter(|(_, w)| match kind {
            Extremum::Maximum => w[1] > w[0] && w[1] > w[2],
            Extremum::Minimum => w[1] < w[0] && w[1] < w[2],
        })
        .map(|(i, w)| (i + 1, w[1]))
        .collect();

    let num_candidates = candidates.len();
    candidates
        .iter()
        .enumerate()
        .filter(|(i, (_, value))| *i + 1 == num_candidates || candidates[*i + 1].1 != *value)
        .map(|(_, extremum)| *extremum)
        .collect()
}
