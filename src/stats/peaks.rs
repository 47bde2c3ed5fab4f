//! Peaks, i.e., pairs of a relative maximum followed by a relative minimum, and amplitude areas.
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{duration_to_samples, AnalysisConfig};
use crate::error::SpinalError;
use crate::slicer::SlicedDataset;

use super::signal::{find_extrema, smooth, Extremum};

/// The width of the box filter applied to a slice before searching its extrema.
pub const AREA_SMOOTHING: usize = 2;

/// A candidate peak made of a maximum and the minimum paired with it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ExtremaPair {
    max_index: usize,
    min_index: usize,
    /// The time between both extrema (in samples).
    dt: usize,
    /// The amplitude between both extrema.
    da: f64,
}

/// Pair the maxima with the minima, starting from a maximum.
/// If the first minimum precedes the first maximum, it is left out. Unpaired extrema are dropped.
fn pair_extrema(maxima: &[(usize, f64)], minima: &[(usize, f64)]) -> Vec<ExtremaPair> {
    let minima = match (maxima.first(), minima.first()) {
        (Some(max), Some(min)) if min.0 < max.0 => &minima[1..],
        (Some(_), Some(_)) => minima,
        _ => return vec![],
    };
    maxima
        .iter()
        .zip(minima.iter())
        .map(|(&(max_index, max_value), &(min_index, min_value))| ExtremaPair {
            max_index,
            min_index,
            dt: max_index.abs_diff(min_index),
            da: (max_value - min_value).abs(),
        })
        .collect()
}

/// The acceptance rule of a pair of extrema.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PeakFilter {
    min_dist: usize,
    max_dist: usize,
    micro_amplitude: f64,
    min_amplitude: f64,
}

impl PeakFilter {
    fn new(config: &AnalysisConfig, step: f64) -> Self {
        PeakFilter {
            min_dist: duration_to_samples(config.peak_min_dist, step),
            max_dist: duration_to_samples(config.peak_max_dist, step),
            micro_amplitude: config.micro_amplitude,
            min_amplitude: config.min_amplitude,
        }
    }

    /// A pair is a peak if its extrema are close enough and its amplitude is not negligible,
    /// or if its amplitude is large.
    fn accepts(&self, pair: &ExtremaPair) -> bool {
        ((self.min_dist..=self.max_dist).contains(&pair.dt) && pair.da >= self.micro_amplitude)
            || pair.da >= self.min_amplitude
    }
}

/// The peaks found in every slice of every test.
/// Times are in samples from the beginning of the slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicePeaks {
    /// Peak times, as `[test][slice][peak]`.
    pub times: Vec<Vec<Vec<usize>>>,
    /// Peak amplitudes, as `[test][slice][peak]`.
    pub amplitudes: Vec<Vec<Vec<f64>>>,
}

impl SlicePeaks {
    /// The number of peaks per slice, as `[test][slice]`.
    pub fn counts(&self) -> Vec<Vec<usize>> {
        self.times
            .iter()
            .map(|slices| slices.iter().map(|peaks| peaks.len()).collect())
            .collect()
    }

    /// The total number of peaks.
    pub fn total(&self) -> usize {
        self.times.iter().flatten().map(|peaks| peaks.len()).sum()
    }
}

/// Find all peaks of every test, one test at a time on the concatenation of its slices.
///
/// A peak belongs to the slice of its maximum. Its time is the position of the maximum within the slice
/// and its amplitude is the absolute difference between both extrema.
/// Grouping the peaks by time intervals (`split_by_intervals`) is not supported.
pub fn peaks_per_slice(
    dataset: &SlicedDataset,
    config: &AnalysisConfig,
    split_by_intervals: bool,
) -> Result<SlicePeaks, SpinalError> {
    if split_by_intervals {
        return Err(SpinalError::NotImplemented(
            "Grouping peaks by time intervals".to_string(),
        ));
    }
    let filter = PeakFilter::new(config, dataset.step());
    let (num_tests, num_slices, slice_length) = dataset.shape();

    let mut times = vec![vec![vec![]; num_slices]; num_tests];
    let mut amplitudes = vec![vec![vec![]; num_slices]; num_tests];
    for test_index in 0..num_tests {
        let signal = dataset.test(test_index);
        let maxima = find_extrema(signal, Extremum::Maximum);
        let minima = find_extrema(signal, Extremum::Minimum);

        for pair in pair_extrema(&maxima, &minima)
            .iter()
            .filter(|pair| filter.accepts(pair))
        {
            let slice_index = pair.max_index / slice_length;
            times[test_index][slice_index].push(pair.max_index - slice_index * slice_length);
            amplitudes[test_index][slice_index].push(pair.da);
        }
    }

    let peaks = SlicePeaks { times, amplitudes };
    debug!("Found {} peaks in {} tests", peaks.total(), num_tests);
    Ok(peaks)
}

/// Returns the number of extrema (twice the number of peaks) and the amplitude area after the latency,
/// for every slice of every test, as two `[test][slice]` matrices.
///
/// Each slice is smoothed first. Only the peaks whose extrema both occur at or after the latency are counted.
/// The area is the sum of the absolute smoothed samples from the latency on.
/// Slices without any maximum or minimum keep a zero count and a zero area.
pub fn area_extrema_matrix(
    dataset: &SlicedDataset,
    latencies: &[Vec<usize>],
    config: &AnalysisConfig,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>), SpinalError> {
    let (num_tests, num_slices, _) = dataset.shape();
    if latencies.len() != num_tests || latencies.iter().any(|row| row.len() != num_slices) {
        return Err(SpinalError::InvalidShape(format!(
            "Expected {} x {} latencies, got {} rows of lengths {:?}",
            num_tests,
            num_slices,
            latencies.len(),
            latencies.iter().map(|row| row.len()).unique().collect::<Vec<usize>>()
        )));
    }
    let filter = PeakFilter::new(config, dataset.step());

    let mut peak_matrix = vec![vec![0.0; num_slices]; num_tests];
    let mut area_matrix = vec![vec![0.0; num_slices]; num_tests];
    for (test_index, slice_index) in (0..num_tests).cartesian_product(0..num_slices) {
        let smoothed = smooth(dataset.slice(test_index, slice_index), AREA_SMOOTHING);
        let maxima = find_extrema(&smoothed, Extremum::Maximum);
        let minima = find_extrema(&smoothed, Extremum::Minimum);
        if maxima.is_empty() || minima.is_empty() {
            continue;
        }

        let latency = latencies[test_index][slice_index];
        let num_peaks = pair_extrema(&maxima, &minima)
            .iter()
            .filter(|pair| pair.max_index >= latency && pair.min_index >= latency)
            .filter(|pair| filter.accepts(pair))
            .count();
        peak_matrix[test_index][slice_index] = (2 * num_peaks) as f64;
        area_matrix[test_index][slice_index] = smoothed
            .get(latency..)
            .map_or(0.0, |tail| tail.iter().map(|x| x.abs()).sum());
    }

    Ok((peak_matrix, area_matrix))
}
