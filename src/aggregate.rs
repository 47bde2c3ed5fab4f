//! Aggregation of the slices of all tests: envelope and boxplot shadows, and feature clouds.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::SpinalError;
use crate::slicer::SlicedDataset;
use crate::stats::boxplot::BoxplotSummary;
use crate::stats::latency::latency_matrix;
use crate::stats::peaks::area_extrema_matrix;
use crate::stats::signal::normalization;

/// Write any serializable artifact to `{folder}/{basename}.json` and returns the path of the file.
pub fn write_json<T: Serialize, P: AsRef<Path>>(
    artifact: &T,
    folder: P,
    basename: &str,
) -> Result<PathBuf, SpinalError> {
    fs::create_dir_all(folder.as_ref())?;
    let path = folder.as_ref().join(format!("{}.json", basename));
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, artifact)?;
    writer.flush()?;
    info!("Saved file at {}", path.display());
    Ok(path)
}

/// The min/max/mean envelope of one slice across all tests, shifted by the slice offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSlice {
    pub slice_index: usize,
    pub offset: f64,
    pub mean: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

/// Compute the envelope of every slice.
///
/// If `config.normalize` is set, every test slice is normalized (zero-relative) first.
/// The bands of slice `i` are shifted by `i * config.envelope_offset`.
pub fn envelope_shadows(
    dataset: &SlicedDataset,
    config: &AnalysisConfig,
) -> Result<Vec<EnvelopeSlice>, SpinalError> {
    let num_tests = dataset.num_tests() as f64;
    dataset
        .restructure()
        .into_iter()
        .enumerate()
        .map(|(slice_index, tests)| {
            let tests = tests
                .into_iter()
                .map(|slice| {
                    if config.normalize {
                        normalization(slice, 0.0, 1.0, true)
                    } else {
                        Ok(slice.to_vec())
                    }
                })
                .collect::<Result<Vec<Vec<f64>>, SpinalError>>()?;

            let offset = slice_index as f64 * config.envelope_offset;
            let mut envelope = EnvelopeSlice {
                slice_index,
                offset,
                mean: Vec::with_capacity(dataset.slice_length()),
                min: Vec::with_capacity(dataset.slice_length()),
                max: Vec::with_capacity(dataset.slice_length()),
            };
            for sample_index in 0..dataset.slice_length() {
                let dots = tests.iter().map(|test| test[sample_index]);
                envelope.mean.push(dots.clone().sum::<f64>() / num_tests + offset);
                envelope.min.push(dots.clone().fold(f64::INFINITY, f64::min) + offset);
                envelope.max.push(dots.fold(f64::NEG_INFINITY, f64::max) + offset);
            }
            Ok(envelope)
        })
        .collect()
}

/// The boxplot summaries of one slice, one per sample offset, shifted by the slice offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxplotSlice {
    pub slice_index: usize,
    pub offset: f64,
    pub summaries: Vec<BoxplotSummary>,
}

impl BoxplotSlice {
    /// Returns one band of the slice, e.g., `band(|s| s.median)`.
    pub fn band<F: Fn(&BoxplotSummary) -> f64>(&self, f: F) -> Vec<f64> {
        self.summaries.iter().map(f).collect()
    }
}

/// Compute the boxplot summaries across tests at every offset of every slice.
///
/// The slices are processed by a dedicated pool of `config.num_workers` threads and returned in order.
/// The summaries of slice `i` are shifted by `i * config.boxplot_offset`.
pub fn boxplot_shadows(
    dataset: &SlicedDataset,
    config: &AnalysisConfig,
) -> Result<Vec<BoxplotSlice>, SpinalError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers)
        .build()
        .map_err(|e| SpinalError::InvalidParameter(format!("Cannot build the worker pool: {}", e)))?;
    info!("Start parallelizing with {} workers", config.num_workers);

    pool.install(|| {
        (0..dataset.num_slices())
            .into_par_iter()
            .map(|slice_index| {
                let offset = slice_index as f64 * config.boxplot_offset;
                let summaries = (0..dataset.slice_length())
                    .map(|sample_index| {
                        let dots = dataset.dots_at(slice_index, sample_index);
                        BoxplotSummary::compute(&dots, config.whisker_factor, config.interpolation)
                            .map(|summary| summary.shifted(offset))
                    })
                    .collect::<Result<Vec<BoxplotSummary>, SpinalError>>()?;
                debug!("Processed slice #{}", slice_index);
                Ok(BoxplotSlice {
                    slice_index,
                    offset,
                    summaries,
                })
            })
            .collect()
    })
}

/// Compute the boxplot shadows of raw traces, sliced according to the stimulation frequency.
/// Returns an error if there is no trace.
pub fn boxplot_shadows_from_traces(
    traces: &[&[f64]],
    config: &AnalysisConfig,
) -> Result<Vec<BoxplotSlice>, SpinalError> {
    if traces.is_empty() {
        return Err(SpinalError::EmptyInput("Empty input data".to_string()));
    }
    let slice_duration = crate::slicer::slice_duration_from_frequency(config.ees_hz)?;
    let names = (0..traces.len()).map(|i| i.to_string()).collect();
    let dataset = SlicedDataset::from_named_samples(names, traces, slice_duration, config.step)?;
    boxplot_shadows(&dataset, config)
}

/// The features of a test (or of one slice of a test).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub test_index: usize,
    pub slice_index: Option<usize>,
    /// The latency (in ms).
    pub latency: f64,
    /// The amplitude area after the latency.
    pub amplitude_area: f64,
    /// The number of extrema after the latency.
    pub peak_count: f64,
}

impl FeatureVector {
    /// The features as a point `(latency, amplitude_area, peak_count)`.
    pub fn point(&self) -> Point3<f64> {
        Point3::new(self.latency, self.amplitude_area, self.peak_count)
    }
}

/// A cloud of feature vectors, e.g., for one experimental condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCloud {
    pub vectors: Vec<FeatureVector>,
}

impl FeatureCloud {
    /// Returns the latency, peak and area matrices of the dataset.
    fn matrices(
        dataset: &SlicedDataset,
        config: &AnalysisConfig,
    ) -> Result<(Vec<Vec<usize>>, Vec<Vec<f64>>, Vec<Vec<f64>>), SpinalError> {
        let latencies = latency_matrix(dataset, config)?;
        let (peaks, areas) = area_extrema_matrix(dataset, &latencies, config)?;
        Ok((latencies, peaks, areas))
    }

    /// One feature vector per slice of every test.
    pub fn per_slice(dataset: &SlicedDataset, config: &AnalysisConfig) -> Result<Self, SpinalError> {
        let (latencies, peaks, areas) = Self::matrices(dataset, config)?;
        let step = dataset.step();
        let vectors = latencies
            .iter()
            .zip(peaks.iter().zip(areas.iter()))
            .enumerate()
            .flat_map(|(test_index, (lat_row, (peak_row, area_row)))| {
                lat_row
                    .iter()
                    .zip(peak_row.iter().zip(area_row.iter()))
                    .enumerate()
                    .map(move |(slice_index, (lat, (peak, area)))| FeatureVector {
                        test_index,
                        slice_index: Some(slice_index),
                        latency: *lat as f64 * step,
                        amplitude_area: *area,
                        peak_count: *peak,
                    })
            })
            .collect();
        Ok(FeatureCloud { vectors })
    }

    /// One feature vector per test: the mean latency, the total amplitude area and the total number of extrema.
    pub fn per_test(dataset: &SlicedDataset, config: &AnalysisConfig) -> Result<Self, SpinalError> {
        let (latencies, peaks, areas) = Self::matrices(dataset, config)?;
        let step = dataset.step();
        let num_slices = dataset.num_slices() as f64;
        let vectors = (0..dataset.num_tests())
            .map(|test_index| FeatureVector {
                test_index,
                slice_index: None,
                latency: latencies[test_index].iter().sum::<usize>() as f64 * step / num_slices,
                amplitude_area: areas[test_index].iter().sum(),
                peak_count: peaks[test_index].iter().sum(),
            })
            .collect();
        Ok(FeatureCloud { vectors })
    }

    /// The features as 3D points.
    pub fn points(&self) -> Vec<Point3<f64>> {
        self.vectors.iter().map(|v| v.point()).collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
