//! This crate provides tools for analyzing the voltage traces produced by simulations of spinal-cord motor circuits.
//!
//! The traces are recorded by external simulators, one trace per test (trial), and analyzed slice by slice,
//! where a slice is the time window between two consecutive epidural stimulations.
//!
//! # Slicing Traces
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use rusty_spinal::slicer::SlicedDataset;
//!
//! // Two tests of 100 samples recorded every 0.25 ms, i.e., 25 ms
//! let mut traces = BTreeMap::new();
//! traces.insert("0".to_string(), (0..100).map(|i| i as f64).collect::<Vec<f64>>());
//! traces.insert("1".to_string(), (0..100).map(|i| -(i as f64)).collect::<Vec<f64>>());
//!
//! // Slices of 5 ms, i.e., 20 samples
//! let dataset = SlicedDataset::from_traces(&traces, 5.0, 0.25).unwrap();
//! assert_eq!(dataset.shape(), (2, 5, 20));
//! ```
//!
//! # Boxplot Summaries
//!
//! ```rust
//! use rusty_spinal::stats::boxplot::BoxplotSummary;
//! use rusty_spinal::stats::percentile::Interpolation;
//!
//! let dots = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 100.0];
//! let summary = BoxplotSummary::compute(&dots, 1.5, Interpolation::Lower).unwrap();
//!
//! assert_eq!(summary.q1, 3.0);
//! assert_eq!(summary.median, 6.0);
//! assert_eq!(summary.q3, 8.0);
//! assert_eq!(summary.whisker_high, 10.0);
//! assert_eq!(summary.flier_high, 100.0);
//! ```
//!
//! # Comparing Conditions
//!
//! ```rust
//! use rusty_spinal::comparator::Comparator;
//! use nalgebra::Point3;
//!
//! let cloud: Vec<Point3<f64>> = (0..27)
//!     .map(|i| Point3::new((i % 3) as f64, ((i / 3) % 3) as f64, (i / 9) as f64))
//!     .collect();
//!
//! // Identical clouds overlap almost entirely, up to the sampling of the ellipsoid surfaces
//! let comparator = Comparator::new(24);
//! let comparison = comparator.compare(&cloud, &cloud).unwrap();
//! assert!(comparison.similarity > 0.9);
//! assert!(comparison.similarity <= 1.0);
//! ```

pub mod aggregate;
pub mod bio;
pub mod comparator;
pub mod config;
pub mod error;
pub mod slicer;
pub mod stats;
pub mod trace;

/// The default slice duration (in ms), i.e., the period of a 40 Hz stimulation.
pub const DEFAULT_SLICE_DURATION: f64 = 25.0;
/// The default frequency (in Hz) of the epidural stimulation.
pub const DEFAULT_EES_HZ: f64 = 40.0;
/// The duration (in ms) of the mono-synaptic response at the beginning of each slice, ignored by the latency search.
pub const MONO_RESPONSE_BORDER: f64 = 10.0;
/// Gradient magnitudes below this value are considered as noise.
pub const MICRO_GRADIENT: f64 = 0.005;
/// The minimum time (in ms) between the two extrema of a peak.
pub const PEAK_MIN_DIST: f64 = 0.7;
/// The maximum time (in ms) between the two extrema of a peak.
pub const PEAK_MAX_DIST: f64 = 4.0;
/// The minimum amplitude of a peak whose extrema are within the distance bounds.
pub const MICRO_AMPLITUDE: f64 = 0.05;
/// The amplitude above which a pair of extrema is always a peak.
pub const MIN_AMPLITUDE: f64 = 0.3;
/// The boxplot fence factor applied to the interquartile range.
pub const WHISKER_FACTOR: f64 = 1.5;
/// The number of workers computing the boxplot shadows.
pub const BOXPLOT_WORKERS: usize = 3;
/// The number of standard deviations spanned by each semi-axis of a PCA ellipsoid.
pub const AXIS_SCALE: f64 = 3.0;
/// The number of angular samples (per angle) of an ellipsoid surface.
pub const SURFACE_RESOLUTION: usize = 200;
