//! Analysis configuration.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SpinalError;
use crate::stats::percentile::Interpolation;
use crate::{
    BOXPLOT_WORKERS, DEFAULT_EES_HZ, DEFAULT_SLICE_DURATION, MICRO_AMPLITUDE, MICRO_GRADIENT, MIN_AMPLITUDE,
    MONO_RESPONSE_BORDER, PEAK_MAX_DIST, PEAK_MIN_DIST, SURFACE_RESOLUTION, WHISKER_FACTOR,
};

/// The parameters of the analysis pipeline.
/// All durations are in ms.
///
/// Missing fields in a configuration file take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// The sampling step of the traces.
    pub step: f64,
    /// The duration of a slice.
    pub slice_duration: f64,
    /// The frequency (in Hz) of the epidural stimulation, which sets the slices of the boxplot shadows.
    pub ees_hz: f64,
    /// The duration of the mono-synaptic response excluded from the latency search.
    pub mono_border: f64,
    /// Gradient magnitudes below this value never mark a latency.
    pub micro_gradient: f64,
    /// The minimum time between the two extrema of a peak.
    pub peak_min_dist: f64,
    /// The maximum time between the two extrema of a peak.
    pub peak_max_dist: f64,
    /// The minimum amplitude of a peak whose extrema are within the distance bounds.
    pub micro_amplitude: f64,
    /// The amplitude above which a pair of extrema is always a peak.
    pub min_amplitude: f64,
    /// The boxplot fence factor.
    pub whisker_factor: f64,
    /// The percentile interpolation method.
    pub interpolation: Interpolation,
    /// Vertical offset between two consecutive slices of an envelope shadow.
    pub envelope_offset: f64,
    /// Vertical offset between two consecutive slices of a boxplot shadow.
    pub boxplot_offset: f64,
    /// Normalize each test slice (zero-relative) before computing envelopes.
    pub normalize: bool,
    /// The number of workers computing the boxplot shadows.
    pub num_workers: usize,
    /// The number of angular samples of the ellipsoid surfaces.
    pub surface_resolution: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            step: 0.025,
            slice_duration: DEFAULT_SLICE_DURATION,
            ees_hz: DEFAULT_EES_HZ,
            mono_border: MONO_RESPONSE_BORDER,
            micro_gradient: MICRO_GRADIENT,
            peak_min_dist: PEAK_MIN_DIST,
            peak_max_dist: PEAK_MAX_DIST,
            micro_amplitude: MICRO_AMPLITUDE,
            min_amplitude: MIN_AMPLITUDE,
            whisker_factor: WHISKER_FACTOR,
            interpolation: Interpolation::Linear,
            envelope_offset: 0.5,
            boxplot_offset: 6.0,
            normalize: false,
            num_workers: BOXPLOT_WORKERS,
            surface_resolution: SURFACE_RESOLUTION,
        }
    }
}

impl AnalysisConfig {
    /// Returns the default configuration with the given sampling step.
    pub fn with_step(step: f64) -> Self {
        AnalysisConfig {
            step,
            ..Default::default()
        }
    }

    /// Check the consistency of the parameters.
    pub fn validate(&self) -> Result<(), SpinalError> {
        if !(self.step > 0.0) {
            return Err(SpinalError::InvalidParameter(format!(
                "The sampling step must be positive, got {}",
                self.step
            )));
        }
        if self.slice_duration < self.step {
            return Err(SpinalError::InvalidParameter(format!(
                "The slice duration ({}) must be at least one step ({})",
                self.slice_duration, self.step
            )));
        }
        if !(self.ees_hz > 0.0) {
            return Err(SpinalError::InvalidParameter(format!(
                "The stimulation frequency must be positive, got {}",
                self.ees_hz
            )));
        }
        if self.peak_min_dist > self.peak_max_dist {
            return Err(SpinalError::InvalidParameter(format!(
                "The minimum peak distance ({}) exceeds the maximum one ({})",
                self.peak_min_dist, self.peak_max_dist
            )));
        }
        if self.whisker_factor < 0.0 {
            return Err(SpinalError::InvalidParameter(
                "The whisker factor must be non-negative".to_string(),
            ));
        }
        if self.num_workers == 0 {
            return Err(SpinalError::InvalidParameter(
                "At least one worker is required".to_string(),
            ));
        }
        if self.surface_resolution < 2 {
            return Err(SpinalError::InvalidParameter(
                "The surface resolution must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Save the configuration to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SpinalError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a configuration from a JSON file and check it.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<AnalysisConfig, SpinalError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: AnalysisConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

/// Convert a duration to a number of samples, truncating partial samples.
/// The ratio is truncated as is, e.g., 0.7 ms at 0.1 ms per sample gives 6 samples (0.7 / 0.1 = 6.999999999999999).
pub fn duration_to_samples(duration: f64, step: f64) -> usize {
    (duration / step).floor().max(0.0) as usize
}
