//! Biological recordings, i.e., muscle activity recorded together with the stimulation channel.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::error::SpinalError;

/// The default threshold below which a minimum of the stimulation channel is a stimulus.
pub const STIMULUS_CRITERIA: f64 = -0.5;
/// The number of header lines of a recording file.
const HEADER_LINES: usize = 6;
/// The column of the muscle signal.
const MUSCLE_COLUMN: usize = 2;
/// The column of the stimulation channel.
const STIMULATION_COLUMN: usize = 7;

/// Returns the indices of the local minima of the data lower than `matching_criteria`.
/// A sample `i` is a local minimum if `data[i - 1] > data[i] <= data[i + 1]`; the borders never qualify.
pub fn find_mins(data: &[f64], matching_criteria: f64) -> Vec<usize> {
    data.windows(3)
        .enumerate()
        .filter(|(_, w)| w[0] > w[1] && w[1] <= w[2] && w[1] < matching_criteria)
        .map(|(i, _)| i + 1)
        .collect()
}

/// A muscle recording cropped between the first and the last stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct BioRecording {
    /// The muscle signal, from the first stimulus (included) to the last one (excluded).
    pub data: Vec<f64>,
    /// The stimulus indices, relative to the first one.
    pub stimuli: Vec<usize>,
}

impl BioRecording {
    /// Crop the muscle signal around the stimuli detected on the stimulation channel.
    /// Returns an error if the channels have different lengths or if less than two stimuli are found.
    pub fn from_channels(
        muscle: &[f64],
        stimulation: &[f64],
        matching_criteria: f64,
    ) -> Result<BioRecording, SpinalError> {
        if muscle.len() != stimulation.len() {
            return Err(SpinalError::IncompatibleTraces(format!(
                "The muscle channel has {} samples and the stimulation channel {}",
                muscle.len(),
                stimulation.len()
            )));
        }
        let indices = find_mins(stimulation, matching_criteria);
        match (indices.first(), indices.last()) {
            (Some(&first), Some(&last)) if first < last => {
                debug!("Found {} stimuli between samples {} and {}", indices.len(), first, last);
                Ok(BioRecording {
                    data: muscle[first..last].to_vec(),
                    stimuli: indices.iter().map(|i| i - first).collect(),
                })
            }
            _ => Err(SpinalError::EmptyInput(format!(
                "Found {} stimuli below {}, at least two are required",
                indices.len(),
                matching_criteria
            ))),
        }
    }

    /// The muscle signal between consecutive stimuli.
    pub fn slices(&self) -> Vec<&[f64]> {
        self.stimuli
            .windows(2)
            .map(|w| &self.data[w[0]..w[1]])
            .collect()
    }
}

/// Parse a cell of a recording, `NaN` cells counting as zero.
fn parse_cell(cell: Option<&str>, line_index: usize) -> Result<f64, SpinalError> {
    let cell = cell.map(str::trim).ok_or_else(|| {
        SpinalError::InvalidShape(format!("Line {} has too few columns", line_index))
    })?;
    let value = cell.parse::<f64>().map_err(|e| {
        SpinalError::IOError(format!("Invalid cell {:?} at line {}: {}", cell, line_index, e))
    })?;
    Ok(if value.is_nan() { 0.0 } else { value })
}

/// Read a tab-separated recording: the header is skipped, then column 2 holds the muscle signal
/// and column 7 the stimulation channel.
pub fn read_bio_data<P: AsRef<Path>>(
    path: P,
    matching_criteria: f64,
) -> Result<BioRecording, SpinalError> {
    let reader = BufReader::new(File::open(path)?);
    let mut muscle = vec![];
    let mut stimulation = vec![];
    for (line_index, line) in reader.lines().enumerate().skip(HEADER_LINES) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        muscle.push(parse_cell(cells.get(MUSCLE_COLUMN).copied(), line_index)?);
        stimulation.push(parse_cell(cells.get(STIMULATION_COLUMN).copied(), line_index)?);
    }
    BioRecording::from_channels(&muscle, &stimulation, matching_criteria)
}
