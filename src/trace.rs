//! Named collections of voltage traces, one trace per test, sharing a sampling step.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use crate::error::SpinalError;
use crate::slicer::SlicedDataset;

/// The traces of every test of one dataset (e.g., one muscle in one condition).
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStore {
    name: String,
    /// The sampling step (in ms).
    step: f64,
    /// The traces, by test name.
    traces: BTreeMap<String, Vec<f64>>,
}

/// Returns true if the trace contains a NaN sample.
fn has_nan(trace: &[f64]) -> bool {
    trace.iter().any(|x| x.is_nan())
}

impl TraceStore {
    /// Create a store from traces indexed by test name.
    /// Returns an error if the step is not positive.
    pub fn new(
        name: impl Into<String>,
        step: f64,
        traces: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, SpinalError> {
        if !(step > 0.0) {
            return Err(SpinalError::InvalidParameter(format!(
                "The sampling step must be positive, got {}",
                step
            )));
        }
        Ok(TraceStore {
            name: name.into(),
            step,
            traces,
        })
    }

    /// Load a store from a JSON file mapping each test name to its samples.
    /// Traces with NaN samples are skipped.
    /// Returns an error if the file cannot be read or parsed, or if no trace remains.
    pub fn load_from<P: AsRef<Path>>(
        path: P,
        name: impl Into<String>,
        step: f64,
    ) -> Result<Self, SpinalError> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let raw: BTreeMap<String, Vec<Option<f64>>> = serde_json::from_reader(reader)?;

        // serde_json writes NaN as null
        let mut traces = BTreeMap::new();
        for (test_name, samples) in raw {
            let trace: Vec<f64> = samples.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect();
            if has_nan(&trace) {
                info!("Test {} has NaN... skip", test_name);
                continue;
            }
            traces.insert(test_name, trace);
        }
        if traces.is_empty() {
            return Err(SpinalError::EmptyInput(format!(
                "No valid trace in {}",
                path.as_ref().display()
            )));
        }
        debug!("Loaded {} traces from {}", traces.len(), path.as_ref().display());
        TraceStore::new(name, step, traces)
    }

    /// Save the store to a JSON file mapping each test name to its samples.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SpinalError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.traces)?;
        writer.flush()?;
        Ok(())
    }

    /// Read the simulator dumps of a folder, i.e., every file whose name ends with `{muscle}.dat`.
    /// Each file holds one test as a line of whitespace-separated samples, stored with the opposite sign.
    /// Tests are named by their position in the (sorted) file list; tests with NaN samples are skipped.
    pub fn from_dat_folder<P: AsRef<Path>>(
        folder: P,
        muscle: &str,
        step: f64,
    ) -> Result<Self, SpinalError> {
        let suffix = format!("{}.dat", muscle);
        let mut paths = fs::read_dir(folder.as_ref())?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| name.ends_with(&suffix))
            })
            .collect::<Vec<_>>();
        paths.sort();

        let mut traces = BTreeMap::new();
        for (test_index, path) in paths.iter().enumerate() {
            info!("Process test #{}", test_index);
            let mut line = String::new();
            BufReader::new(File::open(path)?).read_line(&mut line)?;
            let trace = line
                .split_whitespace()
                .map(|x| x.parse::<f64>().map(|v| -v))
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| {
                    SpinalError::IOError(format!("Invalid sample in {}: {}", path.display(), e))
                })?;
            if has_nan(&trace) {
                info!("{} has NaN... skip", path.display());
                continue;
            }
            traces.insert(test_index.to_string(), trace);
        }
        if traces.is_empty() {
            return Err(SpinalError::EmptyInput(format!(
                "No valid {} file in {}",
                suffix,
                folder.as_ref().display()
            )));
        }
        TraceStore::new(muscle, step, traces)
    }

    /// The name of the dataset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sampling step (in ms).
    pub fn step(&self) -> f64 {
        self.step
    }

    /// The traces, by test name.
    pub fn traces(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.traces
    }

    /// The number of tests.
    pub fn num_tests(&self) -> usize {
        self.traces.len()
    }

    /// Returns the common number of samples of the traces.
    /// Returns an error if there is no trace or if the traces have different lengths.
    pub fn samples_per_test(&self) -> Result<usize, SpinalError> {
        let mut lengths = self.traces.iter().map(|(name, trace)| (name, trace.len()));
        let (first_name, first_len) = lengths
            .next()
            .ok_or_else(|| SpinalError::EmptyInput(format!("Dataset {} has no trace", self.name)))?;
        match lengths.find(|(_, len)| *len != first_len) {
            Some((name, len)) => Err(SpinalError::IncompatibleTraces(format!(
                "Trace {} has {} samples while trace {} has {}",
                name, len, first_name, first_len
            ))),
            None => Ok(first_len),
        }
    }

    /// Transform every trace to the extracellular form, i.e., negated and shifted to start at zero.
    pub fn to_extracellular(&self) -> TraceStore {
        let traces = self
            .traces
            .iter()
            .map(|(name, trace)| {
                let first = trace.first().map_or(0.0, |v| -v);
                (name.clone(), trace.iter().map(|v| -v - first).collect())
            })
            .collect();
        TraceStore {
            name: self.name.clone(),
            step: self.step,
            traces,
        }
    }

    /// Downsample every trace by averaging consecutive blocks of `chunk` samples.
    /// The last block may be shorter. The step is scaled accordingly.
    pub fn slim(&self, chunk: usize) -> Result<TraceStore, SpinalError> {
        if chunk == 0 {
            return Err(SpinalError::InvalidParameter(
                "The chunk size must be positive".to_string(),
            ));
        }
        let traces = self
            .traces
            .iter()
            .map(|(name, trace)| {
                let slimmed = trace
                    .chunks(chunk)
                    .map(|block| block.iter().sum::<f64>() / block.len() as f64)
                    .collect();
                (name.clone(), slimmed)
            })
            .collect();
        debug!("Slimmed {} by a factor {}", self.name, chunk);
        Ok(TraceStore {
            name: self.name.clone(),
            step: self.step * chunk as f64,
            traces,
        })
    }

    /// Slice every trace into windows of `slice_duration` ms.
    pub fn sliced(&self, slice_duration: f64) -> Result<SlicedDataset, SpinalError> {
        SlicedDataset::from_traces(&self.traces, slice_duration, self.step)
    }
}
