//! Partition of traces into slices, i.e., fixed-duration windows aligned to the stimulation period.
use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::config::duration_to_samples;
use crate::error::SpinalError;

/// Returns the number of samples in a slice of the given duration (in ms).
/// Returns an error if the slice would not contain any sample.
pub fn samples_per_slice(slice_duration: f64, step: f64) -> Result<usize, SpinalError> {
    if !(step > 0.0) {
        return Err(SpinalError::InvalidParameter(format!(
            "The sampling step must be positive, got {}",
            step
        )));
    }
    match duration_to_samples(slice_duration, step) {
        0 => Err(SpinalError::InvalidParameter(format!(
            "A slice of {} ms is shorter than one step of {} ms",
            slice_duration, step
        ))),
        n => Ok(n),
    }
}

/// Returns the slice duration (in ms, truncated) corresponding to a stimulation frequency (in Hz).
pub fn slice_duration_from_frequency(ees_hz: f64) -> Result<f64, SpinalError> {
    if !(ees_hz > 0.0) {
        return Err(SpinalError::InvalidParameter(format!(
            "The stimulation frequency must be positive, got {}",
            ees_hz
        )));
    }
    Ok((1000.0 / ees_hz).floor())
}

/// Split a trace into consecutive slices of `slice_length` samples.
/// The remaining samples, if any, are discarded.
pub fn split_by_slices(data: &[f64], slice_length: usize) -> Result<Vec<&[f64]>, SpinalError> {
    if slice_length == 0 {
        return Err(SpinalError::InvalidParameter(
            "The slice length must be positive".to_string(),
        ));
    }
    Ok(data.chunks_exact(slice_length).collect())
}

/// A rectangular collection of sliced traces, addressed as `[test][slice][sample]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlicedDataset {
    /// The names of the tests.
    names: Vec<String>,
    /// The samples, stored test by test, slice by slice.
    data: Vec<f64>,
    num_slices: usize,
    slice_length: usize,
    /// The sampling step (in ms).
    step: f64,
}

impl SlicedDataset {
    /// Create a dataset from nested arrays `[test][slice][sample]`.
    /// Returns an error if the arrays are empty or not rectangular.
    pub fn new(slices: Vec<Vec<Vec<f64>>>, step: f64) -> Result<Self, SpinalError> {
        let names = (0..slices.len()).map(|i| i.to_string()).collect();
        Self::with_names(names, slices, step)
    }

    /// Create a dataset from nested arrays `[test][slice][sample]`, with one name per test.
    /// Returns an error if the arrays are empty or not rectangular.
    pub fn with_names(
        names: Vec<String>,
        slices: Vec<Vec<Vec<f64>>>,
        step: f64,
    ) -> Result<Self, SpinalError> {
        if !(step > 0.0) {
            return Err(SpinalError::InvalidParameter(format!(
                "The sampling step must be positive, got {}",
                step
            )));
        }
        if names.len() != slices.len() {
            return Err(SpinalError::InvalidShape(format!(
                "{} names provided for {} tests",
                names.len(),
                slices.len()
            )));
        }
        let first_test = slices
            .first()
            .ok_or_else(|| SpinalError::EmptyInput("The dataset has no test".to_string()))?;
        let num_slices = first_test.len();
        let slice_length = first_test
            .first()
            .ok_or_else(|| SpinalError::EmptyInput("The dataset has no slice".to_string()))?
            .len();
        if slice_length == 0 {
            return Err(SpinalError::EmptyInput(
                "The slices of the dataset are empty".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(slices.len() * num_slices * slice_length);
        for (test_index, test_slices) in slices.into_iter().enumerate() {
            if test_slices.len() != num_slices {
                return Err(SpinalError::InvalidShape(format!(
                    "Test {} has {} slices instead of {}",
                    test_index,
                    test_slices.len(),
                    num_slices
                )));
            }
            for (slice_index, slice) in test_slices.into_iter().enumerate() {
                if slice.len() != slice_length {
                    return Err(SpinalError::InvalidShape(format!(
                        "Slice {} of test {} has {} samples instead of {}",
                        slice_index,
                        test_index,
                        slice.len(),
                        slice_length
                    )));
                }
                data.extend(slice);
            }
        }

        Ok(SlicedDataset {
            names,
            data,
            num_slices,
            slice_length,
            step,
        })
    }

    /// Slice the traces (test name -> samples) into windows of `slice_duration` ms.
    /// Samples are assigned to the slice `sample_index / samples_per_slice`; the incomplete trailing slice is dropped.
    /// Returns an error if there is no trace, if the traces have different lengths, or if they are shorter than one slice.
    pub fn from_traces(
        traces: &BTreeMap<String, Vec<f64>>,
        slice_duration: f64,
        step: f64,
    ) -> Result<Self, SpinalError> {
        let names = traces.keys().cloned().collect::<Vec<String>>();
        let samples = traces.values().map(|v| v.as_slice()).collect::<Vec<&[f64]>>();
        Self::from_named_samples(names, &samples, slice_duration, step)
    }

    /// Same as [`SlicedDataset::from_traces`] with the names and samples given separately.
    pub fn from_named_samples(
        names: Vec<String>,
        samples: &[&[f64]],
        slice_duration: f64,
        step: f64,
    ) -> Result<Self, SpinalError> {
        let first = samples
            .first()
            .ok_or_else(|| SpinalError::EmptyInput("No trace to slice".to_string()))?;
        if let Some((name, trace)) = names
            .iter()
            .zip(samples.iter())
            .find(|(_, trace)| trace.len() != first.len())
        {
            return Err(SpinalError::IncompatibleTraces(format!(
                "Trace {} has {} samples while the first one has {}",
                name,
                trace.len(),
                first.len()
            )));
        }

        let slice_length = samples_per_slice(slice_duration, step)?;
        let num_slices = first.len() / slice_length;
        if num_slices == 0 {
            return Err(SpinalError::EmptyInput(format!(
                "Traces of {} samples are shorter than one slice of {} samples",
                first.len(),
                slice_length
            )));
        }
        debug!(
            "Slicing {} traces into {} slices of {} samples ({} trailing samples dropped)",
            samples.len(),
            num_slices,
            slice_length,
            first.len() - num_slices * slice_length
        );

        let mut data = Vec::with_capacity(samples.len() * num_slices * slice_length);
        for trace in samples.iter() {
            data.extend_from_slice(&trace[..num_slices * slice_length]);
        }

        Ok(SlicedDataset {
            names,
            data,
            num_slices,
            slice_length,
            step,
        })
    }

    /// Returns the shape `(num_tests, num_slices, slice_length)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.num_tests(), self.num_slices, self.slice_length)
    }

    /// The number of tests.
    pub fn num_tests(&self) -> usize {
        self.names.len()
    }

    /// The number of slices per test.
    pub fn num_slices(&self) -> usize {
        self.num_slices
    }

    /// The number of samples per slice.
    pub fn slice_length(&self) -> usize {
        self.slice_length
    }

    /// The sampling step (in ms).
    pub fn step(&self) -> f64 {
        self.step
    }

    /// The names of the tests.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the samples of one slice of one test.
    pub fn slice(&self, test_index: usize, slice_index: usize) -> &[f64] {
        let start = (test_index * self.num_slices + slice_index) * self.slice_length;
        &self.data[start..start + self.slice_length]
    }

    /// Returns all slices of one test, concatenated.
    pub fn test(&self, test_index: usize) -> &[f64] {
        let length = self.num_slices * self.slice_length;
        &self.data[test_index * length..(test_index + 1) * length]
    }

    /// Returns an iterator over the slices of one test.
    pub fn slices_iter(&self, test_index: usize) -> impl Iterator<Item = &[f64]> + '_ {
        self.test(test_index).chunks_exact(self.slice_length)
    }

    /// Returns the dots observed at the given offset of a slice, one per test.
    pub fn dots_at(&self, slice_index: usize, offset: usize) -> Vec<f64> {
        (0..self.num_tests())
            .map(|test_index| self.slice(test_index, slice_index)[offset])
            .collect()
    }

    /// Restructure the data slice by slice, i.e., as `[slice][test][sample]`.
    pub fn restructure(&self) -> Vec<Vec<&[f64]>> {
        (0..self.num_slices)
            .map(|slice_index| {
                (0..self.num_tests())
                    .map(|test_index| self.slice(test_index, slice_index))
                    .collect()
            })
            .collect()
    }
}
