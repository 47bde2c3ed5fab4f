use std::collections::BTreeMap;
use std::fs;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use tempfile::tempdir;

use rusty_spinal::aggregate::{boxplot_shadows, envelope_shadows, write_json, FeatureCloud};
use rusty_spinal::comparator::Comparator;
use rusty_spinal::config::{duration_to_samples, AnalysisConfig};
use rusty_spinal::stats::latency::latency_matrix;
use rusty_spinal::stats::peaks::{area_extrema_matrix, peaks_per_slice};
use rusty_spinal::trace::TraceStore;

const STEP: f64 = 0.25;
const NUM_TESTS: usize = 15;
const NUM_SLICES: usize = 6;
const SLICE_LENGTH: usize = 100;

/// Noisy traces with a damped oscillation starting at a random time in each slice.
fn synthetic_traces(seed: u64, noise: f64, amplitude: f64) -> BTreeMap<String, Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, noise).unwrap();
    let onset = Uniform::new(45, 70);
    (0..NUM_TESTS)
        .map(|test| {
            let mut trace = Vec::with_capacity(NUM_SLICES * SLICE_LENGTH);
            for _ in 0..NUM_SLICES {
                let start = onset.sample(&mut rng);
                for i in 0..SLICE_LENGTH {
                    let burst = if i >= start {
                        let t = (i - start) as f64 * STEP;
                        amplitude * (-t / 4.0).exp() * (t * 2.0).sin()
                    } else {
                        0.0
                    };
                    trace.push(burst + normal.sample(&mut rng));
                }
            }
            (test.to_string(), trace)
        })
        .collect()
}

fn store(seed: u64, noise: f64, amplitude: f64) -> TraceStore {
    TraceStore::new("MN_E", STEP, synthetic_traces(seed, noise, amplitude)).unwrap()
}

#[test]
fn test_statistics_pipeline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("MN_E.json");
    store(1, 0.05, 2.0).save_to(&path).unwrap();

    let config = AnalysisConfig::with_step(STEP);
    let store = TraceStore::load_from(&path, "MN_E", STEP).unwrap();
    assert_eq!(store.samples_per_test().unwrap(), NUM_SLICES * SLICE_LENGTH);

    let dataset = store.sliced(config.slice_duration).unwrap();
    assert_eq!(dataset.shape(), (NUM_TESTS, NUM_SLICES, SLICE_LENGTH));

    let latencies = latency_matrix(&dataset, &config).unwrap();
    let border = duration_to_samples(config.mono_border, STEP);
    for row in latencies.iter() {
        assert_eq!(row.len(), NUM_SLICES);
        assert!(row.iter().all(|&l| l >= border && l < SLICE_LENGTH));
    }

    let (peaks, areas) = area_extrema_matrix(&dataset, &latencies, &config).unwrap();
    assert!(peaks.iter().flatten().all(|&p| p >= 0.0 && p % 2.0 == 0.0));
    assert!(areas.iter().flatten().all(|&a| a >= 0.0));

    let all_peaks = peaks_per_slice(&dataset, &config, false).unwrap();
    assert!(all_peaks.total() > 0);
    for (times, amplitudes) in all_peaks.times.iter().zip(all_peaks.amplitudes.iter()) {
        assert_eq!(times.len(), NUM_SLICES);
        for (slice_times, slice_amplitudes) in times.iter().zip(amplitudes.iter()) {
            assert_eq!(slice_times.len(), slice_amplitudes.len());
            assert!(slice_times.iter().all(|&t| t < SLICE_LENGTH));
        }
    }
}

#[test]
fn test_shadows_pipeline() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig::with_step(STEP);
    let dataset = store(2, 0.1, 1.0).sliced(config.slice_duration).unwrap();

    let shadows = boxplot_shadows(&dataset, &config).unwrap();
    assert_eq!(shadows.len(), NUM_SLICES);
    for (slice_index, slice) in shadows.iter().enumerate() {
        assert_eq!(slice.slice_index, slice_index);
        assert_eq!(slice.summaries.len(), SLICE_LENGTH);
        assert!(slice.summaries.iter().all(|s| s.is_ordered()));
    }

    let envelopes = envelope_shadows(&dataset, &config).unwrap();
    for (envelope, shadow) in envelopes.iter().zip(shadows.iter()) {
        for i in 0..SLICE_LENGTH {
            assert!(envelope.min[i] <= envelope.mean[i] && envelope.mean[i] <= envelope.max[i]);
            // The fliers never exceed the extreme dots
            let shift = shadow.offset - envelope.offset;
            assert!(shadow.summaries[i].flier_high - shift <= envelope.max[i] + 1e-9);
            assert!(shadow.summaries[i].flier_low - shift >= envelope.min[i] - 1e-9);
        }
    }

    let path = write_json(&shadows, dir.path(), "shadow_MN_E").unwrap();
    assert!(fs::metadata(path).unwrap().len() > 0);
}

#[test]
fn test_dat_conversion() {
    let dir = tempdir().unwrap();
    for (name, trace) in synthetic_traces(3, 0.1, 1.0).iter().take(4) {
        let line = trace.iter().map(|v| format!("{}", -v)).collect::<Vec<String>>().join(" ");
        fs::write(dir.path().join(format!("{}_MN_F.dat", name)), line).unwrap();
    }
    let store = TraceStore::from_dat_folder(dir.path(), "MN_F", STEP).unwrap();
    assert_eq!(store.num_tests(), 4);

    // 0.025 ms per sample slimmed by 10 gives 0.25 ms per sample
    let store = TraceStore::new("MN_F", 0.025, store.traces().clone()).unwrap();
    let slimmed = store.slim(10).unwrap();
    assert!((slimmed.step() - STEP).abs() < 1e-12);
    assert_eq!(slimmed.samples_per_test().unwrap(), NUM_SLICES * SLICE_LENGTH / 10);
}

#[test]
fn test_comparison_pipeline() {
    let config = AnalysisConfig::with_step(STEP);
    let quiet = store(4, 0.05, 1.0).sliced(config.slice_duration).unwrap();
    let loud = store(5, 0.5, 3.0).sliced(config.slice_duration).unwrap();

    let quiet_cloud = FeatureCloud::per_slice(&quiet, &config).unwrap();
    let loud_cloud = FeatureCloud::per_slice(&loud, &config).unwrap();
    assert_eq!(quiet_cloud.len(), NUM_TESTS * NUM_SLICES);

    let comparator = Comparator::new(40);
    let same = comparator
        .compare(&quiet_cloud.points(), &quiet_cloud.points())
        .unwrap();
    let different = comparator
        .compare(&quiet_cloud.points(), &loud_cloud.points())
        .unwrap();
    assert!(same.similarity > 0.9);
    assert!(different.similarity >= 0.0);
    assert!(different.similarity < same.similarity);
}
