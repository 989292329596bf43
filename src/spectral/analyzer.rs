// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Phase and harmonic analysis of a stored batch
//!
//! The pipeline runs in this order:
//!
//! 1. Missing samples are replaced by zero
//! 2. Both channels are resampled onto a uniform grid
//! 3. A Butterworth high-pass is applied forward and backward
//! 4. Both channels are transformed with an FFT
//! 5. The phase difference is read at the bin nearest the fundamental
//! 6. Current amplitudes are collected on a fixed frequency grid
//!
//! The result is a value; publishing it to the latest-result cache is left
//! to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fft::{FFTAnalyzer, SpectralAnalyzer, SpectrumData};
use super::phase::{phase_difference_deg, LoadType};
use crate::config::AnalysisConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::preprocessing::{resample_uniform, ButterHighpassFilter, Filter};
use crate::storage::Batch;

/// Current amplitude at one point of the harmonic grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicBin {
    pub frequency: f64,
    pub amplitude: f64,
}

/// Output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FftResult {
    /// Batch the analysis was computed from
    pub batch_id: u64,
    /// Harmonic slice of the current spectrum
    pub spectrum: Vec<HarmonicBin>,
    /// Voltage angle minus current angle at the fundamental, in (-90, 90]
    pub phase_diff_deg: f64,
    /// Frequency of the bin used as fundamental
    pub fundamental_bin_hz: f64,
    /// Sample rate of the resampled signal
    pub sample_rate_hz: f64,
    pub computed_at: DateTime<Utc>,
}

impl FftResult {
    pub fn load_type(&self, threshold_deg: f64) -> LoadType {
        LoadType::classify(self.phase_diff_deg, threshold_deg)
    }
}

/// Run the full phase/harmonic pipeline on a batch.
///
/// # Errors
///
/// * [`PipelineError::InsufficientData`] if the batch is too short to resample,
///   to filter, or to resolve the fundamental within tolerance
/// * [`PipelineError::Configuration`] if the filter cannot be designed for the
///   batch sample rate
/// * [`PipelineError::Data`] if the sample timestamps are degenerate
pub fn analyze(batch: &Batch, config: &AnalysisConfig) -> PipelineResult<FftResult> {
    let samples = &batch.samples;
    if samples.len() < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "batch {} has {} samples, at least 2 are needed",
            batch.batch_id,
            samples.len()
        )));
    }

    let t0 = samples[0].timestamp;
    let time = samples
        .iter()
        .map(|s| {
            (s.timestamp - t0)
                .num_nanoseconds()
                .map(|ns| ns as f64 * 1e-9)
                .ok_or_else(|| PipelineError::Data("batch spans too long an interval".into()))
        })
        .collect::<PipelineResult<Vec<f64>>>()?;
    let voltage: Vec<f64> = samples.iter().map(|s| s.voltage.unwrap_or(0.0)).collect();
    let current: Vec<f64> = samples.iter().map(|s| s.current.unwrap_or(0.0)).collect();

    let uniform = resample_uniform(&time, &voltage, &current)?;
    let fs = uniform.sample_rate;

    let filter = ButterHighpassFilter::new(config.cutoff_hz, fs, config.filter_order)?;
    let v_filtered = filter.apply(&uniform.voltage)?;
    let i_filtered = filter.apply(&uniform.current)?;

    let mut fft = FFTAnalyzer::new();
    let v_spectrum = fft.analyze(&v_filtered, fs)?;
    let i_spectrum = fft.analyze(&i_filtered, fs)?;

    let idx = fundamental_bin(&v_spectrum, config)?;
    let phase_diff_deg = phase_difference_deg(v_spectrum.phase(idx), i_spectrum.phase(idx));

    // Display scaling only, applied after the phase has been extracted
    let scale = if config.normalize_current {
        normalization_factor(&v_filtered, &i_filtered)
    } else {
        1.0
    };

    Ok(FftResult {
        batch_id: batch.batch_id,
        spectrum: harmonic_slice(&i_spectrum, config, scale),
        phase_diff_deg,
        fundamental_bin_hz: v_spectrum.frequencies[idx],
        sample_rate_hz: fs,
        computed_at: Utc::now(),
    })
}

fn fundamental_bin(spectrum: &SpectrumData, config: &AnalysisConfig) -> PipelineResult<usize> {
    let idx = spectrum
        .nearest_bin(config.fundamental_hz)
        .ok_or_else(|| PipelineError::InsufficientData("empty spectrum".into()))?;
    let distance = (spectrum.frequencies[idx] - config.fundamental_hz).abs();
    if distance > config.fundamental_tolerance_hz {
        return Err(PipelineError::InsufficientData(format!(
            "nearest bin {:.3} Hz is {:.3} Hz away from the {} Hz fundamental (resolution {:.3} Hz)",
            spectrum.frequencies[idx],
            distance,
            config.fundamental_hz,
            spectrum.resolution()
        )));
    }
    Ok(idx)
}

/// Positive bins above `harmonic_min_hz` lying on the `harmonic_step_hz` grid.
///
/// Frequencies are reported as the exact grid value.
fn harmonic_slice(spectrum: &SpectrumData, config: &AnalysisConfig, scale: f64) -> Vec<HarmonicBin> {
    let step = config.harmonic_step_hz;
    spectrum
        .frequencies
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > config.harmonic_min_hz)
        .filter_map(|(k, &f)| {
            let grid = (f / step).round() * step;
            ((f - grid).abs() <= config.harmonic_grid_tolerance_hz && grid > config.harmonic_min_hz)
                .then(|| HarmonicBin {
                    frequency: grid,
                    amplitude: spectrum.amplitude(k) * scale,
                })
        })
        .collect()
}

fn normalization_factor(voltage: &[f64], current: &[f64]) -> f64 {
    let peak = |xs: &[f64]| xs.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let current_peak = peak(current);
    if current_peak > 0.0 {
        peak(voltage) / current_peak
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Sample;
    use chrono::Duration;
    use std::f64::consts::PI;

    fn batch(n: usize, fs: f64, phase_deg: f64) -> Batch {
        let start = Utc::now();
        let phi = phase_deg.to_radians();
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                Sample {
                    timestamp: start + Duration::nanoseconds((t * 1e9).round() as i64),
                    voltage: Some(311.0 * (2.0 * PI * 60.0 * t).sin()),
                    current: Some(2.0 * (2.0 * PI * 60.0 * t - phi).sin()),
                }
            })
            .collect();
        Batch {
            batch_id: 7,
            samples,
        }
    }

    #[test]
    fn test_recovers_lagging_phase() {
        let result = analyze(&batch(500, 500.0, 30.0), &AnalysisConfig::default()).unwrap();
        assert_eq!(result.batch_id, 7);
        assert!((result.phase_diff_deg - 30.0).abs() < 2.0, "{}", result.phase_diff_deg);
        assert_eq!(result.load_type(20.0), LoadType::Inductive);
        assert!((result.sample_rate_hz - 500.0).abs() < 1e-6);
        assert!((result.fundamental_bin_hz - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_harmonic_grid() {
        let result = analyze(&batch(500, 500.0, 0.0), &AnalysisConfig::default()).unwrap();
        assert_eq!(result.spectrum.len(), 39);
        for bin in &result.spectrum {
            assert!(bin.frequency > 50.0);
            assert_eq!(bin.frequency % 5.0, 0.0);
            assert!(bin.amplitude >= 0.0);
        }
        let peak = result
            .spectrum
            .iter()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
            .unwrap();
        assert_eq!(peak.frequency, 60.0);
    }

    #[test]
    fn test_normalization_keeps_phase() {
        let config = AnalysisConfig {
            normalize_current: true,
            ..Default::default()
        };
        let plain = analyze(&batch(500, 500.0, -45.0), &AnalysisConfig::default()).unwrap();
        let scaled = analyze(&batch(500, 500.0, -45.0), &config).unwrap();
        assert_eq!(plain.phase_diff_deg, scaled.phase_diff_deg);
        let ratio = scaled.spectrum[1].amplitude / plain.spectrum[1].amplitude;
        assert!((ratio - 311.0 / 2.0).abs() / (311.0 / 2.0) < 0.05, "{}", ratio);
    }

    #[test]
    fn test_too_short_batch() {
        for n in [0, 1, 10] {
            let result = analyze(&batch(n, 500.0, 0.0), &AnalysisConfig::default());
            assert!(
                matches!(result, Err(PipelineError::InsufficientData(_))),
                "n = {}: {:?}",
                n,
                result
            );
        }
    }

    #[test]
    fn test_coarse_grid_rejected() {
        // 20 samples at 500 Hz give a 25 Hz resolution: 50 and 75 Hz bins only
        let result = analyze(&batch(20, 500.0, 0.0), &AnalysisConfig::default());
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }

    #[test]
    fn test_cutoff_above_nyquist() {
        let config = AnalysisConfig {
            cutoff_hz: 300.0,
            ..Default::default()
        };
        let result = analyze(&batch(500, 500.0, 0.0), &config);
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
