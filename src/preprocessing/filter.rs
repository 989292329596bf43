// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Butterworth high-pass filter using SciPy-style SOS (Second-Order Sections) + filtfilt
//!
//! The filter is designed with `iirfilter_dyn` and `FilterOutputType::Sos`, then
//! applied forward and backward with `sosfiltfilt_dyn`. The forward-backward pass
//! cancels the phase response of the filter, which keeps the voltage/current
//! phase relationship intact.
//!
//! # Examples
//!
//! ```no_run
//! use rust_energy_monitor::preprocessing::filter::{ButterHighpassFilter, Filter};
//!
//! // 4th-order high-pass at 60 Hz for a 500 Hz sampled signal
//! let filter = ButterHighpassFilter::new(60.0, 500.0, 4).unwrap();
//! let input = vec![0.0; 100];
//! let output = filter.apply(&input).unwrap();
//! ```

use sci_rs::signal::filter::design::{
    iirfilter_dyn, DigitalFilter, FilterBandType, FilterOutputType, FilterType, Sos,
};
use sci_rs::signal::filter::sosfiltfilt_dyn;

use crate::error::{PipelineError, PipelineResult};

/// Trait for implementing digital filters
pub trait Filter: Send + Sync {
    /// Apply the filter to a signal and return the filtered signal
    fn apply(&self, signal: &[f64]) -> PipelineResult<Vec<f64>>;

    /// Shortest signal the filter accepts
    fn min_input_len(&self) -> usize;
}

/// Butterworth high-pass filter using SOS + filtfilt
///
/// # Parameters
/// - `cutoff_freq`: Cutoff frequency in Hz
/// - `sample_rate`: Sample rate in Hz
/// - `order`: Filter order (higher = steeper roll-off)
#[derive(Debug, Clone)]
pub struct ButterHighpassFilter {
    cutoff_freq: f64,
    sample_rate: f64,
    order: usize,
    sos: Vec<Sos<f64>>,
}

impl ButterHighpassFilter {
    /// Design a new Butterworth high-pass filter
    ///
    /// # Errors
    ///
    /// [`PipelineError::Configuration`] if the order is zero or the cutoff is
    /// not strictly between 0 and the Nyquist frequency.
    pub fn new(cutoff_freq: f64, sample_rate: f64, order: usize) -> PipelineResult<Self> {
        if order == 0 {
            return Err(PipelineError::Configuration(
                "filter order must be at least 1".into(),
            ));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "invalid sample rate {} Hz",
                sample_rate
            )));
        }
        // SciPy uses frequencies normalized to Nyquist
        let nyquist = sample_rate / 2.0;
        if !(cutoff_freq > 0.0 && cutoff_freq < nyquist) {
            return Err(PipelineError::Configuration(format!(
                "cutoff {} Hz must lie within (0, {}) Hz",
                cutoff_freq, nyquist
            )));
        }
        let cutoff_norm = cutoff_freq / nyquist;

        let result = iirfilter_dyn(
            order,                          // filter order
            vec![cutoff_norm],              // critical frequency (normalized)
            None,                           // rp (not used for Butterworth)
            None,                           // rs (not used for Butterworth)
            Some(FilterBandType::Highpass), // filter type
            Some(FilterType::Butterworth),  // analog prototype
            Some(false),                    // digital filter
            Some(FilterOutputType::Sos),    // output as SOS
            None,                           // fs (already normalized)
        );

        let sos = match result {
            DigitalFilter::Sos(sos_filter) => sos_filter.sos,
            _ => {
                return Err(PipelineError::Configuration(
                    "expected SOS output from iirfilter_dyn".into(),
                ))
            }
        };

        Ok(Self {
            cutoff_freq,
            sample_rate,
            order,
            sos,
        })
    }

    pub fn cutoff_freq(&self) -> f64 {
        self.cutoff_freq
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sections(&self) -> usize {
        self.sos.len()
    }
}

impl Filter for ButterHighpassFilter {
    fn apply(&self, signal: &[f64]) -> PipelineResult<Vec<f64>> {
        if signal.len() < self.min_input_len() {
            return Err(PipelineError::InsufficientData(format!(
                "filtfilt needs at least {} samples, got {}",
                self.min_input_len(),
                signal.len()
            )));
        }
        Ok(sosfiltfilt_dyn(signal.iter(), &self.sos))
    }

    // Edge padding of filtfilt is 3 * (2 * sections + 1) samples and the
    // signal must be strictly longer than the padding.
    fn min_input_len(&self) -> usize {
        3 * (2 * self.sos.len() + 1) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, fs: f64, n: usize, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs + phase).sin())
            .collect()
    }

    #[test]
    fn test_design_sections() {
        let filter = ButterHighpassFilter::new(60.0, 500.0, 4).unwrap();
        assert_eq!(filter.sections(), 2);
        assert_eq!(filter.min_input_len(), 16);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            ButterHighpassFilter::new(60.0, 500.0, 0),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            ButterHighpassFilter::new(250.0, 500.0, 4),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            ButterHighpassFilter::new(0.0, 500.0, 4),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_short_signal_rejected() {
        let filter = ButterHighpassFilter::new(60.0, 500.0, 4).unwrap();
        assert!(matches!(
            filter.apply(&[0.0; 15]),
            Err(PipelineError::InsufficientData(_))
        ));
        assert_eq!(filter.apply(&[0.0; 16]).unwrap().len(), 16);
    }

    #[test]
    fn test_removes_dc_and_low_frequency() {
        let filter = ButterHighpassFilter::new(60.0, 500.0, 4).unwrap();
        let signal: Vec<f64> = sine(2.0, 500.0, 500, 0.0)
            .iter()
            .map(|x| x + 5.0)
            .collect();
        let output = filter.apply(&signal).unwrap();
        let middle = &output[100..400];
        let peak = middle.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        assert!(peak < 0.05, "low-frequency residue too large: {}", peak);
    }

    #[test]
    fn test_zero_phase_above_cutoff() {
        // Well above the cutoff the forward-backward pass leaves the
        // waveform aligned with the input
        let filter = ButterHighpassFilter::new(60.0, 500.0, 4).unwrap();
        let signal = sine(150.0, 500.0, 500, 0.3);
        let output = filter.apply(&signal).unwrap();
        for i in 100..400 {
            assert!(
                (output[i] - signal[i]).abs() < 0.05,
                "sample {} differs: {} vs {}",
                i,
                output[i],
                signal[i]
            );
        }
    }
}
