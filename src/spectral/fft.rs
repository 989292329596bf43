// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! FFT implementation for spectral analysis

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::error::{PipelineError, PipelineResult};

/// Trait for implementing spectral analysis
pub trait SpectralAnalyzer: Send {
    /// Compute the full complex spectrum of a uniformly sampled signal
    fn analyze(&mut self, signal: &[f64], sample_rate: f64) -> PipelineResult<SpectrumData>;
}

/// Complex spectrum with the bin frequencies in `fftfreq` order
///
/// Bin `k` of an `N`-point transform sits at `k * fs / N` for the first half
/// and wraps to negative frequencies for the second half.
#[derive(Debug, Clone)]
pub struct SpectrumData {
    pub frequencies: Vec<f64>,
    pub bins: Vec<Complex64>,
    pub sample_rate: f64,
}

impl SpectrumData {
    /// Index of the bin whose frequency is closest to `frequency`
    pub fn nearest_bin(&self, frequency: f64) -> Option<usize> {
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - frequency)
                    .abs()
                    .total_cmp(&(*b - frequency).abs())
            })
            .map(|(index, _)| index)
    }

    /// Frequency spacing between two bins
    pub fn resolution(&self) -> f64 {
        self.sample_rate / self.bins.len() as f64
    }

    pub fn amplitude(&self, index: usize) -> f64 {
        self.bins[index].norm()
    }

    /// Angle of a bin in radians, within (-π, π]
    pub fn phase(&self, index: usize) -> f64 {
        self.bins[index].arg()
    }
}

/// Bin frequencies of an `n`-point FFT sampled at `sample_rate`.
///
/// Same layout as NumPy's `fftfreq`: `[0, 1, ..., (n-1)/2, -(n/2), ..., -1] * fs / n`.
pub fn fftfreq(n: usize, sample_rate: f64) -> Vec<f64> {
    let step = sample_rate / n as f64;
    let positive = (n - 1) / 2;
    (0..n)
        .map(|i| {
            if i <= positive {
                i as f64 * step
            } else {
                -((n - i) as f64) * step
            }
        })
        .collect()
}

/// Plain (unwindowed) FFT analyzer
///
/// No window is applied: the phase of the fundamental is read directly from
/// its bin, and a window would only matter for leakage between bins.
pub struct FFTAnalyzer {
    planner: FftPlanner<f64>,
}

impl FFTAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl Default for FFTAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer for FFTAnalyzer {
    fn analyze(&mut self, signal: &[f64], sample_rate: f64) -> PipelineResult<SpectrumData> {
        if signal.is_empty() {
            return Err(PipelineError::InsufficientData(
                "cannot compute the spectrum of an empty signal".into(),
            ));
        }

        // Convert input to complex numbers
        let mut bins: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();

        let fft = self.planner.plan_fft_forward(signal.len());
        fft.process(&mut bins);

        Ok(SpectrumData {
            frequencies: fftfreq(signal.len(), sample_rate),
            bins,
            sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_fftfreq_layout() {
        assert_eq!(fftfreq(4, 4.0), vec![0.0, 1.0, -2.0, -1.0]);
        assert_eq!(fftfreq(5, 5.0), vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn test_sine_peak_and_phase() {
        let fs = 500.0;
        let n = 500;
        let signal: Vec<f64> = (0..n)
            .map(|i| 3.0 * (2.0 * PI * 60.0 * i as f64 / fs).cos())
            .collect();

        let mut analyzer = FFTAnalyzer::new();
        let spectrum = analyzer.analyze(&signal, fs).unwrap();
        let idx = spectrum.nearest_bin(60.0).unwrap();

        assert_eq!(idx, 60);
        assert_relative_eq!(spectrum.resolution(), 1.0);
        assert_relative_eq!(spectrum.amplitude(idx), 3.0 * n as f64 / 2.0, epsilon = 1e-6);
        assert_relative_eq!(spectrum.phase(idx), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_signal() {
        let mut analyzer = FFTAnalyzer::new();
        assert!(matches!(
            analyzer.analyze(&[], 500.0),
            Err(PipelineError::InsufficientData(_))
        ));
    }
}
