// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Uniform resampling
//!
//! Batches carry absolute timestamps that are nominally but not necessarily
//! evenly spaced. Before the FFT both channels are linearly interpolated onto
//! a uniform grid of the same length spanning the same time interval.

use ndarray::Array1;

use crate::error::{PipelineError, PipelineResult};

/// Two channels sampled on a uniform grid
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSignal {
    /// Grid instants in seconds from the first sample
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
    /// Sample rate derived from the mean interval of the input timestamps
    pub sample_rate: f64,
}

/// Linearly interpolate `voltage` and `current` onto a uniform grid.
///
/// `time` holds the sample instants in seconds and must be non-decreasing.
/// The grid has as many points as the input and spans `[time[0], time[N-1]]`.
///
/// # Errors
///
/// * [`PipelineError::InsufficientData`] with fewer than 2 samples
/// * [`PipelineError::Data`] if the channel lengths differ from `time`, or
///   if the timestamps do not span a positive interval
pub fn resample_uniform(
    time: &[f64],
    voltage: &[f64],
    current: &[f64],
) -> PipelineResult<UniformSignal> {
    let n = time.len();
    if n < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "resampling needs at least 2 samples, got {}",
            n
        )));
    }
    if voltage.len() != n || current.len() != n {
        return Err(PipelineError::Data(format!(
            "channel lengths {} / {} do not match {} timestamps",
            voltage.len(),
            current.len(),
            n
        )));
    }

    // mean(diff(t)) telescopes to the total span over N - 1
    let span = time[n - 1] - time[0];
    if !(span.is_finite() && span > 0.0) {
        return Err(PipelineError::Data(
            "sample timestamps do not span a positive interval".into(),
        ));
    }
    let dt = span / (n - 1) as f64;

    let grid = Array1::linspace(time[0], time[n - 1], n);

    Ok(UniformSignal {
        voltage: interpolate(time, voltage, &grid),
        current: interpolate(time, current, &grid),
        time: grid.to_vec(),
        sample_rate: 1.0 / dt,
    })
}

/// Piecewise-linear interpolation, clamped to the end values outside the
/// input range.
fn interpolate(xs: &[f64], ys: &[f64], grid: &Array1<f64>) -> Vec<f64> {
    let last = xs.len() - 1;
    let mut segment = 0;
    grid.iter()
        .map(|&x| {
            if x <= xs[0] {
                return ys[0];
            }
            if x >= xs[last] {
                return ys[last];
            }
            // The grid is increasing, so the segment only moves forward
            while segment + 1 < last && xs[segment + 1] < x {
                segment += 1;
            }
            let (x0, x1) = (xs[segment], xs[segment + 1]);
            let (y0, y1) = (ys[segment], ys[segment + 1]);
            if x1 <= x0 {
                y1
            } else {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_input_is_unchanged() {
        let time: Vec<f64> = (0..10).map(|i| i as f64 * 0.002).collect();
        let voltage: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
        let current: Vec<f64> = (0..10).map(|i| -(i as f64)).collect();

        let uniform = resample_uniform(&time, &voltage, &current).unwrap();
        assert_relative_eq!(uniform.sample_rate, 500.0, epsilon = 1e-9);
        for i in 0..10 {
            assert_relative_eq!(uniform.voltage[i], voltage[i], epsilon = 1e-9);
            assert_relative_eq!(uniform.current[i], current[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_jittered_input_is_interpolated() {
        let time = vec![0.0, 0.5, 3.0, 4.0];
        let ramp: Vec<f64> = time.iter().map(|t| 2.0 * t + 1.0).collect();
        let uniform = resample_uniform(&time, &ramp, &ramp).unwrap();

        assert_relative_eq!(uniform.sample_rate, 0.75, epsilon = 1e-12);
        let expected_grid = [0.0, 4.0 / 3.0, 8.0 / 3.0, 4.0];
        for (i, t) in expected_grid.iter().enumerate() {
            assert_relative_eq!(uniform.time[i], *t, epsilon = 1e-12);
            // A linear signal survives linear interpolation exactly
            assert_relative_eq!(uniform.voltage[i], 2.0 * t + 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            resample_uniform(&[0.0], &[1.0], &[1.0]),
            Err(PipelineError::InsufficientData(_))
        ));
        assert!(matches!(
            resample_uniform(&[0.0, 1.0], &[1.0], &[1.0, 2.0]),
            Err(PipelineError::Data(_))
        ));
        assert!(matches!(
            resample_uniform(&[1.0, 1.0], &[1.0, 2.0], &[1.0, 2.0]),
            Err(PipelineError::Data(_))
        ));
    }
}
