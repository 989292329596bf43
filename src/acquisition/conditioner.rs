// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sample conditioning
//!
//! Converts raw ADC codes to calibrated line volts and amps. Each channel is
//! scaled to ADC volts, stripped of its DC bias (the sensors sit on a
//! mid-scale offset) and multiplied by its sensor gain.

use serde::{Deserialize, Serialize};

use super::RawSampleSet;
use crate::config::CalibrationConfig;
use crate::error::{PipelineError, PipelineResult};

/// Calibrated, zero-mean voltage and current sequences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedWaveform {
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
}

impl CalibratedWaveform {
    /// Length of the longer channel
    pub fn len(&self) -> usize {
        self.voltage.len().max(self.current.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convert a raw sample set to physical units.
///
/// Pure and deterministic: the same input and calibration always give the
/// same output.
///
/// # Errors
///
/// * [`PipelineError::Configuration`] if a calibration constant is unusable
/// * [`PipelineError::Validation`] if a code exceeds the ADC range
/// * [`PipelineError::Data`] if either channel is empty
pub fn condition(
    raw: &RawSampleSet,
    calib: &CalibrationConfig,
) -> PipelineResult<CalibratedWaveform> {
    calib.validate()?;

    let voltage = condition_channel(&raw.channel_a, "voltage", calib)?
        .into_iter()
        .map(|v| v * calib.voltage_gain)
        .collect();

    let current_scale = calib.current_scale();
    let current = condition_channel(&raw.channel_b, "current", calib)?
        .into_iter()
        .map(|v| v * current_scale)
        .collect();

    Ok(CalibratedWaveform { voltage, current })
}

/// Scale one channel to ADC volts and remove its mean.
fn condition_channel(
    codes: &[u32],
    name: &str,
    calib: &CalibrationConfig,
) -> PipelineResult<Vec<f64>> {
    if codes.is_empty() {
        return Err(PipelineError::Data(format!("{} channel is empty", name)));
    }

    let max_code = calib.max_code();
    if let Some((index, code)) = codes.iter().enumerate().find(|&(_, &c)| c > max_code) {
        return Err(PipelineError::Validation(format!(
            "{} sample {} has code {} above ADC maximum {}",
            name, index, code, max_code
        )));
    }

    let scale = calib.v_ref / calib.full_scale();
    let volts: Vec<f64> = codes.iter().map(|&c| c as f64 * scale).collect();
    let mean = volts.iter().sum::<f64>() / volts.len() as f64;

    Ok(volts.into_iter().map(|v| v - mean).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn raw(a: Vec<u32>, b: Vec<u32>) -> RawSampleSet {
        RawSampleSet::new(Utc::now(), a, b)
    }

    #[test]
    fn test_constant_channel_is_zero() {
        let calib = CalibrationConfig::default();
        let waveform = condition(&raw(vec![2048; 10], vec![1000; 7]), &calib).unwrap();
        assert_eq!(waveform.voltage.len(), 10);
        assert_eq!(waveform.current.len(), 7);
        assert!(waveform.voltage.iter().all(|v| v.abs() < 1e-12));
        assert!(waveform.current.iter().all(|i| i.abs() < 1e-12));
    }

    #[test]
    fn test_scaling_matches_calibration() {
        let calib = CalibrationConfig::default();
        let waveform = condition(&raw(vec![0, 4096 - 1], vec![0, 4096 - 1]), &calib).unwrap();

        let half_span = 4095.0 * 3.3 / 4096.0 / 2.0;
        assert_relative_eq!(waveform.voltage[1], half_span * 635.0, epsilon = 1e-9);
        assert_relative_eq!(waveform.voltage[0], -half_span * 635.0, epsilon = 1e-9);
        assert_relative_eq!(
            waveform.current[1],
            half_span * 2000.0 / 165.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_output_is_zero_mean() {
        let calib = CalibrationConfig::default();
        let codes: Vec<u32> = (0..100).map(|i| 1500 + (i * 37) % 1000).collect();
        let waveform = condition(&raw(codes.clone(), codes), &calib).unwrap();
        let mean: f64 = waveform.voltage.iter().sum::<f64>() / 100.0;
        assert!(mean.abs() < 1e-9);
    }

    #[test]
    fn test_condition_is_deterministic() {
        let calib = CalibrationConfig::default();
        let input = raw(vec![100, 2000, 3000], vec![5, 4000]);
        assert_eq!(
            condition(&input, &calib).unwrap(),
            condition(&input, &calib).unwrap()
        );
    }

    #[test]
    fn test_errors() {
        let calib = CalibrationConfig::default();
        assert!(matches!(
            condition(&raw(vec![], vec![1]), &calib),
            Err(PipelineError::Data(_))
        ));
        assert!(matches!(
            condition(&raw(vec![1], vec![]), &calib),
            Err(PipelineError::Data(_))
        ));
        assert!(matches!(
            condition(&raw(vec![4096], vec![1]), &calib),
            Err(PipelineError::Validation(_))
        ));

        let bad = CalibrationConfig {
            v_ref: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            condition(&raw(vec![1], vec![1]), &bad),
            Err(PipelineError::Configuration(_))
        ));
    }
}
