// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! ADC and sensor calibration constants
//!
//! The voltage channel comes from an LM358 op-amp stage fed by a step-down
//! transformer, the current channel from an SCT-013 current transformer
//! across a burden resistor. Both are digitized by the same ADC.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Calibration constants used to turn raw ADC codes into volts and amps.
///
/// # Fields
///
/// * `adc_bits` - Resolution of the ADC in bits (1..=24)
/// * `v_ref` - ADC reference voltage in volts
/// * `full_scale_minus_one` - Use `2^bits - 1` as full scale instead of `2^bits`
/// * `ct_ratio` - Turns ratio of the current transformer
/// * `burden_divisor` - Effective burden resistance divisor of the current channel
/// * `voltage_gain` - Gain from ADC volts back to line volts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub adc_bits: u32,
    pub v_ref: f64,
    pub full_scale_minus_one: bool,
    pub ct_ratio: f64,
    pub burden_divisor: f64,
    pub voltage_gain: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            adc_bits: 12, // ESP32 ADC
            v_ref: 3.3,
            full_scale_minus_one: false,
            ct_ratio: 2000.0,      // SCT-013-000
            burden_divisor: 165.0, // 33 Ω burden, ×5 divider stage
            voltage_gain: 635.0,
        }
    }
}

impl CalibrationConfig {
    /// Divisor applied to raw codes to get ADC volts.
    pub fn full_scale(&self) -> f64 {
        let codes = (1u64 << self.adc_bits) as f64;
        if self.full_scale_minus_one {
            codes - 1.0
        } else {
            codes
        }
    }

    /// Largest raw code the ADC can produce.
    pub fn max_code(&self) -> u32 {
        ((1u64 << self.adc_bits) - 1) as u32
    }

    /// Multiplier from ADC volts to line amps.
    pub fn current_scale(&self) -> f64 {
        self.ct_ratio / self.burden_divisor
    }

    /// Checks that every constant is usable before any conversion happens.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(1..=24).contains(&self.adc_bits) {
            return Err(PipelineError::Configuration(format!(
                "adc_bits must be within 1..=24, got {}",
                self.adc_bits
            )));
        }
        let positive = [
            ("v_ref", self.v_ref),
            ("ct_ratio", self.ct_ratio),
            ("burden_divisor", self.burden_divisor),
            ("voltage_gain", self.voltage_gain),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::Configuration(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
