// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Mains Waveform Generator
//!
//! Produces synthetic ADC bursts shaped like the firmware payloads, for
//! bench testing without hardware and for the test suite.
//!
//! ## Features
//!
//! * Fundamental with configurable voltage/current amplitude and phase lag
//! * Optional current harmonics
//! * Gaussian noise from a fast XORShift generator and the Box-Muller transform
//! * Quantization to ADC codes around mid-scale, clipped to the ADC range
//!
//! ## Examples
//!
//! ```rust
//! use chrono::Utc;
//! use rust_energy_monitor::utility::WaveformGenerator;
//!
//! let mut generator = WaveformGenerator::new(12345);
//! // 1000 samples at 500 Hz, 60 Hz mains, current lagging by 30°
//! let payload = generator.mains_payload(Utc::now(), 1000, 500.0, 60.0, 30.0);
//! assert_eq!(payload.channel_a.len(), 1000);
//! ```

use std::f64::consts::PI;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::acquisition::RawSampleSet;

/// Shape of a synthetic mains burst, in ADC codes
#[derive(Debug, Clone, PartialEq)]
pub struct MainsWaveform {
    pub sample_rate_hz: f64,
    pub fundamental_hz: f64,
    /// Peak swing of the voltage channel around mid-scale
    pub voltage_peak: f64,
    /// Peak swing of the current channel around mid-scale
    pub current_peak: f64,
    /// Current lag behind voltage in degrees (negative for a leading current)
    pub phase_lag_deg: f64,
    /// Current harmonics as (order, amplitude relative to the fundamental)
    pub harmonics: Vec<(u32, f64)>,
    /// Standard deviation of the added noise
    pub noise_std: f64,
}

impl Default for MainsWaveform {
    fn default() -> Self {
        Self {
            sample_rate_hz: 500.0,
            fundamental_hz: 60.0,
            voltage_peak: 1200.0,
            current_peak: 800.0,
            phase_lag_deg: 0.0,
            harmonics: Vec::new(),
            noise_std: 0.0,
        }
    }
}

/// Synthetic ADC burst generator
///
/// Uses an XORShift generator: fast and reproducible from a seed, not
/// suitable for anything cryptographic.
pub struct WaveformGenerator {
    rng_state: u32,
    adc_bits: u32,
}

impl WaveformGenerator {
    /// Creates a generator for a 12-bit ADC with a given seed.
    ///
    /// A zero seed would lock XORShift at zero and is replaced by 1.
    pub fn new(seed: u32) -> Self {
        Self {
            rng_state: seed.max(1),
            adc_bits: 12,
        }
    }

    /// Creates a generator seeded from the system time.
    pub fn new_from_system_time() -> Self {
        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u32)
            .unwrap_or(1);
        Self::new(seed)
    }

    /// Set the ADC resolution used for quantization (builder pattern)
    pub fn with_adc_bits(mut self, adc_bits: u32) -> Self {
        self.adc_bits = adc_bits.clamp(1, 24);
        self
    }

    /// Random value in [-1.0, 1.0]
    pub fn random_float(&mut self) -> f64 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 17;
        self.rng_state ^= self.rng_state << 5;

        (self.rng_state as f64 / u32::MAX as f64) * 2.0 - 1.0
    }

    /// Random value from a standard normal distribution (Box-Muller)
    pub fn random_gaussian(&mut self) -> f64 {
        let u1 = (self.random_float() + 1.0) / 2.0;
        let u2 = (self.random_float() + 1.0) / 2.0;

        // Avoid ln(0)
        let u1 = u1.max(1e-4);

        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Generate `samples` samples per channel ending at `end_timestamp`.
    pub fn generate(
        &mut self,
        shape: &MainsWaveform,
        samples: usize,
        end_timestamp: DateTime<Utc>,
    ) -> RawSampleSet {
        let omega = 2.0 * PI * shape.fundamental_hz;
        let lag = shape.phase_lag_deg.to_radians();

        let mut channel_a = Vec::with_capacity(samples);
        let mut channel_b = Vec::with_capacity(samples);
        for i in 0..samples {
            let t = i as f64 / shape.sample_rate_hz;

            let voltage = shape.voltage_peak * (omega * t).sin();
            let mut current = shape.current_peak * (omega * t - lag).sin();
            for &(order, relative) in &shape.harmonics {
                let k = order as f64;
                current += shape.current_peak * relative * (k * (omega * t - lag)).sin();
            }

            let v_noise = shape.noise_std * self.random_gaussian();
            let i_noise = shape.noise_std * self.random_gaussian();
            channel_a.push(self.quantize(voltage + v_noise));
            channel_b.push(self.quantize(current + i_noise));
        }

        RawSampleSet::new(end_timestamp, channel_a, channel_b)
    }

    /// Noise-free burst with the default amplitudes.
    pub fn mains_payload(
        &mut self,
        end_timestamp: DateTime<Utc>,
        samples: usize,
        sample_rate_hz: f64,
        fundamental_hz: f64,
        phase_lag_deg: f64,
    ) -> RawSampleSet {
        let shape = MainsWaveform {
            sample_rate_hz,
            fundamental_hz,
            phase_lag_deg,
            ..Default::default()
        };
        self.generate(&shape, samples, end_timestamp)
    }

    /// Convert a swing around mid-scale to an ADC code
    fn quantize(&self, swing: f64) -> u32 {
        let max_code = ((1u64 << self.adc_bits) - 1) as f64;
        let mid = (max_code + 1.0) / 2.0;
        (mid + swing).round().clamp(0.0, max_code) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_reproducibility() {
        let shape = MainsWaveform {
            noise_std: 10.0,
            ..Default::default()
        };
        let end = Utc::now();
        let a = WaveformGenerator::new(7).generate(&shape, 64, end);
        let b = WaveformGenerator::new(7).generate(&shape, 64, end);
        assert_eq!(a, b);
    }

    #[test]
    fn test_codes_within_adc_range() {
        let shape = MainsWaveform {
            voltage_peak: 5000.0,
            noise_std: 50.0,
            ..Default::default()
        };
        let raw = WaveformGenerator::new(3).generate(&shape, 500, Utc::now());
        assert!(raw.channel_a.iter().all(|&c| c <= 4095));
        assert!(raw.channel_a.contains(&4095));
        assert!(raw.channel_a.contains(&0));
    }

    #[test]
    fn test_noise_free_centered() {
        let raw = WaveformGenerator::new(1).mains_payload(Utc::now(), 500, 500.0, 60.0, 0.0);
        let mean = raw.channel_a.iter().map(|&c| c as f64).sum::<f64>() / 500.0;
        assert!((mean - 2048.0).abs() < 1.0);
        assert_eq!(raw.channel_a[0], 2048);
    }

    #[test]
    fn test_gaussian_statistics() {
        let mut generator = WaveformGenerator::new(12345);
        let n = 20000;
        let values: Vec<f64> = (0..n).map(|_| generator.random_gaussian()).collect();
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "variance {}", var);
    }
}
