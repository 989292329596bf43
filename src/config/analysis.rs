// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Spectral analysis and energy accounting configuration

use serde::{Deserialize, Serialize};

/// Parameters of the phase/harmonic analyzer and of the energy window.
///
/// All frequencies are in Hz, angles in degrees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Power-line fundamental frequency.
    pub fundamental_hz: f64,

    /// Maximum distance between `fundamental_hz` and the nearest FFT bin.
    ///
    /// A coarser grid means the batch is too short to resolve the fundamental.
    pub fundamental_tolerance_hz: f64,

    /// Cutoff of the Butterworth high-pass applied before the FFT.
    pub cutoff_hz: f64,

    /// Order of the Butterworth high-pass.
    pub filter_order: usize,

    /// Phase magnitude above which a load is considered reactive.
    pub load_threshold_deg: f64,

    /// Scale harmonic amplitudes by the voltage/current peak ratio.
    ///
    /// Display only, the phase angle is never affected.
    pub normalize_current: bool,

    /// Only bins strictly above this frequency are reported.
    pub harmonic_min_hz: f64,

    /// Spacing of the reported frequency grid.
    pub harmonic_step_hz: f64,

    /// Maximum distance between a bin and its grid point.
    pub harmonic_grid_tolerance_hz: f64,

    /// Trailing window used for energy integration, in seconds.
    pub energy_window_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fundamental_hz: 60.0,
            fundamental_tolerance_hz: 5.0,
            cutoff_hz: 60.0,
            filter_order: 4,
            load_threshold_deg: 20.0,
            normalize_current: false,
            harmonic_min_hz: 50.0,
            harmonic_step_hz: 5.0,
            harmonic_grid_tolerance_hz: 1e-6,
            energy_window_secs: 3600, // one hour
        }
    }
}
