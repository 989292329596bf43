// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Utility module
//!
//! Helpers that are not part of the measurement pipeline itself, such as
//! the synthetic mains waveform generator used by the simulator and tests.

pub mod waveform_generator;

pub use waveform_generator::{MainsWaveform, WaveformGenerator};
