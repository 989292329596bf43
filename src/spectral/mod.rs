// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//!
//! Spectral analysis module
//!
//! This module handles spectral analysis of stored batches: FFT processing,
//! fundamental phase extraction and load classification.

pub mod analyzer;
pub mod fft;
pub mod phase;

pub use analyzer::{analyze, FftResult, HarmonicBin};
pub use fft::{fftfreq, FFTAnalyzer, SpectralAnalyzer, SpectrumData};
pub use phase::LoadType;
