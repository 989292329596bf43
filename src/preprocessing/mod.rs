// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signal preprocessing module
//!
//! This module prepares stored batches for spectral analysis: resampling onto
//! a uniform time grid and zero-phase high-pass filtering.

pub mod filter;
pub mod resample;

pub use filter::{ButterHighpassFilter, Filter};
pub use resample::{resample_uniform, UniformSignal};
