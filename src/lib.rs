// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust Energy Monitor library
//!
//! This library ingests raw ADC bursts from a mains voltage divider and a
//! current transformer, keeps a bounded history of calibrated batches, and
//! derives RMS power, energy, phase angle, load type and harmonic content.

pub mod acquisition;
pub mod config;
pub mod daemon;
pub mod error;
pub mod modbus;
pub mod power;
pub mod preprocessing;
pub mod processing;
pub mod spectral;
pub mod storage;
pub mod utility;
pub mod visualization;

pub use config::Config;
pub use error::{PipelineError, PipelineResult};
