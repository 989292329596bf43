// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//!
//! Visualization module
//!
//! HTTP API used by the acquisition firmware to upload bursts and by
//! dashboards to read the latest batch, RMS values, spectrum and phase.

pub mod api;
pub mod server;

pub use server::build_rocket;
