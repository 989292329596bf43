// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition configuration
//!
//! This module defines the structures for configuring how raw sample sets
//! are accepted and processed by the ingestion worker.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Configuration for the ingestion process.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Flag to enable or disable the ingestion worker.
    ///
    /// When disabled, uploads are still validated but nothing consumes the
    /// queue, so they are rejected once the queue is full.
    pub enabled: bool,

    /// Fixed interval between two consecutive ADC samples, in microseconds.
    ///
    /// The firmware samples both channels at 500 Hz, hence the 2000 µs default.
    /// Per-sample timestamps are synthesized backwards from the payload's end
    /// timestamp using this interval.
    pub sample_interval_us: u64,

    /// Capacity of the bounded ingestion queue.
    ///
    /// Uploads arriving while the queue is full are refused instead of
    /// blocking the caller.
    pub queue_capacity: usize,

    /// Period of the daemon heartbeat log line, in seconds.
    pub heartbeat_secs: u64,
}

impl AcquisitionConfig {
    /// Sample interval as a chrono duration
    pub fn sample_interval(&self) -> Duration {
        Duration::microseconds(self.sample_interval_us as i64)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_us: 2000, // 500 Hz
            queue_capacity: 32,
            heartbeat_secs: 60,
        }
    }
}
