// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Batch retention configuration

use serde::{Deserialize, Serialize};

/// Configuration of the in-memory batch store.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum number of batches retained at any time (FIFO eviction by batch id).
    pub max_batches: usize,

    /// First sample index returned by the latest-batch preview query.
    pub preview_offset: usize,

    /// Number of samples returned by the latest-batch preview query.
    pub preview_len: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_batches: 4,
            // The first samples of a burst are unreliable on the reference
            // hardware, so the dashboard preview starts well inside the batch.
            preview_offset: 700,
            preview_len: 50,
        }
    }
}
