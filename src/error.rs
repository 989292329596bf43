// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types for the measurement pipeline
//!
//! Every stage of the pipeline (conditioning, batch storage, RMS recording,
//! spectral analysis, ingestion queueing) reports failures through
//! [`PipelineError`]. None of these errors is fatal to the process: a failed
//! ingestion drops a single batch, a failed analysis leaves the cached result
//! untouched.

use thiserror::Error;

/// Typed failure of a pipeline operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed ingestion payload (missing timestamp, non-sequence channel,
    /// out-of-range ADC code)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Degenerate input data, e.g. an empty channel
    #[error("Data error: {0}")]
    Data(String),

    /// Invalid calibration constant or filter parameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The batch store refused the write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Not enough samples to run the requested analysis
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The ingestion queue is at capacity
    #[error("Ingestion queue is full")]
    QueueFull,

    /// The ingestion worker is no longer accepting tasks
    #[error("Ingestion worker is shut down")]
    Shutdown,
}

/// Convenience alias used throughout the pipeline modules
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Short machine-readable kind, used in log lines and API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Data(_) => "data",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Storage(_) => "storage",
            PipelineError::InsufficientData(_) => "insufficient_data",
            PipelineError::QueueFull => "queue_full",
            PipelineError::Shutdown => "shutdown",
        }
    }
}
