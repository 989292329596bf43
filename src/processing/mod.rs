// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Processing module
//!
//! Ties the pipeline stages together:
//!
//! - [`state`]: shared monitor state (batch store, RMS log, result cache)
//!   and the two pipeline entry points, ingestion and on-demand analysis
//! - [`consumer`]: bounded ingestion queue and its background worker

pub mod consumer;
pub mod state;

pub use consumer::{IngestionConsumer, IngestionHandle, IngestionOutcome, IngestionStatistics};
pub use state::{IngestReport, MonitorState};
