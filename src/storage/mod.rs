// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory storage
//!
//! - [`batch_store`]: bounded window of recent sample batches
//! - [`result_cache`]: single-slot holder of the latest spectral analysis

pub mod batch_store;
pub mod result_cache;

pub use batch_store::{Batch, BatchStore, Sample};
pub use result_cache::{LatestResultCache, PhaseReport};
