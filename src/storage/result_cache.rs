// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Latest analysis result
//!
//! A single slot holding the most recent [`FftResult`]. Writers swap in a new
//! `Arc` under the write lock, so readers see either the previous or the new
//! result, never an empty or half-written one. Once filled, the slot is never
//! cleared.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, TryLockError};

use crate::spectral::{FftResult, LoadType};

/// Phase angle and derived load type of the cached result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase_angle: f64,
    #[serde(rename = "type")]
    pub load_type: LoadType,
}

#[derive(Debug, Default)]
pub struct LatestResultCache {
    slot: RwLock<Option<Arc<FftResult>>>,
}

impl LatestResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new result and return the one it replaced.
    pub async fn replace(&self, result: Arc<FftResult>) -> Option<Arc<FftResult>> {
        self.slot.write().await.replace(result)
    }

    /// Most recent result, `None` only before the first analysis
    pub async fn current(&self) -> Option<Arc<FftResult>> {
        self.slot.read().await.clone()
    }

    pub fn try_current(&self) -> Result<Option<Arc<FftResult>>, TryLockError> {
        Ok(self.slot.try_read()?.clone())
    }

    /// Phase of the cached result classified against `threshold_deg`.
    pub async fn phase(&self, threshold_deg: f64) -> Option<PhaseReport> {
        self.current().await.map(|result| PhaseReport {
            phase_angle: result.phase_diff_deg,
            load_type: result.load_type(threshold_deg),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(batch_id: u64, phase: f64) -> FftResult {
        FftResult {
            batch_id,
            spectrum: Vec::new(),
            phase_diff_deg: phase,
            fundamental_bin_hz: 60.0,
            sample_rate_hz: 500.0,
            computed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_until_first_replace() {
        let cache = LatestResultCache::new();
        assert!(cache.current().await.is_none());
        assert!(cache.phase(20.0).await.is_none());
        assert!(cache.try_current().unwrap().is_none());

        assert!(cache.replace(Arc::new(result(1, 10.0))).await.is_none());
        assert_eq!(cache.current().await.unwrap().batch_id, 1);
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_result() {
        let cache = LatestResultCache::new();
        cache.replace(Arc::new(result(1, 10.0))).await;
        let held = cache.current().await.unwrap();

        let previous = cache.replace(Arc::new(result(2, -35.0))).await.unwrap();
        assert_eq!(previous.batch_id, 1);
        // A reader holding the old Arc keeps a consistent value
        assert_eq!(held.phase_diff_deg, 10.0);

        let report = cache.phase(20.0).await.unwrap();
        assert_eq!(report.phase_angle, -35.0);
        assert_eq!(report.load_type, LoadType::Capacitive);

        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["type"], "capacitive");
    }
}
