// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared monitor state
//!
//! [`MonitorState`] is cheap to clone and is handed to the ingestion worker,
//! the HTTP routes and the Modbus server. Each component it holds does its
//! own locking; no lock is ever held across two components.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::acquisition::{condition, RawSampleSet};
use crate::config::{AnalysisConfig, CalibrationConfig, Config, StorageConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::power::{RmsAccumulator, RmsRecord, RmsSummary};
use crate::spectral::{analyze, FftResult};
use crate::storage::{BatchStore, LatestResultCache, PhaseReport, Sample};

/// Result of one successful ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub batch_id: u64,
    pub samples: usize,
    pub rms: RmsRecord,
}

/// Everything the pipeline shares between tasks
#[derive(Clone)]
pub struct MonitorState {
    store: Arc<BatchStore>,
    accumulator: Arc<RmsAccumulator>,
    cache: Arc<LatestResultCache>,
    calibration: Arc<CalibrationConfig>,
    analysis: Arc<AnalysisConfig>,
    storage: Arc<StorageConfig>,
}

impl MonitorState {
    pub fn new(config: &Config) -> Self {
        Self {
            store: Arc::new(BatchStore::new(
                config.storage.max_batches,
                config.acquisition.sample_interval(),
            )),
            accumulator: Arc::new(RmsAccumulator::new()),
            cache: Arc::new(LatestResultCache::new()),
            calibration: Arc::new(config.calibration.clone()),
            analysis: Arc::new(config.analysis.clone()),
            storage: Arc::new(config.storage.clone()),
        }
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    pub fn accumulator(&self) -> &RmsAccumulator {
        &self.accumulator
    }

    pub fn cache(&self) -> &LatestResultCache {
        &self.cache
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        &self.analysis
    }

    pub fn energy_window(&self) -> Duration {
        Duration::from_secs(self.analysis.energy_window_secs)
    }

    /// Condition a raw sample set, store it as a batch and record its RMS.
    pub async fn ingest(&self, raw: &RawSampleSet) -> PipelineResult<IngestReport> {
        let waveform = condition(raw, &self.calibration)?;
        let batch_id = self.store.append(&waveform, raw.end_timestamp).await?;
        let rms = self.accumulator.record(&waveform, raw.end_timestamp).await;
        debug!(
            "Ingested batch {} ({} samples, v_rms={:?}, i_rms={:?})",
            batch_id,
            waveform.len(),
            rms.v_rms,
            rms.i_rms
        );
        Ok(IngestReport {
            batch_id,
            samples: waveform.len(),
            rms,
        })
    }

    /// Analyze the latest batch and publish the result to the cache.
    ///
    /// `Ok(None)` means no batch is stored yet. On error the cached result
    /// is left as it was.
    pub async fn analyze_latest(&self) -> PipelineResult<Option<Arc<FftResult>>> {
        let Some(batch) = self.store.latest_batch().await else {
            return Ok(None);
        };

        let analysis = self.analysis.clone();
        let result = tokio::task::spawn_blocking(move || analyze(&batch, &analysis))
            .await
            .map_err(|e| PipelineError::Data(format!("analysis task failed: {}", e)))??;

        debug!(
            "Analysis of batch {}: phase {:.2}°, {} harmonic bins",
            result.batch_id,
            result.phase_diff_deg,
            result.spectrum.len()
        );
        let result = Arc::new(result);
        self.cache.replace(result.clone()).await;
        Ok(Some(result))
    }

    /// Latest RMS record and energy over the configured window
    pub async fn latest_rms(&self) -> Option<RmsSummary> {
        self.accumulator
            .summary(self.energy_window(), Utc::now())
            .await
    }

    /// Phase angle of the cached analysis with its load type
    pub async fn phase(&self) -> Option<PhaseReport> {
        self.cache.phase(self.analysis.load_threshold_deg).await
    }

    /// Configured preview window of the latest batch
    pub async fn latest_preview(&self) -> Option<(u64, Vec<Sample>)> {
        self.store
            .latest_preview(self.storage.preview_offset, self.storage.preview_len)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::WaveformGenerator;

    #[tokio::test]
    async fn test_ingest_then_analyze() {
        let config = Config::default();
        let state = MonitorState::new(&config);
        assert!(state.analyze_latest().await.unwrap().is_none());

        let mut generator = WaveformGenerator::new(42);
        let raw = generator.mains_payload(Utc::now(), 1000, 500.0, 60.0, 35.0);

        let report = state.ingest(&raw).await.unwrap();
        assert_eq!(report.batch_id, 1);
        assert_eq!(report.samples, 1000);
        assert!(report.rms.w_rms.is_some());

        let result = state.analyze_latest().await.unwrap().unwrap();
        assert_eq!(result.batch_id, 1);
        let phase = state.phase().await.unwrap();
        assert_eq!(phase.phase_angle, result.phase_diff_deg);
        assert!(state.latest_rms().await.is_some());
        assert_eq!(state.latest_preview().await.unwrap().1.len(), 50);
    }

    #[tokio::test]
    async fn test_failed_ingest_stores_nothing() {
        let state = MonitorState::new(&Config::default());
        let raw = RawSampleSet::new(Utc::now(), vec![], vec![1, 2]);
        assert!(matches!(
            state.ingest(&raw).await,
            Err(PipelineError::Data(_))
        ));
        assert!(state.store().is_empty().await);
        assert!(state.accumulator().is_empty().await);
    }
}
