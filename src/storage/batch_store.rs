// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Bounded batch store
//!
//! Every ingested waveform becomes a [`Batch`] with a fresh, strictly
//! increasing id. At most `max_batches` batches are retained; when the limit
//! is exceeded the batch with the smallest id is dropped in full.
//!
//! The id counter and the retained set live behind one [`RwLock`], and an
//! append keeps the write guard from id assignment until eviction is done.
//! Readers therefore never see more than `max_batches` batches, nor a
//! half-inserted batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::acquisition::CalibratedWaveform;
use crate::error::{PipelineError, PipelineResult};

/// One calibrated sample with its synthesized timestamp.
///
/// A channel value is `None` when that channel was shorter than the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

/// A stored waveform, ordered by timestamp. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: u64,
    pub samples: Vec<Sample>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    batches: BTreeMap<u64, Arc<Batch>>,
    last_issued: u64,
}

impl StoreState {
    fn next_id(&self) -> u64 {
        let max_existing = self.batches.keys().next_back().copied().unwrap_or(0);
        max_existing.max(self.last_issued) + 1
    }

    fn evict(&mut self, max_batches: usize) -> Vec<u64> {
        let mut evicted = Vec::new();
        while self.batches.len() > max_batches {
            match self.batches.pop_first() {
                Some((id, _)) => evicted.push(id),
                None => break,
            }
        }
        evicted
    }
}

/// Thread-safe store of the most recent sample batches
#[derive(Debug)]
pub struct BatchStore {
    state: RwLock<StoreState>,
    max_batches: usize,
    sample_interval: Duration,
}

impl BatchStore {
    /// Create an empty store.
    ///
    /// `max_batches` is clamped to at least one.
    pub fn new(max_batches: usize, sample_interval: Duration) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            max_batches: max_batches.max(1),
            sample_interval,
        }
    }

    pub fn max_batches(&self) -> usize {
        self.max_batches
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    /// Store a waveform as a new batch and return its id.
    ///
    /// Sample `i` of `N` is stamped `end_timestamp - (N - 1 - i) * sample_interval`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Storage`] if the waveform holds no sample at all. The
    /// store is left untouched in that case.
    pub async fn append(
        &self,
        waveform: &CalibratedWaveform,
        end_timestamp: DateTime<Utc>,
    ) -> PipelineResult<u64> {
        let samples = self.build_samples(waveform, end_timestamp)?;

        let mut state = self.state.write().await;
        let batch_id = state.next_id();
        state.last_issued = batch_id;
        state
            .batches
            .insert(batch_id, Arc::new(Batch { batch_id, samples }));
        let evicted = state.evict(self.max_batches);
        drop(state);

        if !evicted.is_empty() {
            debug!("Evicted batches {:?} after storing batch {}", evicted, batch_id);
        }
        Ok(batch_id)
    }

    fn build_samples(
        &self,
        waveform: &CalibratedWaveform,
        end_timestamp: DateTime<Utc>,
    ) -> PipelineResult<Vec<Sample>> {
        let n = waveform.len();
        if n == 0 {
            return Err(PipelineError::Storage(
                "cannot store a batch without samples".into(),
            ));
        }
        let steps_back = i32::try_from(n - 1).map_err(|_| {
            PipelineError::Storage(format!("batch of {} samples is too large", n))
        })?;

        Ok((0..n)
            .map(|i| Sample {
                timestamp: end_timestamp - self.sample_interval * (steps_back - i as i32),
                voltage: waveform.voltage.get(i).copied(),
                current: waveform.current.get(i).copied(),
            })
            .collect())
    }

    /// Drop the oldest batches until at most `max_batches` remain.
    ///
    /// Returns the evicted ids, smallest first. [`append`](Self::append)
    /// already does this under its own lock; calling it separately is only
    /// useful after lowering the limit.
    pub async fn evict_if_over_capacity(&self) -> Vec<u64> {
        self.state.write().await.evict(self.max_batches)
    }

    /// Batch with the largest id, if any
    pub async fn latest_batch(&self) -> Option<Arc<Batch>> {
        self.state
            .read()
            .await
            .batches
            .last_key_value()
            .map(|(_, batch)| batch.clone())
    }

    pub async fn get(&self, batch_id: u64) -> Option<Arc<Batch>> {
        self.state.read().await.batches.get(&batch_id).cloned()
    }

    /// Retained ids in ascending order
    pub async fn batch_ids(&self) -> Vec<u64> {
        self.state.read().await.batches.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.batches.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Window `[offset, offset + len)` of the latest batch.
    ///
    /// The window is clamped to the batch length, so a short batch yields a
    /// short (possibly empty) slice. `None` means the store is empty.
    pub async fn latest_preview(&self, offset: usize, len: usize) -> Option<(u64, Vec<Sample>)> {
        let batch = self.latest_batch().await?;
        let start = offset.min(batch.samples.len());
        let end = offset.saturating_add(len).min(batch.samples.len());
        Some((batch.batch_id, batch.samples[start..end].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waveform(n: usize) -> CalibratedWaveform {
        CalibratedWaveform {
            voltage: (0..n).map(|i| i as f64).collect(),
            current: (0..n).map(|i| -(i as f64)).collect(),
        }
    }

    fn store(max: usize) -> BatchStore {
        BatchStore::new(max, Duration::milliseconds(2))
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let store = store(4);
        let now = Utc::now();
        let mut previous = 0;
        for _ in 0..10 {
            let id = store.append(&waveform(3), now).await.unwrap();
            assert!(id > previous);
            previous = id;
        }
        assert_eq!(previous, 10);
    }

    #[tokio::test]
    async fn test_fifo_eviction() {
        let store = store(4);
        let now = Utc::now();
        for _ in 0..6 {
            store.append(&waveform(3), now).await.unwrap();
            assert!(store.len().await <= 4);
        }
        assert_eq!(store.batch_ids().await, vec![3, 4, 5, 6]);
        assert_eq!(store.latest_batch().await.unwrap().batch_id, 6);
        assert!(store.get(2).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_eviction() {
        let store = store(1);
        let now = Utc::now();
        assert_eq!(store.append(&waveform(1), now).await.unwrap(), 1);
        assert_eq!(store.append(&waveform(1), now).await.unwrap(), 2);
        assert_eq!(store.batch_ids().await, vec![2]);
        assert_eq!(store.append(&waveform(1), now).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_timestamps_end_at_payload_time() {
        let store = store(4);
        let end = Utc::now();
        let id = store.append(&waveform(5), end).await.unwrap();
        let batch = store.get(id).await.unwrap();
        assert_eq!(batch.samples.len(), 5);
        assert_eq!(batch.samples[4].timestamp, end);
        assert_eq!(batch.samples[0].timestamp, end - Duration::milliseconds(8));
        for pair in batch.samples.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::milliseconds(2));
        }
    }

    #[tokio::test]
    async fn test_uneven_channels_padded_with_none() {
        let store = store(4);
        let uneven = CalibratedWaveform {
            voltage: vec![1.0, 2.0, 3.0],
            current: vec![0.5],
        };
        let id = store.append(&uneven, Utc::now()).await.unwrap();
        let batch = store.get(id).await.unwrap();
        assert_eq!(batch.samples.len(), 3);
        assert_eq!(batch.samples[0].current, Some(0.5));
        assert_eq!(batch.samples[1].current, None);
        assert_eq!(batch.samples[2].voltage, Some(3.0));
    }

    #[tokio::test]
    async fn test_empty_waveform_rejected() {
        let store = store(4);
        let result = store.append(&waveform(0), Utc::now()).await;
        assert!(matches!(result, Err(PipelineError::Storage(_))));
        assert!(store.is_empty().await);
        // The failed append does not consume an id
        assert_eq!(store.append(&waveform(1), Utc::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_preview_is_clamped() {
        let store = store(4);
        assert!(store.latest_preview(0, 10).await.is_none());

        store.append(&waveform(1000), Utc::now()).await.unwrap();
        let (id, preview) = store.latest_preview(700, 50).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(preview.len(), 50);
        assert_eq!(preview[0].voltage, Some(700.0));

        let (_, short) = store.latest_preview(990, 50).await.unwrap();
        assert_eq!(short.len(), 10);
        let (_, none) = store.latest_preview(2000, 50).await.unwrap();
        assert!(none.is_empty());
    }
}
