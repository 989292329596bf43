// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Ingestion Consumer
//!
//! Validated raw sample sets are queued on a bounded channel and processed by
//! a single background worker (conditioning, batch storage, RMS recording).
//! Producers never wait: a full queue is reported to them immediately.
//! Each task yields an [`IngestionOutcome`] which is logged, counted and
//! broadcast to subscribers.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use anyhow::Result;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

use super::state::MonitorState;
use crate::acquisition::RawSampleSet;
use crate::config::AcquisitionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::power::RmsRecord;

/// Capacity of the outcome broadcast channel
const OUTCOME_BUFFER_SIZE: usize = 64;

/// Result of processing one queued sample set
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionOutcome {
    Stored {
        batch_id: u64,
        samples: usize,
        rms: RmsRecord,
    },
    Failed {
        error: PipelineError,
    },
}

/// Ingestion counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionStatistics {
    /// Tasks accepted onto the queue
    pub tasks_received: u64,
    /// Tasks refused because the queue was full or closed
    pub tasks_rejected: u64,
    pub tasks_stored: u64,
    pub tasks_failed: u64,
    pub last_batch_id: Option<u64>,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    rejected: AtomicU64,
    stored: AtomicU64,
    failed: AtomicU64,
    // 0 until the first batch is stored, ids start at 1
    last_batch_id: AtomicU64,
}

/// Producer side of the ingestion queue
#[derive(Clone)]
pub struct IngestionHandle {
    sender: mpsc::Sender<RawSampleSet>,
    counters: Arc<Counters>,
}

impl IngestionHandle {
    /// Queue a sample set without waiting.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::QueueFull`] when the queue is at capacity
    /// * [`PipelineError::Shutdown`] when the worker has stopped
    pub fn submit(&self, raw: RawSampleSet) -> PipelineResult<()> {
        match self.sender.try_send(raw) {
            Ok(()) => {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(PipelineError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(PipelineError::Shutdown)
            }
        }
    }

    /// Free slots left on the queue
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

/// Background worker draining the ingestion queue
pub struct IngestionConsumer {
    state: MonitorState,
    sender: mpsc::Sender<RawSampleSet>,
    receiver: Option<mpsc::Receiver<RawSampleSet>>,
    outcome_sender: broadcast::Sender<IngestionOutcome>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    consumer_id: String,
}

impl IngestionConsumer {
    /// Create a consumer with a queue of `config.queue_capacity` tasks.
    ///
    /// Nothing is processed until [`start`](Self::start) is called, but
    /// handles can already queue work.
    pub fn new(state: MonitorState, config: &AcquisitionConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (outcome_sender, _) = broadcast::channel(OUTCOME_BUFFER_SIZE);
        Self {
            state,
            sender,
            receiver: Some(receiver),
            outcome_sender,
            counters: Arc::new(Counters::default()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            consumer_id: "ingestion_consumer".to_string(),
        }
    }

    pub fn handle(&self) -> IngestionHandle {
        IngestionHandle {
            sender: self.sender.clone(),
            counters: self.counters.clone(),
        }
    }

    /// Get a subscriber to ingestion outcomes
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<IngestionOutcome> {
        self.outcome_sender.subscribe()
    }

    pub fn statistics(&self) -> IngestionStatistics {
        statistics_of(&self.counters)
    }

    /// Snapshot function usable after the consumer has been moved
    pub fn statistics_source(&self) -> impl Fn() -> IngestionStatistics + Send + Sync + 'static {
        let counters = self.counters.clone();
        move || statistics_of(&counters)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the worker task.
    ///
    /// The queue can only be drained by one worker, so a second call fails.
    pub fn start(&mut self) -> Result<JoinHandle<Result<()>>> {
        let Some(mut receiver) = self.receiver.take() else {
            warn!("IngestionConsumer '{}' is already running", self.consumer_id);
            anyhow::bail!("ingestion consumer already started");
        };

        info!("Starting IngestionConsumer '{}'", self.consumer_id);
        self.running.store(true, Ordering::Relaxed);

        let state = self.state.clone();
        let outcome_sender = self.outcome_sender.clone();
        let counters = self.counters.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();
        let consumer_id = self.consumer_id.clone();

        let task = tokio::spawn(async move {
            while running.load(Ordering::Relaxed) {
                let raw = tokio::select! {
                    _ = shutdown.notified() => break,
                    task = receiver.recv() => match task {
                        Some(raw) => raw,
                        None => break,
                    },
                };

                let outcome = match state.ingest(&raw).await {
                    Ok(report) => {
                        counters.stored.fetch_add(1, Ordering::Relaxed);
                        counters
                            .last_batch_id
                            .store(report.batch_id, Ordering::Relaxed);
                        info!(
                            "IngestionConsumer '{}': stored batch {} ({} samples, {:?} W)",
                            consumer_id, report.batch_id, report.samples, report.rms.w_rms
                        );
                        IngestionOutcome::Stored {
                            batch_id: report.batch_id,
                            samples: report.samples,
                            rms: report.rms,
                        }
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        error!(
                            "IngestionConsumer '{}': ingestion failed ({}): {}",
                            consumer_id,
                            e.kind(),
                            e
                        );
                        IngestionOutcome::Failed { error: e }
                    }
                };

                if let Err(e) = outcome_sender.send(outcome) {
                    debug!("No active outcome subscribers: {}", e);
                }
            }

            // Later submissions see a closed queue
            receiver.close();
            running.store(false, Ordering::Relaxed);
            info!("IngestionConsumer '{}': worker stopped", consumer_id);
            Ok(())
        });

        Ok(task)
    }

    /// Ask the worker to stop after its current task.
    pub fn stop(&self) {
        info!("Stopping IngestionConsumer '{}'", self.consumer_id);
        self.running.store(false, Ordering::Relaxed);
        self.shutdown.notify_one();
    }
}

fn statistics_of(counters: &Counters) -> IngestionStatistics {
    let last = counters.last_batch_id.load(Ordering::Relaxed);
    IngestionStatistics {
        tasks_received: counters.received.load(Ordering::Relaxed),
        tasks_rejected: counters.rejected.load(Ordering::Relaxed),
        tasks_stored: counters.stored.load(Ordering::Relaxed),
        tasks_failed: counters.failed.load(Ordering::Relaxed),
        last_batch_id: (last > 0).then_some(last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::Utc;

    fn raw(n: usize) -> RawSampleSet {
        RawSampleSet::new(Utc::now(), vec![2048; n], vec![2048; n])
    }

    #[tokio::test]
    async fn test_queue_full_without_worker() {
        let config = Config::default();
        let acquisition = AcquisitionConfig {
            queue_capacity: 2,
            ..Default::default()
        };
        let consumer = IngestionConsumer::new(MonitorState::new(&config), &acquisition);
        let handle = consumer.handle();

        handle.submit(raw(4)).unwrap();
        handle.submit(raw(4)).unwrap();
        assert_eq!(handle.submit(raw(4)), Err(PipelineError::QueueFull));

        let stats = consumer.statistics();
        assert_eq!(stats.tasks_received, 2);
        assert_eq!(stats.tasks_rejected, 1);
    }

    #[tokio::test]
    async fn test_outcomes_are_broadcast() {
        let config = Config::default();
        let state = MonitorState::new(&config);
        let mut consumer = IngestionConsumer::new(state.clone(), &config.acquisition);
        let mut outcomes = consumer.subscribe_outcomes();
        let handle = consumer.handle();
        let worker = consumer.start().unwrap();

        handle.submit(raw(8)).unwrap();
        handle.submit(raw(0)).unwrap();

        match outcomes.recv().await.unwrap() {
            IngestionOutcome::Stored {
                batch_id, samples, ..
            } => {
                assert_eq!(batch_id, 1);
                assert_eq!(samples, 8);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        match outcomes.recv().await.unwrap() {
            IngestionOutcome::Failed { error } => {
                assert!(matches!(error, PipelineError::Data(_)))
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let stats = consumer.statistics();
        assert_eq!(stats.tasks_stored, 1);
        assert_eq!(stats.tasks_failed, 1);
        assert_eq!(stats.last_batch_id, Some(1));
        assert_eq!(state.store().len().await, 1);

        consumer.stop();
        worker.await.unwrap().unwrap();
        assert!(!consumer.is_running());
        assert_eq!(handle.submit(raw(4)), Err(PipelineError::Shutdown));
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let config = Config::default();
        let mut consumer = IngestionConsumer::new(MonitorState::new(&config), &config.acquisition);
        let worker = consumer.start().unwrap();
        assert!(consumer.start().is_err());
        consumer.stop();
        worker.await.unwrap().unwrap();
    }
}
