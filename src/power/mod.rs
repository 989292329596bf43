// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RMS and energy accounting
//!
//! Every conditioned waveform produces one [`RmsRecord`] holding the
//! quadratic-mean voltage, current and their product (apparent power).
//! Records are kept in an append-only log and integrated over a trailing
//! window with a forward-Euler rule to estimate consumed energy.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, TryLockError};

use crate::acquisition::CalibratedWaveform;

/// Quadratic mean of a sequence, `None` when it is empty
pub fn quadratic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum_sq: f64 = values.iter().map(|x| x * x).sum();
    Some((sum_sq / values.len() as f64).sqrt())
}

/// RMS summary of one waveform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmsRecord {
    pub timestamp: DateTime<Utc>,
    pub v_rms: Option<f64>,
    pub i_rms: Option<f64>,
    /// Apparent power `v_rms * i_rms`
    pub w_rms: Option<f64>,
}

impl RmsRecord {
    pub fn from_waveform(waveform: &CalibratedWaveform, timestamp: DateTime<Utc>) -> Self {
        let v_rms = quadratic_mean(&waveform.voltage);
        let i_rms = quadratic_mean(&waveform.current);
        let w_rms = match (v_rms, i_rms) {
            (Some(v), Some(i)) => Some(v * i),
            _ => None,
        };
        Self {
            timestamp,
            v_rms,
            i_rms,
            w_rms,
        }
    }
}

/// Latest record together with the energy over the trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmsSummary {
    #[serde(flatten)]
    pub record: RmsRecord,
    /// Watt-hours over the window ending at the query time
    pub energy_hour: f64,
}

/// Forward-Euler energy estimate in watt-hours.
///
/// `records` must be sorted by timestamp and lie in the window. Each record's
/// power holds until the next one; the last one holds until `now`. A record
/// without power counts as zero. The result is rounded to 3 decimals.
pub fn integrate_energy(records: &[&RmsRecord], now: DateTime<Utc>) -> f64 {
    let hours = |from: DateTime<Utc>, to: DateTime<Utc>| {
        (to - from).num_milliseconds() as f64 / 1000.0 / 3600.0
    };

    let mut energy_wh: f64 = records
        .windows(2)
        .map(|pair| pair[0].w_rms.unwrap_or(0.0) * hours(pair[0].timestamp, pair[1].timestamp))
        .sum();
    if let Some(last) = records.last() {
        energy_wh += last.w_rms.unwrap_or(0.0) * hours(last.timestamp, now);
    }

    (energy_wh * 1000.0).round() / 1000.0
}

/// Append-only log of RMS records
#[derive(Debug, Default)]
pub struct RmsAccumulator {
    records: RwLock<Vec<RmsRecord>>,
}

impl RmsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the RMS record of a waveform and append it to the log.
    pub async fn record(
        &self,
        waveform: &CalibratedWaveform,
        timestamp: DateTime<Utc>,
    ) -> RmsRecord {
        let record = RmsRecord::from_waveform(waveform, timestamp);
        self.records.write().await.push(record.clone());
        record
    }

    /// Record with the greatest timestamp
    pub async fn latest(&self) -> Option<RmsRecord> {
        latest_of(&self.records.read().await)
    }

    /// Energy in watt-hours over `[now - window, now]`.
    pub async fn energy_over_window(&self, window: StdDuration, now: DateTime<Utc>) -> f64 {
        energy_of(&self.records.read().await, window, now)
    }

    /// Latest record and energy estimate, `None` while the log is empty.
    pub async fn summary(&self, window: StdDuration, now: DateTime<Utc>) -> Option<RmsSummary> {
        summary_of(&self.records.read().await, window, now)
    }

    /// Non-blocking variant of [`summary`](Self::summary) for synchronous callers.
    pub fn try_summary(
        &self,
        window: StdDuration,
        now: DateTime<Utc>,
    ) -> Result<Option<RmsSummary>, TryLockError> {
        let records = self.records.try_read()?;
        Ok(summary_of(&records, window, now))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn latest_of(records: &[RmsRecord]) -> Option<RmsRecord> {
    records.iter().max_by_key(|r| r.timestamp).cloned()
}

fn energy_of(records: &[RmsRecord], window: StdDuration, now: DateTime<Utc>) -> f64 {
    let window = Duration::from_std(window).unwrap_or(Duration::MAX);
    let start = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut in_window: Vec<&RmsRecord> = records
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= now)
        .collect();
    in_window.sort_by_key(|r| r.timestamp);

    integrate_energy(&in_window, now)
}

fn summary_of(records: &[RmsRecord], window: StdDuration, now: DateTime<Utc>) -> Option<RmsSummary> {
    latest_of(records).map(|record| RmsSummary {
        record,
        energy_hour: energy_of(records, window, now),
    })
}
