// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Raw sample acquisition
//!
//! The acquisition firmware samples the voltage proxy (LM358 stage) and the
//! current proxy (SCT-013 transformer) on the same ADC and posts each burst
//! as a JSON document:
//!
//! ```json
//! {"timestamp": "2025-06-01T12:00:00Z", "lm358": [2048, 2300], "sct013": [2040, 2051]}
//! ```
//!
//! This module decodes and validates that payload into a [`RawSampleSet`].
//! Conversion to physical units lives in [`conditioner`].

pub mod conditioner;

pub use conditioner::{condition, CalibratedWaveform};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};

/// One burst of raw ADC codes as sent by the acquisition firmware.
///
/// The two channels are sampled together but may differ in length when the
/// firmware truncates a burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSampleSet {
    /// Instant of the last sample in the burst
    #[serde(rename = "timestamp")]
    pub end_timestamp: DateTime<Utc>,
    /// Voltage proxy codes
    #[serde(rename = "lm358", alias = "channel_a")]
    pub channel_a: Vec<u32>,
    /// Current proxy codes
    #[serde(rename = "sct013", alias = "channel_b")]
    pub channel_b: Vec<u32>,
}

impl RawSampleSet {
    pub fn new(end_timestamp: DateTime<Utc>, channel_a: Vec<u32>, channel_b: Vec<u32>) -> Self {
        Self {
            end_timestamp,
            channel_a,
            channel_b,
        }
    }

    /// Decode an ingestion payload.
    ///
    /// Every malformed field is reported as [`PipelineError::Validation`] with
    /// the offending field named, so the caller can answer synchronously.
    pub fn from_json(payload: &Value) -> PipelineResult<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| PipelineError::Validation("payload must be a JSON object".into()))?;

        let timestamp = object
            .get("timestamp")
            .ok_or_else(|| PipelineError::Validation("missing field 'timestamp'".into()))?
            .as_str()
            .ok_or_else(|| PipelineError::Validation("'timestamp' must be a string".into()))?;
        let end_timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                PipelineError::Validation(format!("invalid timestamp '{}': {}", timestamp, e))
            })?
            .with_timezone(&Utc);

        let channel_a = read_channel(object, &["lm358", "channel_a"])?;
        let channel_b = read_channel(object, &["sct013", "channel_b"])?;

        Ok(Self::new(end_timestamp, channel_a, channel_b))
    }

    /// Number of samples in the longer channel
    pub fn sample_count(&self) -> usize {
        self.channel_a.len().max(self.channel_b.len())
    }
}

fn read_channel(
    object: &serde_json::Map<String, Value>,
    names: &[&str],
) -> PipelineResult<Vec<u32>> {
    let (name, value) = names
        .iter()
        .find_map(|name| object.get(*name).map(|value| (*name, value)))
        .ok_or_else(|| PipelineError::Validation(format!("missing field '{}'", names[0])))?;

    let items = value
        .as_array()
        .ok_or_else(|| PipelineError::Validation(format!("'{}' must be an array", name)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_u64()
                .and_then(|code| u32::try_from(code).ok())
                .ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "'{}'[{}] is not a valid ADC code: {}",
                        name, i, item
                    ))
                })
        })
        .collect()
}
