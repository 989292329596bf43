// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! API routes
//!
//! | Method | Path | Success | Errors |
//! |--------|------|---------|--------|
//! | POST | `/api/upload` | 201 | 400 invalid payload, 503 queue full or stopped |
//! | GET | `/api/latest_batch` | 200 | 404 no batch |
//! | GET | `/api/latest_rms` | 200 | 404 no record |
//! | GET | `/api/get_fft` | 200 | 404 no batch, 422 insufficient data, 500 |
//! | GET | `/api/get_phase_angle` | 200 | 404 no analysis yet |
//!
//! Every error body is `{"error": "<description>"}`.

use log::{debug, warn};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{catch, get, post, Request, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::acquisition::RawSampleSet;
use crate::error::PipelineError;
use crate::power::RmsSummary;
use crate::processing::{IngestionHandle, MonitorState};
use crate::spectral::HarmonicBin;
use crate::storage::{PhaseReport, Sample};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Window of the latest batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPreview {
    pub batch_id: u64,
    pub samples: Vec<Sample>,
}

pub type ApiError = status::Custom<Json<ErrorBody>>;

fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    status::Custom(
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// HTTP status for a pipeline error
pub fn error_status(error: &PipelineError) -> Status {
    match error {
        PipelineError::Validation(_) => Status::BadRequest,
        PipelineError::Data(_) | PipelineError::InsufficientData(_) => Status::UnprocessableEntity,
        PipelineError::QueueFull | PipelineError::Shutdown => Status::ServiceUnavailable,
        PipelineError::Configuration(_) | PipelineError::Storage(_) => {
            Status::InternalServerError
        }
    }
}

impl From<PipelineError> for status::Custom<Json<ErrorBody>> {
    fn from(error: PipelineError) -> Self {
        api_error(error_status(&error), error.to_string())
    }
}

/// Accept a raw burst from the acquisition firmware.
///
/// The payload is validated before queueing; conditioning and storage
/// happen in the ingestion worker.
#[post("/upload", format = "json", data = "<payload>")]
pub async fn upload(
    payload: Json<Value>,
    ingestion: &State<IngestionHandle>,
) -> Result<status::Custom<Json<MessageBody>>, ApiError> {
    let raw = RawSampleSet::from_json(&payload).inspect_err(|e| {
        warn!("Rejected upload: {}", e);
    })?;
    let samples = raw.sample_count();
    ingestion.submit(raw)?;
    debug!("Queued upload of {} samples", samples);

    Ok(status::Custom(
        Status::Created,
        Json(MessageBody {
            message: format!("Queued {} samples for processing", samples),
        }),
    ))
}

#[get("/latest_batch")]
pub async fn latest_batch(state: &State<MonitorState>) -> Result<Json<BatchPreview>, ApiError> {
    state
        .latest_preview()
        .await
        .map(|(batch_id, samples)| Json(BatchPreview { batch_id, samples }))
        .ok_or_else(|| api_error(Status::NotFound, "No batch stored yet"))
}

#[get("/latest_rms")]
pub async fn latest_rms(state: &State<MonitorState>) -> Result<Json<RmsSummary>, ApiError> {
    state
        .latest_rms()
        .await
        .map(Json)
        .ok_or_else(|| api_error(Status::NotFound, "No RMS measurement available"))
}

/// Analyze the latest batch, refresh the cached result and return the
/// harmonic slice of the current spectrum.
#[get("/get_fft")]
pub async fn get_fft(state: &State<MonitorState>) -> Result<Json<Vec<HarmonicBin>>, ApiError> {
    match state.analyze_latest().await {
        Ok(Some(result)) => Ok(Json(result.spectrum.clone())),
        Ok(None) => Err(api_error(Status::NotFound, "No batch stored yet")),
        Err(e) => {
            warn!("Spectral analysis failed ({}): {}", e.kind(), e);
            Err(e.into())
        }
    }
}

#[get("/get_phase_angle")]
pub async fn get_phase_angle(state: &State<MonitorState>) -> Result<Json<PhaseReport>, ApiError> {
    state
        .phase()
        .await
        .map(Json)
        .ok_or_else(|| api_error(Status::NotFound, "No FFT analysis available yet"))
}

#[catch(default)]
pub fn default_catcher(status: Status, _request: &Request) -> ApiError {
    api_error(status, status.reason_lossy())
}
