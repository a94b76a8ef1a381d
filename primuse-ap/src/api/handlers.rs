//! HTTP request handlers
//!
//! Every control endpoint answers with the session snapshot after the
//! operation, so clients never need a second round trip.

use crate::api::server::AppContext;
use crate::backend::enumerate_devices;
use crate::error::PlaybackError;
use axum::{extract::State, http::StatusCode, Json};
use primuse_common::human_time::format_clock;
use primuse_common::{PlaybackSession, SessionState, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

/// Session snapshot with display-ready clock strings
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: SessionState,
    #[serde(flatten)]
    pub session: PlaybackSession,
    pub position_text: String,
    pub duration_text: String,
}

impl From<PlaybackSession> for StateResponse {
    fn from(session: PlaybackSession) -> Self {
        Self {
            state: session.state(),
            position_text: format_clock(session.position_ms),
            duration_text: format_clock(session.duration_ms),
            session,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    delta_ms: i64,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult = Result<Json<StateResponse>, ApiError>;

fn error_response(status: StatusCode, message: String) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: "error".to_string(),
            error: Some(message),
        }),
    )
}

fn playback_error(err: PlaybackError) -> ApiError {
    let status = match &err {
        PlaybackError::NoActiveTrack => StatusCode::NOT_FOUND,
        PlaybackError::Superseded => StatusCode::CONFLICT,
        PlaybackError::LoadFailed(_)
        | PlaybackError::SeekFailed(_)
        | PlaybackError::TransportFailed(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, err.to_string())
}

fn validation_error(err: ValidationError) -> ApiError {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

fn current_state(ctx: &AppContext) -> Json<StateResponse> {
    Json(ctx.coordinator.snapshot().into())
}

// ============================================================================
// Health and devices
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "primuse-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /audio/devices
pub async fn list_audio_devices() -> Result<Json<DeviceListResponse>, ApiError> {
    match enumerate_devices().await {
        Ok(devices) => Ok(Json(DeviceListResponse { devices })),
        Err(e) => {
            error!("Failed to list audio devices: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// ============================================================================
// Playback
// ============================================================================

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<StateResponse> {
    current_state(&ctx)
}

/// POST /playback/play
///
/// Body is a raw track record from any supported upstream source.
pub async fn play(State(ctx): State<AppContext>, Json(raw): Json<Value>) -> ApiResult {
    let track = ctx.resolver.normalize(&raw).map_err(|e| {
        warn!("Rejected track record: {}", e);
        validation_error(e)
    })?;

    info!("Play request: '{}' by {}", track.title(), track.artist());
    ctx.coordinator
        .load_and_play(track)
        .await
        .map_err(playback_error)?;

    Ok(current_state(&ctx))
}

/// POST /playback/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> ApiResult {
    ctx.coordinator
        .toggle_play_pause()
        .await
        .map_err(playback_error)?;
    Ok(current_state(&ctx))
}

/// POST /playback/release
pub async fn release(State(ctx): State<AppContext>) -> Json<StateResponse> {
    ctx.coordinator.release().await;
    current_state(&ctx)
}

/// POST /playback/seek
pub async fn seek(State(ctx): State<AppContext>, Json(req): Json<SeekRequest>) -> ApiResult {
    ctx.coordinator
        .seek(req.position_ms)
        .await
        .map_err(playback_error)?;
    Ok(current_state(&ctx))
}

/// POST /playback/skip
pub async fn skip(State(ctx): State<AppContext>, Json(req): Json<SkipRequest>) -> ApiResult {
    ctx.coordinator
        .skip_by(req.delta_ms)
        .await
        .map_err(playback_error)?;
    Ok(current_state(&ctx))
}

/// POST /playback/skip-forward
pub async fn skip_forward(State(ctx): State<AppContext>) -> ApiResult {
    ctx.coordinator
        .skip_forward()
        .await
        .map_err(playback_error)?;
    Ok(current_state(&ctx))
}

/// POST /playback/skip-backward
pub async fn skip_backward(State(ctx): State<AppContext>) -> ApiResult {
    ctx.coordinator
        .skip_backward()
        .await
        .map_err(playback_error)?;
    Ok(current_state(&ctx))
}
