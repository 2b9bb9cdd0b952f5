//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    error::{ControllerError, EngineError, RepositoryError},
    state::{app_state::format_duration, AppState},
};
use super::responses::{
    ErrorResponse, HealthResponse, HistoryResponse, StatusResponse, StopResponse, TimerResponse,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: &ControllerError) -> ApiError {
    let status = match e {
        ControllerError::Engine(EngineError::NotRunning | EngineError::AlreadyRunning) => {
            StatusCode::CONFLICT
        }
        ControllerError::Engine(EngineError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ControllerError::Remote(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
        ControllerError::Remote(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse::new(e.to_string())))
}

/// Handle POST /timer/start - Arm a six hour countdown
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TimerResponse>, ApiError> {
    match state.controller.start().await {
        Ok(started) => {
            state.record_action("start");
            info!("Start endpoint called - countdown running until {}", started.deadline);
            Ok(Json(TimerResponse::counting(
                "Countdown started".to_string(),
                Some(started.deadline),
                state.controller.remaining_time().as_secs(),
            )))
        }
        Err(e) => {
            warn!("Failed to start countdown: {}", e);
            Err(api_error(&e))
        }
    }
}

/// Handle POST /timer/stop - Stop the countdown and sync the aggregate
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StopResponse>, ApiError> {
    match state.controller.stop().await {
        Ok(report) => {
            state.record_action("stop");
            let elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX);
            let (message, aggregate, sync_error) = match report.aggregate {
                Ok(record) => ("Countdown stopped".to_string(), Some(record), None),
                Err(e) => (
                    "Countdown stopped, aggregate not updated".to_string(),
                    None,
                    Some(e.to_string()),
                ),
            };
            info!("Stop endpoint called - countdown ran {}ms", elapsed_ms);
            Ok(Json(StopResponse {
                status: "idle".to_string(),
                message,
                timestamp: Utc::now(),
                elapsed_ms,
                aggregate,
                sync_error,
            }))
        }
        Err(e) => {
            warn!("Failed to stop countdown: {}", e);
            Err(api_error(&e))
        }
    }
}

/// Handle POST /timer/reset - Discard the countdown
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TimerResponse>, ApiError> {
    match state.controller.reset().await {
        Ok(()) => {
            state.record_action("reset");
            info!("Reset endpoint called - countdown discarded");
            Ok(Json(TimerResponse::idle("Countdown reset".to_string())))
        }
        Err(e) => {
            error!("Failed to reset countdown: {}", e);
            Err(api_error(&e))
        }
    }
}

/// Handle GET /timer/status - Return the countdown and server status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let controller = &state.controller;
    let snapshot = controller.snapshot();
    let remaining = controller.remaining_time().as_secs();
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        uid: controller.uid().to_string(),
        counting: snapshot.counting,
        started_at: snapshot.start,
        deadline: snapshot.deadline,
        elapsed_seconds: controller.elapsed().as_secs(),
        remaining_seconds: remaining,
        remaining: format_duration(remaining),
        last_tick: controller.latest_tick().map(Into::into),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /history/:uid - List the user's timer records
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    match state.controller.fetch_history(&uid).await {
        Ok(records) => Ok(Json(HistoryResponse { uid, records })),
        Err(e) => {
            error!("Failed to fetch history for {}: {}", uid, e);
            Err(api_error(&e))
        }
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
