//! HTTP API handlers for Stove Watch.
//!
//! - **POST /location**: Assess a client's reported position against the
//!   current flame verdict.
//! - **GET /status**: Inspect the flame monitor.
//! - **GET /health**: Liveness check.
//!
//! Reported coordinates are used for one computation and never stored or
//! logged beyond the resulting distance.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::alert::{AlertEvaluator, AlertResult, InvalidReport, LocationReport};
use crate::geo::GeoCoordinate;
use crate::state::{FlameCell, VerdictSnapshot};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub verdicts: FlameCell,
    pub evaluator: AlertEvaluator,

    /// In-band pixel count the monitor's classifier must exceed.
    pub pixel_threshold: u64,
}

/// Errors returned to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid location report")]
    InvalidData,
}

impl From<InvalidReport> for ApiError {
    fn from(_: InvalidReport) -> Self {
        ApiError::InvalidData
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::InvalidData
    }
}

/// Body sent with a rejected report.
#[derive(Debug, Serialize)]
struct Rejection {
    alert: bool,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidData => (
                StatusCode::BAD_REQUEST,
                Json(Rejection {
                    alert: false,
                    message: "Invalid data",
                }),
            )
                .into_response(),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/location", post(post_location))
        .route("/status", get(get_status))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /location - Assess a reported position.
///
/// # Request Body
///
/// ```json
/// { "lat": 11.6854, "lon": 76.1320 }
/// ```
///
/// # Response
///
/// ```json
/// {
///     "alert": false,
///     "flame": true,
///     "distance": 3,
///     "message": "Safe. Flame: YES | Distance: 3m"
/// }
/// ```
///
/// Returns `400 Bad Request` with `{"alert": false, "message": "Invalid data"}`
/// when the body is not JSON or lacks `lat` or `lon`.
#[instrument(skip_all)]
pub async fn post_location(
    State(state): State<AppState>,
    payload: Result<Json<LocationReport>, JsonRejection>,
) -> Result<Json<AlertResult>, ApiError> {
    let Json(report) = payload.inspect_err(|e| {
        warn!(error = %e, "Rejected malformed location report");
    })?;

    let result = state
        .evaluator
        .evaluate_report(&state.verdicts, &report)
        .inspect_err(|_| warn!("Rejected location report without coordinates"))?;

    if result.alert {
        warn!(
            distance = result.distance,
            limit = state.evaluator.distance_limit_m(),
            "Flame detected while away from home"
        );
    } else {
        info!(
            flame = result.flame,
            distance = result.distance,
            "Location assessed"
        );
    }

    Ok(Json(result))
}

/// Response for GET /status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub monitor: VerdictSnapshot,
    pub home: GeoCoordinate,
    pub distance_limit_m: f64,
    pub pixel_threshold: u64,
}

/// GET /status - Current monitor state and alert settings.
#[instrument(skip(state))]
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        monitor: state.verdicts.snapshot(),
        home: state.evaluator.home(),
        distance_limit_m: state.evaluator.distance_limit_m(),
        pixel_threshold: state.pixel_threshold,
    })
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
