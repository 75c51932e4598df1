//! REST API for the vision frontend and the motor controller
//!
//! The frontend posts detections, the ESP32 polls the latest command.
//! Default port: 5000

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::error::{RelayError, RelayResult};
use crate::state::{DetectionState, PositionReport, StateStore};

/// Default API port
pub const DEFAULT_API_PORT: u16 = 5000;

/// Shared state for API handlers
pub struct ApiState {
    /// The relay's detection record
    pub store: Arc<StateStore>,
    /// Whether the auto-reset watchdog is running
    pub auto_reset_enabled: bool,
    /// Staleness limit reported by `/api/status`
    pub auto_reset_seconds: f64,
}

/// Request body for `POST /api/detection`
#[derive(Debug, Deserialize)]
pub struct DetectionRequest {
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub object_detected: bool,
}

/// Request body for `POST /api/manual`
#[derive(Debug, Deserialize)]
pub struct ManualRequest {
    #[serde(default = "default_position")]
    pub position: String,
}

fn default_position() -> String {
    "STOP".to_string()
}

/// Response for a successful detection update
#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub message: String,
    pub current_state: DetectionState,
}

/// Response for `GET /api/status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub detection_state: DetectionState,
    pub auto_reset_enabled: bool,
    pub auto_reset_seconds: f64,
}

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidArgument(error) => Self {
                status: StatusCode::BAD_REQUEST,
                error,
            },
            RelayError::Internal(error) => {
                error!("Request failed: {}", error);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error,
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.error })).into_response()
    }
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/position", get(get_position))
        .route("/api/detection", post(update_detection))
        .route("/api/status", get(get_status))
        .route("/api/manual", post(manual_control))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// GET / - API status and endpoint listing
async fn home() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "message": "Accessibility Vest Relay Backend",
        "endpoints": {
            "GET /api/position": "Get current motor command for ESP32",
            "POST /api/detection": "Receive detection data from frontend",
            "GET /api/status": "Get full system status",
            "POST /api/manual": "Set motor command manually for testing"
        }
    }))
}

/// GET /api/position - Polled by the ESP32 for the current motor command
async fn get_position(State(state): State<Arc<ApiState>>) -> Json<PositionReport> {
    let report = state.store.read().position_report();
    debug!("Position polled: {}", report.position);
    Json(report)
}

/// POST /api/detection - Detection data from the frontend
async fn update_detection(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<DetectionResponse>, ApiError> {
    let req: DetectionRequest = parse_body(&body, false)?;

    let current_state = state
        .store
        .write(&req.position, req.confidence, req.object_detected)?;

    info!(
        "Detection update: position={}, confidence={:.2}, object={}",
        current_state.position, req.confidence, req.object_detected
    );

    Ok(Json(DetectionResponse {
        success: true,
        message: "Detection data updated".to_string(),
        current_state,
    }))
}

/// GET /api/status - Full system status
async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        detection_state: state.store.read(),
        auto_reset_enabled: state.auto_reset_enabled,
        auto_reset_seconds: state.auto_reset_seconds,
    })
}

/// POST /api/manual - Manual motor control for testing
async fn manual_control(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req: ManualRequest = parse_body(&body, true)?;
    let updated = state.store.manual_write(&req.position)?;

    info!("Manual position set to: {}", updated.position);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Motors set to {}", updated.position)
    })))
}

/// Decode a JSON object body
///
/// An absent, blank or `null` body is rejected as "No data provided", as is
/// `{}` unless `allow_empty_object` is set. Anything that is not a JSON
/// object, or has mistyped fields, is rejected as invalid input.
fn parse_body<T: DeserializeOwned>(body: &[u8], allow_empty_object: bool) -> RelayResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RelayError::invalid("No data provided"));
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::invalid(format!("Invalid JSON body: {}", e)))?;

    match &value {
        serde_json::Value::Null => return Err(RelayError::invalid("No data provided")),
        serde_json::Value::Object(map) if map.is_empty() && !allow_empty_object => {
            return Err(RelayError::invalid("No data provided"))
        }
        serde_json::Value::Object(_) => {}
        _ => return Err(RelayError::invalid("Request body must be a JSON object")),
    }

    serde_json::from_value(value)
        .map_err(|e| RelayError::invalid(format!("Invalid request body: {}", e)))
}

/// Turn a handler panic into a 500 `{error}` response
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };

    ApiError::from(RelayError::internal(detail)).into_response()
}

/// Start the API server, serving until `shutdown` resolves
pub async fn start_server(
    state: Arc<ApiState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = build_router(state);

    info!("Starting relay API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
