//! HTTP surface of the collector.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{store::TrafficStore, TrafficRecord};

/// Reasons an inbound record is refused. All of them map to `400 Bad Request`.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("invalid value at '{path}': {message}")]
    InvalidField { path: String, message: String },
    #[error("suspicious must be 0 or 1, got {0}")]
    InvalidSuspicious(u8),
}

impl IntoResponse for ReceiveError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "error": self.to_string(),
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Build the collector router around a shared store.
pub fn router(store: TrafficStore) -> Router {
    Router::new()
        .route("/receive", post(receive))
        .route("/data", get(list))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Any origin may call either endpoint. No credentials are involved.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Validate a request body and return both the typed view and the payload
/// exactly as received.
///
/// The body has to be a JSON object. Named fields, when present, must have the
/// right type; unknown fields are kept as they are. The typed view is only used
/// for validation and logging; the raw payload is what gets stored.
pub fn decode_record(body: &[u8]) -> Result<(TrafficRecord, Value), ReceiveError> {
    let payload: Value = serde_json::from_slice(body).map_err(ReceiveError::InvalidJson)?;
    if !payload.is_object() {
        return Err(ReceiveError::NotAnObject);
    }

    let record: TrafficRecord =
        serde_path_to_error::deserialize(&payload).map_err(|e| ReceiveError::InvalidField {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })?;

    match record.suspicious {
        Some(flag) if flag > 1 => Err(ReceiveError::InvalidSuspicious(flag)),
        _ => Ok((record, payload)),
    }
}

async fn receive(
    State(store): State<TrafficStore>,
    body: Bytes,
) -> Result<Json<Value>, ReceiveError> {
    let (record, payload) = match decode_record(&body) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "rejected record");
            return Err(e);
        }
    };

    let total = store.append(payload).await;
    tracing::info!(ip_address = %record.source(), total, "received record");

    Ok(Json(json!({ "status": "success" })))
}

async fn list(State(store): State<TrafficStore>) -> Json<Vec<Value>> {
    Json(store.snapshot().await)
}
