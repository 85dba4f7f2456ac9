//! Call control handlers: dial, hangup, history, record lookup.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use outvox_carrier::CarrierError;
use outvox_ledger::LedgerError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    CarrierRejected(String),
    #[error("carrier unreachable: {0}")]
    CarrierUnreachable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::CarrierRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::CarrierUnreachable(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::NotFound(e.to_string())
    }
}

/// Request body for `POST /api/dial`.
#[derive(Debug, Deserialize)]
pub struct DialRequest {
    pub phone: String,
    #[serde(default = "default_lead_name")]
    pub name: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_lead_name() -> String {
    "Valued Customer".to_string()
}

fn default_voice() -> String {
    "Puck".to_string()
}

/// Response body for a successful dial.
#[derive(Debug, Serialize)]
pub struct DialResponse {
    pub success: bool,
    #[serde(rename = "callId")]
    pub call_id: Uuid,
}

/// Handler for `POST /api/dial`.
///
/// Creates the call record first so the dashboard sees `dialing`
/// immediately, then asks the carrier to place the call.
pub async fn dial_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<DialRequest>,
) -> Result<Json<DialResponse>, ApiError> {
    let record = state
        .ledger
        .create_call(req.phone.clone(), req.name, req.voice)
        .await;

    match state.carrier.dial(&req.phone).await {
        Ok(outcome) => {
            state
                .ledger
                .dial_accepted(record.id, outcome.carrier_ref)
                .await?;
            Ok(Json(DialResponse {
                success: true,
                call_id: record.id,
            }))
        }
        Err(CarrierError::Rejected(message)) => {
            state.ledger.dial_rejected(record.id, &message).await?;
            Err(ApiError::CarrierRejected(message))
        }
        Err(e) => {
            state
                .ledger
                .dial_rejected(record.id, "carrier unreachable")
                .await?;
            Err(ApiError::CarrierUnreachable(e.to_string()))
        }
    }
}

/// Request body for `POST /api/hangup`.
#[derive(Debug, Deserialize)]
pub struct HangupRequest {
    #[serde(rename = "callId")]
    pub call_id: Uuid,
}

/// Handler for `POST /api/hangup`.
///
/// Marks the hangup locally and fires the carrier request in the
/// background; the response does not wait for the carrier.
pub async fn hangup_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<HangupRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .ledger
        .get(req.call_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown call: {}", req.call_id)))?;
    state.ledger.request_hangup(req.call_id).await?;

    if let Some(carrier_ref) = record.carrier_ref {
        let carrier = state.carrier.clone();
        tokio::spawn(async move {
            if let Err(e) = carrier.hangup(&carrier_ref).await {
                tracing::warn!(%carrier_ref, "carrier hangup request failed: {e}");
            }
        });
    }

    Ok(Json(json!({ "success": true })))
}

/// Handler for `GET /api/history`. Newest first.
pub async fn history_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<outvox_types::CallHistoryEntry>> {
    Json(state.ledger.history().await)
}

/// Handler for `GET /api/calls/{id}`.
pub async fn get_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<outvox_types::CallRecord>, ApiError> {
    state
        .ledger
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown call: {id}")))
}
