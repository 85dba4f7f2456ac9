//! Carrier status webhook handler.

use crate::{api_calls::ApiError, AppState};
use axum::extract::{Extension, Json};
use outvox_carrier::CallStatusWebhook;
use outvox_ledger::WebhookUpdate;
use serde_json::json;
use std::sync::Arc;

/// Handler for `POST /api/webhook/call-status`.
///
/// Applies the carrier's status report to the matching call. A webhook
/// that matches no call (already pruned, or a stale retry) is a 404;
/// carriers treat any response as delivered and do not retry forever.
pub async fn call_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(hook): Json<CallStatusWebhook>,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::debug!(?hook.call_id, ?hook.carrier_ref, status = ?hook.status, "carrier webhook");
    state
        .ledger
        .apply_webhook(WebhookUpdate {
            call_id: hook.call_id,
            carrier_ref: hook.carrier_ref,
            status: hook.status,
            duration_secs: hook.duration_secs,
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}
