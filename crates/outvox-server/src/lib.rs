//! Outvox server library logic.

pub mod api_calls;
pub mod api_media;
pub mod api_sse;
pub mod api_webhook;
pub mod config;

use axum::{
    routing::{any, get, post},
    Extension, Json, Router,
};
use outvox_carrier::CarrierClient;
use outvox_ledger::CallLedger;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// AI session settings shared by all media socket handlers.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub buffer_cap: usize,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative call table and dashboard broadcast channel.
    pub ledger: CallLedger,
    /// Carrier click-to-call client.
    pub carrier: Arc<CarrierClient>,
    /// AI realtime session settings.
    pub ai: AiSettings,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    // The dashboard is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/dial", post(api_calls::dial_handler))
        .route("/api/hangup", post(api_calls::hangup_handler))
        .route("/api/history", get(api_calls::history_handler))
        .route("/api/calls/{id}", get(api_calls::get_call_handler))
        .route(
            "/api/webhook/call-status",
            post(api_webhook::call_status_handler),
        )
        .route("/api/voice-answer", any(api_media::voice_answer_handler))
        .route("/ws/media", get(api_media::media_socket_handler))
        .route("/events/dashboard", get(api_sse::dashboard_stream_handler))
        .layer(Extension(Arc::new(state)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
