//! Media websocket handler and the carrier's XML answer document.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use outvox_carrier::StreamEvent;
use outvox_media::{connect_session, run_bridge, system_prompt, AiSessionConfig, BridgeEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-call channel capacity for bridge events and outbound frames.
const CHANNEL_CAPACITY: usize = 256;

/// Handler for `ALL /api/voice-answer`.
///
/// The carrier fetches this when the customer answers; the returned
/// XML tells it to open a media stream back to us. The stream URL is
/// derived from the request's Host header so the same deployment works
/// behind any public hostname.
pub async fn voice_answer_handler(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:3000");
    let scheme = if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "ws"
    } else {
        "wss"
    };
    let stream_url = format!("{scheme}://{host}/ws/media");

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Say>Connecting you to the AI agent.</Say>
    <Connect>
        <Stream url="{stream_url}" />
    </Connect>
</Response>"#
    );

    ([(header::CONTENT_TYPE, "text/xml")], xml).into_response()
}

/// Handler for `GET /ws/media`.
pub async fn media_socket_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_media_socket(state, socket))
}

/// Owns the carrier socket for one call: spawns the AI session and the
/// bridge, then pumps socket frames into the bridge until either side
/// ends the call.
async fn handle_media_socket(state: Arc<AppState>, socket: WebSocket) {
    // The carrier's stream does not carry our call id; attach to the
    // call most recently placed and still live.
    let Some(call) = state.ledger.active_call().await else {
        tracing::warn!("media socket opened with no live call; closing");
        return;
    };
    let call_id = call.id;
    tracing::info!(%call_id, "media socket opened");

    let (events_tx, events_rx) = mpsc::channel::<BridgeEvent>(CHANNEL_CAPACITY);
    let (telephony_tx, mut telephony_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let session_config = AiSessionConfig {
        endpoint: state.ai.endpoint.clone(),
        api_key: state.ai.api_key.clone(),
        model: state.ai.model.clone(),
        voice: call.voice_profile.clone(),
        system_prompt: system_prompt(&call.voice_profile, &call.lead_name),
    };
    let to_ai = match connect_session(&session_config, events_tx.clone()).await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!(%call_id, "could not open AI session: {e}");
            state.ledger.fail_call(call_id, "AI session unavailable").await;
            return;
        }
    };

    let bridge = tokio::spawn(run_bridge(
        call_id,
        state.ledger.clone(),
        events_rx,
        telephony_tx,
        to_ai,
        state.ai.buffer_cap,
    ));

    let (mut ws_tx, mut ws_rx) = socket.split();

    let write_task = tokio::spawn(async move {
        while let Some(json) = telephony_rx.recv().await {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<StreamEvent>(text.as_str()) {
                Ok(event) => {
                    if events_tx
                        .send(BridgeEvent::Telephony(event))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(%call_id, "unparseable media socket frame: {e}");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%call_id, "media socket read error: {e}");
                break;
            }
        }
    }

    let _ = events_tx.send(BridgeEvent::TelephonyClosed).await;
    drop(events_tx);
    if let Err(e) = bridge.await {
        tracing::error!(%call_id, "bridge task panicked: {e}");
    }
    write_task.abort();
    tracing::info!(%call_id, "media socket closed");
}
