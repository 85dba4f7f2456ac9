use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use outvox_carrier::CarrierClient;
use outvox_ledger::CallLedger;
use outvox_server::{app, AiSettings, AppState};
use outvox_types::CallStatus;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// A stand-in AI session endpoint: acknowledges setup, and answers the
/// opening text nudge with one audio frame plus a transcript line.
async fn stub_ai() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

                let setup = ws.next().await.unwrap().unwrap();
                let setup: Value = serde_json::from_str(setup.to_text().unwrap()).unwrap();
                assert!(setup.get("setup").is_some(), "first frame must be setup");

                ws.send(Message::Text(r#"{"setupComplete":{}}"#.to_string()))
                    .await
                    .unwrap();

                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame.pointer("/realtimeInput/text").is_some() {
                        let reply = json!({
                            "serverContent": {
                                "modelTurn": {
                                    "parts": [{
                                        "inlineData": {
                                            "mimeType": "audio/pcm;rate=24000",
                                            "data": BASE64.encode([0u8, 0, 1, 0, 2, 0])
                                        }
                                    }]
                                },
                                "outputTranscription": { "text": "Namaste!" }
                            }
                        });
                        ws.send(Message::Text(reply.to_string())).await.unwrap();
                    }
                }
            });
        }
    });
    format!("ws://{addr}/session")
}

async fn start_server(ai_endpoint: String) -> (String, AppState) {
    let state = AppState {
        ledger: CallLedger::new(Duration::from_secs(5)),
        carrier: Arc::new(CarrierClient::new("http://127.0.0.1:1", "test-key")),
        ai: AiSettings {
            endpoint: ai_endpoint,
            api_key: "test".to_string(),
            model: "test-model".to_string(),
            buffer_cap: 16,
        },
    };
    let app = app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("{addr}"), state)
}

async fn recv_text(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> Option<String> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for websocket frame")?;
        match frame.expect("websocket error") {
            Message::Text(text) => return Some(text),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn media_stream_bridges_audio_both_ways() {
    let ai = stub_ai().await;
    let (addr, state) = start_server(ai).await;

    let record = state
        .ledger
        .create_call("+919876543210".into(), "Aditi".into(), "Kore".into())
        .await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/media")).await.unwrap();
    ws.send(Message::Text(
        json!({ "event": "start", "start": { "streamSid": "MZ9" } }).to_string(),
    ))
    .await
    .unwrap();
    // Caller audio that arrives while the AI handshake is in flight.
    ws.send(Message::Text(
        json!({ "event": "media", "media": { "payload": BASE64.encode([0xFFu8; 160]) } })
            .to_string(),
    ))
    .await
    .unwrap();

    // The nudge answer comes back converted to a carrier media frame.
    let frame = recv_text(&mut ws).await.expect("expected outbound media");
    let frame: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(frame["event"], "media");
    assert_eq!(frame["streamSid"], "MZ9");
    let payload = BASE64
        .decode(frame["media"]["payload"].as_str().unwrap())
        .unwrap();
    let expected = outvox_codec::ai_to_telephony(&[0, 0, 1, 0, 2, 0]).unwrap();
    assert_eq!(payload, expected);

    let connected = state.ledger.get(record.id).await.unwrap();
    assert_eq!(connected.status, CallStatus::Connected);

    ws.send(Message::Text(json!({ "event": "stop" }).to_string()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let finished = state.ledger.get(record.id).await.unwrap();
    assert_eq!(finished.status, CallStatus::Completed);
    assert_eq!(state.ledger.history().await.len(), 1);
}

#[tokio::test]
async fn socket_without_live_call_is_closed() {
    let ai = stub_ai().await;
    let (addr, _state) = start_server(ai).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/media")).await.unwrap();
    // No call was dialed; the handler closes immediately.
    assert!(recv_text(&mut ws).await.is_none());
}

#[tokio::test]
async fn unreachable_ai_endpoint_fails_the_call() {
    let (addr, state) = start_server("ws://127.0.0.1:1/unused".to_string()).await;
    let record = state
        .ledger
        .create_call("+919876543210".into(), "Aditi".into(), "Kore".into())
        .await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/media")).await.unwrap();
    assert!(recv_text(&mut ws).await.is_none());

    let failed = state.ledger.get(record.id).await.unwrap();
    assert_eq!(failed.status, CallStatus::Failed);
    let history = state.ledger.history().await;
    assert_eq!(history.len(), 1);
    // The call never connected, so no talk time is recorded.
    assert_eq!(history[0].duration_secs, 0);
}
