//! Realtime AI session client.
//!
//! Speaks the bidirectional generate-content websocket protocol: one
//! `setup` frame, a `setupComplete` acknowledgement, then interleaved
//! `realtimeInput` / `serverContent` / `toolCall` / `toolResponse`
//! JSON frames. The socket is split into a write task fed by an
//! [`AiInput`] channel and a read task that emits [`BridgeEvent`]s.

use crate::{
    bridge::{AiEvent, AiInput, BridgeEvent},
    tools, MediaError,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use outvox_types::TranscriptSender;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Capacity of the input channel toward the session. Full-queue sends
/// are dropped by the bridge, never blocked on.
const INPUT_CHANNEL_CAPACITY: usize = 256;

/// Connection settings for one AI session.
#[derive(Debug, Clone)]
pub struct AiSessionConfig {
    /// Websocket endpoint, without the key query parameter.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Prebuilt synthesis voice id.
    pub voice: String,
    pub system_prompt: String,
}

/// Opens an AI session and spawns its read and write loops.
///
/// Returns the input sender; the session reports everything else
/// (readiness, audio, tool calls, closure) through `events`. Dropping
/// the sender closes the session.
pub async fn connect_session(
    config: &AiSessionConfig,
    events: mpsc::Sender<BridgeEvent>,
) -> Result<mpsc::Sender<AiInput>, MediaError> {
    let url = format!("{}?key={}", config.endpoint, config.api_key);
    let (ws, _) = connect_async(url).await?;
    let (mut write, mut read) = ws.split();
    write.send(Message::Text(setup_message(config))).await?;
    tracing::info!(model = %config.model, voice = %config.voice, "AI session opened");

    let (input_tx, mut input_rx) = mpsc::channel::<AiInput>(INPUT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(input) = input_rx.recv().await {
            if let Err(e) = write.send(Message::Text(serialize_input(&input))).await {
                tracing::warn!("AI session write failed: {e}");
                break;
            }
        }
        let _ = write.send(Message::Close(None)).await;
    });

    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                // The service also delivers JSON in binary frames.
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("non-UTF-8 binary frame from AI session: {e}");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    let _ = events
                        .send(BridgeEvent::Ai(AiEvent::Error(e.to_string())))
                        .await;
                    return;
                }
            };
            for event in parse_server_message(&text) {
                if events.send(BridgeEvent::Ai(event)).await.is_err() {
                    // Bridge is gone; stop reading.
                    return;
                }
            }
        }
        let _ = events.send(BridgeEvent::Ai(AiEvent::Closed)).await;
    });

    Ok(input_tx)
}

fn setup_message(config: &AiSessionConfig) -> String {
    json!({
        "setup": {
            "model": format!("models/{}", config.model),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": config.voice } }
                }
            },
            "systemInstruction": { "parts": [{ "text": config.system_prompt }] },
            "tools": [{ "functionDeclarations": tools::declarations() }],
            "inputAudioTranscription": {},
            "outputAudioTranscription": {}
        }
    })
    .to_string()
}

fn serialize_input(input: &AiInput) -> String {
    match input {
        AiInput::Audio(pcm_16k) => json!({
            "realtimeInput": {
                "mediaChunks": [{
                    "mimeType": "audio/pcm;rate=16000",
                    "data": BASE64.encode(pcm_16k)
                }]
            }
        }),
        AiInput::Text(text) => json!({ "realtimeInput": { "text": text } }),
        AiInput::ToolResponse { id, name, result } => json!({
            "toolResponse": {
                "functionResponses": [{
                    "id": id,
                    "name": name,
                    "response": { "result": result }
                }]
            }
        }),
    }
    .to_string()
}

/// Translates one server frame into bridge events. A single frame can
/// carry audio, transcriptions, and tool calls at once.
fn parse_server_message(raw: &str) -> Vec<AiEvent> {
    let msg: Value = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("unparseable AI session frame: {e}");
            return Vec::new();
        }
    };
    let mut out = Vec::new();

    if msg.get("setupComplete").is_some() {
        out.push(AiEvent::Ready);
    }
    if let Some(data) = msg
        .pointer("/serverContent/modelTurn/parts/0/inlineData/data")
        .and_then(Value::as_str)
    {
        match BASE64.decode(data) {
            Ok(pcm_24k) => out.push(AiEvent::Audio(pcm_24k)),
            Err(e) => tracing::warn!("undecodable AI audio payload: {e}"),
        }
    }
    if let Some(text) = msg
        .pointer("/serverContent/inputTranscription/text")
        .and_then(Value::as_str)
    {
        out.push(AiEvent::Transcript {
            sender: TranscriptSender::User,
            text: text.to_string(),
        });
    }
    if let Some(text) = msg
        .pointer("/serverContent/outputTranscription/text")
        .and_then(Value::as_str)
    {
        out.push(AiEvent::Transcript {
            sender: TranscriptSender::Agent,
            text: text.to_string(),
        });
    }
    if let Some(calls) = msg.pointer("/toolCall/functionCalls").and_then(Value::as_array) {
        for call in calls {
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
            out.push(AiEvent::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                args: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }
    out
}
