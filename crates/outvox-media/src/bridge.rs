//! Per-call bridge coordinator.

use crate::{buffer::FrameBuffer, tools};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use outvox_carrier::{OutboundMediaFrame, StreamEvent};
use outvox_ledger::CallLedger;
use outvox_types::TranscriptSender;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Text nudge sent the moment the AI session is ready. The model is
/// instructed to open the conversation, but it only starts a turn once
/// it has received *some* input; on an outbound call the customer has
/// already said "hello" to a silent line by then.
pub const NUDGE_TEXT: &str = "Hello";

/// Delay before the single tool-response retry.
const TOOL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Input for the AI session's write loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AiInput {
    /// 16 kHz little-endian PCM bytes.
    Audio(Vec<u8>),
    Text(String),
    ToolResponse {
        id: String,
        name: String,
        result: String,
    },
}

/// Output of the AI session's read loop.
#[derive(Debug, Clone)]
pub enum AiEvent {
    /// Setup handshake finished; the session accepts realtime input.
    Ready,
    /// 24 kHz little-endian PCM bytes.
    Audio(Vec<u8>),
    ToolCall {
        id: String,
        name: String,
        args: Value,
    },
    Transcript {
        sender: TranscriptSender,
        text: String,
    },
    Closed,
    Error(String),
}

/// Everything the bridge reacts to, from either side of the call.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Telephony(StreamEvent),
    /// The carrier websocket dropped without a `stop` frame.
    TelephonyClosed,
    Ai(AiEvent),
}

/// Runs the bridge for one call until either side ends it.
///
/// `to_telephony` carries serialized media envelopes for the carrier
/// socket's write loop; `to_ai` feeds the AI session client. Both are
/// bounded. Steady-state audio is sent without blocking and a full
/// queue drops the frame with a warning; the one-time flush of
/// pre-ready frames instead awaits the session so none are lost.
///
/// Lifecycle consequences (connect, complete, fail) are reported to
/// the ledger, which owns exactly-once finalization.
pub async fn run_bridge(
    call_id: Uuid,
    ledger: CallLedger,
    mut events: mpsc::Receiver<BridgeEvent>,
    to_telephony: mpsc::Sender<String>,
    to_ai: mpsc::Sender<AiInput>,
    buffer_cap: usize,
) {
    let mut stream_sid: Option<String> = None;
    let mut ai_ready = false;
    let mut buffer = FrameBuffer::new(buffer_cap);

    while let Some(event) = events.recv().await {
        match event {
            BridgeEvent::Telephony(StreamEvent::Start { start }) => {
                tracing::info!(%call_id, stream_sid = %start.stream_sid, "media stream started");
                stream_sid = Some(start.stream_sid);
                buffer.clear();
                ledger.media_connected(call_id).await;
            }
            BridgeEvent::Telephony(StreamEvent::Media { media }) => {
                let ulaw = match BASE64.decode(&media.payload) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(%call_id, "discarding undecodable media payload: {e}");
                        continue;
                    }
                };
                let pcm_16k = outvox_codec::telephony_to_ai(&ulaw);
                if ai_ready {
                    forward_to_ai(&to_ai, AiInput::Audio(pcm_16k), call_id);
                } else if let Err(e) = buffer.push(pcm_16k) {
                    tracing::error!(%call_id, "{e}");
                    ledger.fail_call(call_id, "pre-ready audio buffer overflow").await;
                    return;
                }
            }
            BridgeEvent::Telephony(StreamEvent::Stop) | BridgeEvent::TelephonyClosed => {
                tracing::info!(%call_id, "telephony side closed");
                ledger.media_closed(call_id).await;
                return;
            }
            BridgeEvent::Telephony(StreamEvent::Ignored) => {}
            BridgeEvent::Ai(AiEvent::Ready) => {
                ai_ready = true;
                // The nudge and the flush must arrive complete and in
                // order; the buffer can hold more frames than the
                // session channel, so these sends block on the session
                // instead of dropping. The drop-on-full policy applies
                // only to the steady-state pump below.
                if to_ai
                    .send(AiInput::Text(NUDGE_TEXT.to_string()))
                    .await
                    .is_err()
                {
                    tracing::warn!(%call_id, "AI session input closed before nudge");
                    continue;
                }
                let frames = buffer.drain();
                if !frames.is_empty() {
                    tracing::info!(%call_id, count = frames.len(), "flushing buffered audio frames");
                }
                for frame in frames {
                    if to_ai.send(AiInput::Audio(frame)).await.is_err() {
                        tracing::warn!(%call_id, "AI session input closed mid-flush");
                        break;
                    }
                }
            }
            BridgeEvent::Ai(AiEvent::Audio(pcm_24k)) => {
                let Some(sid) = stream_sid.as_deref() else {
                    tracing::debug!(%call_id, "AI audio before stream start; dropping");
                    continue;
                };
                let ulaw = match outvox_codec::ai_to_telephony(&pcm_24k) {
                    Ok(ulaw) => ulaw,
                    Err(e) => {
                        tracing::warn!(%call_id, "discarding malformed AI audio: {e}");
                        continue;
                    }
                };
                let frame = OutboundMediaFrame::new(sid, BASE64.encode(&ulaw));
                match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if to_telephony.try_send(json).is_err() {
                            tracing::warn!(%call_id, "dropping outbound audio frame for slow carrier socket");
                        }
                    }
                    Err(e) => tracing::warn!(%call_id, "could not serialize media envelope: {e}"),
                }
            }
            BridgeEvent::Ai(AiEvent::ToolCall { id, name, args }) => {
                tracing::info!(%call_id, tool = %name, "tool call");
                let result = tools::dispatch(&ledger, call_id, &name, args).await;
                send_tool_response(&to_ai, call_id, id, name, result).await;
            }
            BridgeEvent::Ai(AiEvent::Transcript { sender, text }) => {
                ledger.transcript(call_id, sender, text);
            }
            BridgeEvent::Ai(AiEvent::Closed) => {
                tracing::info!(%call_id, "AI session closed");
                ledger.media_closed(call_id).await;
                return;
            }
            BridgeEvent::Ai(AiEvent::Error(e)) => {
                tracing::error!(%call_id, "AI session error: {e}");
                ledger.fail_call(call_id, &e).await;
                return;
            }
        }
    }
    // Both producers dropped without a close event.
    ledger.media_closed(call_id).await;
}

fn forward_to_ai(to_ai: &mpsc::Sender<AiInput>, input: AiInput, call_id: Uuid) {
    if to_ai.try_send(input).is_err() {
        tracing::warn!(%call_id, "dropping frame for slow AI session");
    }
}

/// Tool responses must reach the session or the conversation stalls,
/// so unlike audio they get one retry before giving up.
async fn send_tool_response(
    to_ai: &mpsc::Sender<AiInput>,
    call_id: Uuid,
    id: String,
    name: String,
    result: String,
) {
    let response = AiInput::ToolResponse { id, name, result };
    if to_ai.try_send(response.clone()).is_ok() {
        return;
    }
    tokio::time::sleep(TOOL_RETRY_DELAY).await;
    if to_ai.try_send(response).is_err() {
        tracing::error!(%call_id, "tool response could not be delivered; conversation may stall");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outvox_carrier::{MediaPayload, StreamStart};
    use outvox_types::CallStatus;
    use serde_json::json;
    use tokio::task::JoinHandle;

    struct Harness {
        call_id: Uuid,
        ledger: CallLedger,
        events_tx: mpsc::Sender<BridgeEvent>,
        telephony_rx: mpsc::Receiver<String>,
        ai_rx: mpsc::Receiver<AiInput>,
        bridge: JoinHandle<()>,
    }

    async fn harness(buffer_cap: usize) -> Harness {
        let ledger = CallLedger::new(Duration::from_secs(5));
        let call_id = ledger
            .create_call("+919876543210".into(), "Aditi".into(), "Kore".into())
            .await
            .id;
        let (events_tx, events_rx) = mpsc::channel(64);
        let (telephony_tx, telephony_rx) = mpsc::channel(64);
        let (ai_tx, ai_rx) = mpsc::channel(64);
        let bridge = tokio::spawn(run_bridge(
            call_id,
            ledger.clone(),
            events_rx,
            telephony_tx,
            ai_tx,
            buffer_cap,
        ));
        Harness {
            call_id,
            ledger,
            events_tx,
            telephony_rx,
            ai_rx,
            bridge,
        }
    }

    fn start_event(sid: &str) -> BridgeEvent {
        BridgeEvent::Telephony(StreamEvent::Start {
            start: StreamStart {
                stream_sid: sid.to_string(),
            },
        })
    }

    fn media_event(ulaw: &[u8]) -> BridgeEvent {
        BridgeEvent::Telephony(StreamEvent::Media {
            media: MediaPayload {
                payload: BASE64.encode(ulaw),
            },
        })
    }

    #[tokio::test]
    async fn buffers_until_ready_then_nudges_and_flushes_in_order() {
        let mut h = harness(8).await;
        h.events_tx.send(start_event("MZ1")).await.unwrap();
        h.events_tx.send(media_event(&[0xFF, 0xFF])).await.unwrap();
        h.events_tx.send(media_event(&[0x7F, 0x7F])).await.unwrap();
        h.events_tx
            .send(BridgeEvent::Ai(AiEvent::Ready))
            .await
            .unwrap();

        assert_eq!(
            h.ai_rx.recv().await.unwrap(),
            AiInput::Text(NUDGE_TEXT.to_string())
        );
        assert_eq!(
            h.ai_rx.recv().await.unwrap(),
            AiInput::Audio(outvox_codec::telephony_to_ai(&[0xFF, 0xFF]))
        );
        assert_eq!(
            h.ai_rx.recv().await.unwrap(),
            AiInput::Audio(outvox_codec::telephony_to_ai(&[0x7F, 0x7F]))
        );

        // After the flush, frames bypass the buffer.
        h.events_tx.send(media_event(&[0xEF])).await.unwrap();
        assert_eq!(
            h.ai_rx.recv().await.unwrap(),
            AiInput::Audio(outvox_codec::telephony_to_ai(&[0xEF]))
        );
        h.bridge.abort();
    }

    #[tokio::test]
    async fn flush_loses_nothing_when_the_buffer_outgrows_the_session_channel() {
        let ledger = CallLedger::new(Duration::from_secs(5));
        let call_id = ledger
            .create_call("+919876543210".into(), "Aditi".into(), "Kore".into())
            .await
            .id;
        let (events_tx, events_rx) = mpsc::channel(64);
        let (telephony_tx, _telephony_rx) = mpsc::channel(64);
        // A session channel far smaller than the buffered backlog.
        let (ai_tx, mut ai_rx) = mpsc::channel(4);
        let bridge = tokio::spawn(run_bridge(
            call_id,
            ledger,
            events_rx,
            telephony_tx,
            ai_tx,
            64,
        ));

        events_tx.send(start_event("MZ1")).await.unwrap();
        for i in 0..32u8 {
            events_tx.send(media_event(&[i])).await.unwrap();
        }
        events_tx
            .send(BridgeEvent::Ai(AiEvent::Ready))
            .await
            .unwrap();

        assert_eq!(
            ai_rx.recv().await.unwrap(),
            AiInput::Text(NUDGE_TEXT.to_string())
        );
        for i in 0..32u8 {
            assert_eq!(
                ai_rx.recv().await.unwrap(),
                AiInput::Audio(outvox_codec::telephony_to_ai(&[i])),
                "frame {i} lost or out of order"
            );
        }
        bridge.abort();
    }

    #[tokio::test]
    async fn ai_audio_is_wrapped_in_a_sid_envelope() {
        let mut h = harness(8).await;
        h.events_tx.send(start_event("MZ42")).await.unwrap();

        // Three 24 kHz samples decimate to one 8 kHz sample.
        let pcm_24k = vec![0u8, 0, 1, 0, 2, 0];
        let expected_ulaw = outvox_codec::ai_to_telephony(&pcm_24k).unwrap();
        h.events_tx
            .send(BridgeEvent::Ai(AiEvent::Audio(pcm_24k)))
            .await
            .unwrap();

        let json: Value = serde_json::from_str(&h.telephony_rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ42");
        let payload = json["media"]["payload"].as_str().unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), expected_ulaw);
        h.bridge.abort();
    }

    #[tokio::test]
    async fn ai_audio_before_start_is_dropped() {
        let mut h = harness(8).await;
        h.events_tx
            .send(BridgeEvent::Ai(AiEvent::Audio(vec![0, 0, 0, 0, 0, 0])))
            .await
            .unwrap();
        h.events_tx.send(start_event("MZ1")).await.unwrap();
        h.events_tx
            .send(BridgeEvent::Telephony(StreamEvent::Stop))
            .await
            .unwrap();
        h.bridge.await.unwrap();
        assert!(h.telephony_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn buffer_overflow_fails_the_call() {
        let h = harness(2).await;
        h.events_tx.send(start_event("MZ1")).await.unwrap();
        for _ in 0..3 {
            h.events_tx.send(media_event(&[0xFF])).await.unwrap();
        }
        h.bridge.await.unwrap();
        let record = h.ledger.get(h.call_id).await.unwrap();
        assert_eq!(record.status, CallStatus::Failed);
    }

    #[tokio::test]
    async fn stop_completes_the_call() {
        let h = harness(8).await;
        h.events_tx.send(start_event("MZ1")).await.unwrap();
        h.events_tx
            .send(BridgeEvent::Telephony(StreamEvent::Stop))
            .await
            .unwrap();
        h.bridge.await.unwrap();
        let record = h.ledger.get(h.call_id).await.unwrap();
        assert_eq!(record.status, CallStatus::Completed);
    }

    #[tokio::test]
    async fn ai_error_fails_the_call() {
        let h = harness(8).await;
        h.events_tx.send(start_event("MZ1")).await.unwrap();
        h.events_tx
            .send(BridgeEvent::Ai(AiEvent::Error("quota exceeded".into())))
            .await
            .unwrap();
        h.bridge.await.unwrap();
        let record = h.ledger.get(h.call_id).await.unwrap();
        assert_eq!(record.status, CallStatus::Failed);
    }

    #[tokio::test]
    async fn every_tool_call_gets_a_response() {
        let mut h = harness(8).await;
        h.events_tx
            .send(BridgeEvent::Ai(AiEvent::ToolCall {
                id: "fc-1".into(),
                name: "no_such_tool".into(),
                args: json!({}),
            }))
            .await
            .unwrap();
        match h.ai_rx.recv().await.unwrap() {
            AiInput::ToolResponse { id, name, result } => {
                assert_eq!(id, "fc-1");
                assert_eq!(name, "no_such_tool");
                assert!(result.starts_with("Error"));
            }
            other => panic!("unexpected input: {other:?}"),
        }
        h.bridge.abort();
    }

    #[tokio::test]
    async fn start_marks_the_call_connected() {
        let h = harness(8).await;
        h.events_tx.send(start_event("MZ1")).await.unwrap();
        // Give the bridge a tick to process the event.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let record = h.ledger.get(h.call_id).await.unwrap();
        assert_eq!(record.status, CallStatus::Connected);
        assert!(record.connected_at.is_some());
        h.bridge.abort();
    }
}
