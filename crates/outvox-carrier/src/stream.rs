//! Media socket wire envelope.
//!
//! The carrier streams call audio over a websocket as JSON text frames.
//! Payloads are base64 μ-law at 8 kHz; field names are the carrier's
//! camelCase.

use serde::{Deserialize, Serialize};

/// An inbound frame from the carrier's media socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// First frame of a stream; carries the stream SID every outbound
    /// frame must echo.
    Start { start: StreamStart },
    /// One frame of caller audio.
    Media { media: MediaPayload },
    /// The carrier is ending the stream.
    Stop,
    /// Any event type we do not act on (`connected`, `mark`, ...).
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamStart {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded μ-law bytes.
    pub payload: String,
}

/// An outbound audio frame toward the carrier.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMediaFrame {
    event: &'static str,
    #[serde(rename = "streamSid")]
    stream_sid: String,
    media: MediaPayload,
}

impl OutboundMediaFrame {
    pub fn new(stream_sid: impl Into<String>, payload_b64: impl Into<String>) -> Self {
        Self {
            event: "media",
            stream_sid: stream_sid.into(),
            media: MediaPayload {
                payload: payload_b64.into(),
            },
        }
    }
}
