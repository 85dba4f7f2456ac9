//! Telephony carrier boundary: REST click-to-call client, status
//! webhook payloads, and the media-stream wire envelope.
//!
//! Everything that knows the carrier's wire formats lives here so the
//! rest of the workspace deals only in typed events. The media socket
//! envelope is the carrier's JSON framing (`start`/`media`/`stop`,
//! base64 μ-law payloads, camelCase `streamSid`).

mod client;
mod stream;
mod webhook;

pub use client::{CarrierClient, DialOutcome};
pub use stream::{MediaPayload, OutboundMediaFrame, StreamEvent, StreamStart};
pub use webhook::CallStatusWebhook;

use thiserror::Error;

/// Errors raised while talking to the carrier's REST API.
#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("carrier request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The carrier answered but declined to place the call.
    #[error("carrier rejected the call: {0}")]
    Rejected(String),
}
