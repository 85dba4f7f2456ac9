//! The call ledger: authoritative in-memory table of call records.
//!
//! All three asynchronous signal sources — the dial HTTP response, the
//! carrier status webhook, and the media socket's own open/close events
//! — funnel into this crate, which reconciles them into one
//! authoritative [`outvox_types::CallStatus`] per call. Every mutation
//! is pushed to dashboard observers over a `tokio::sync::broadcast`
//! channel; slow or absent observers never block an update.
//!
//! The central invariant: exactly one finalization (transition into
//! `completed`/`failed`) is ever recorded into call history per call
//! id, no matter how many terminal triggers race. All read-modify-write
//! goes through a single async mutex, and the terminal status itself is
//! the finalization latch.

mod ledger;

pub use ledger::{CallLedger, WebhookUpdate};

use thiserror::Error;

/// Errors raised by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No call matched the given local id or carrier reference.
    #[error("unknown call: {0}")]
    UnknownCall(String),
}
