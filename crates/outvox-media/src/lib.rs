//! The audio bridge: everything between the carrier's media socket and
//! the AI realtime session.
//!
//! One bridge task runs per call. The server's websocket handler and
//! the AI session client both feed it typed [`BridgeEvent`]s over a
//! single mpsc channel; the bridge owns all cross-stream state (stream
//! SID, readiness, the pre-ready frame buffer) so neither read loop
//! needs shared mutable state or callbacks into the other.

mod bridge;
mod buffer;
mod prompt;
mod session;
mod tools;

pub use bridge::{run_bridge, AiEvent, AiInput, BridgeEvent, NUDGE_TEXT};
pub use buffer::{FrameBuffer, DEFAULT_FRAME_CAP};
pub use prompt::{agent_name, system_prompt};
pub use session::{connect_session, AiSessionConfig};

use thiserror::Error;

/// Errors raised by the media pipeline.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The pre-ready frame buffer hit its cap. The call is failed
    /// rather than letting the buffer grow without bound.
    #[error("frame buffer overflow at {0} frames")]
    BufferOverflow(usize),
    #[error("AI session transport error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
}
