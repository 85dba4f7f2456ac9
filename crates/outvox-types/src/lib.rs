//! Shared types and constants for the outvox platform.
//!
//! This crate provides the foundational types used across all outvox
//! crates: call lifecycle enums, the call record and history entry
//! structures, and the dashboard event payloads broadcast to UI
//! observers.
//!
//! No crate in the workspace depends on anything *except* `outvox-types`
//! for cross-cutting type definitions. This keeps the dependency graph
//! clean and prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The authoritative status of a call, owned by the call ledger.
///
/// Transitions follow `dialing → ringing → connected → disconnecting →
/// completed`, with `failed` reachable from `dialing` and `ringing`.
/// Once a terminal status is recorded it never regresses; events that
/// would move the status backward are discarded by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// The dial request was issued; the carrier has not accepted yet.
    Dialing,
    /// The carrier accepted and the customer's phone is ringing.
    Ringing,
    /// Audio is flowing (webhook "answered" or media socket open).
    Connected,
    /// The operator requested a hangup; awaiting carrier confirmation.
    Disconnecting,
    /// The call ended normally.
    Completed,
    /// The call never connected or was torn down on error.
    Failed,
}

impl CallStatus {
    /// Returns true for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the lowercase wire label for this status.
    pub fn label(self) -> &'static str {
        match self {
            Self::Dialing => "dialing",
            Self::Ringing => "ringing",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Who ended the call, recorded exactly once at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndedBy {
    /// The AI agent (or the operator acting for it) hung up.
    Agent,
    /// The customer hung up or the carrier reported a customer-side end.
    Customer,
    /// The customer was unreachable (busy, no answer).
    Network,
    /// The cause could not be determined.
    Unknown,
}

/// Business outcome of a call, set by the tool dispatcher or an
/// operator's post-call form. Wire spellings match the CRM vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    #[serde(rename = "Meeting Booked")]
    MeetingBooked,
    #[serde(rename = "Follow-up")]
    FollowUp,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Voicemail")]
    Voicemail,
    #[serde(rename = "Call Later")]
    CallLater,
    #[serde(rename = "Call Finished")]
    CallFinished,
    #[serde(rename = "Failed")]
    Failed,
}

/// Caller sentiment as judged by the AI agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Meeting format for the schedule-meeting tool.
///
/// The legacy labels used by earlier agent prompts are accepted as
/// deserialization aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    #[serde(alias = "Google Meet")]
    Virtual,
    #[serde(alias = "Office Visit")]
    InPerson,
}

impl MeetingType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Virtual => "virtual",
            Self::InPerson => "in-person",
        }
    }
}

/// Call status codes reported by the carrier's webhook.
///
/// `Ringing` and `Answered` are progress signals; everything else is
/// terminal and always finalizes the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CarrierCallStatus {
    Ringing,
    Answered,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Rejected,
    Canceled,
}

impl CarrierCallStatus {
    /// Returns true if this code ends the call.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ringing | Self::Answered)
    }
}

/// A call record: the single source of truth for one outbound call.
///
/// Created by the dial operation, mutated only by the lifecycle
/// reconciler and the tool dispatcher (both funneled through the
/// ledger), archived into call history at finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Locally generated identifier, stable for the call's lifetime.
    pub id: Uuid,
    /// Identifier assigned by the carrier once the dial is accepted.
    /// May arrive after `id` — a webhook can reference the call before
    /// the dial HTTP response completes.
    pub carrier_ref: Option<String>,
    pub status: CallStatus,
    /// When the dial request was issued.
    pub started_at: DateTime<Utc>,
    /// Set exactly once, on the first event that proves audio is
    /// flowing (webhook "answered" or media socket open).
    pub connected_at: Option<DateTime<Utc>>,
    /// Set exactly once at finalization.
    pub ended_by: Option<EndedBy>,
    /// Marked by an operator hangup request; consumed by finalization.
    pub pending_hangup_by: Option<EndedBy>,
    /// Immutable dial-time context used to render the agent persona.
    pub voice_profile: String,
    pub lead_name: String,
    pub phone: String,
    /// Human-readable status line shown on the dashboard.
    pub message: Option<String>,
    pub outcome: Option<CallOutcome>,
    pub sentiment: Option<Sentiment>,
    pub notes: Option<String>,
}

impl CallRecord {
    /// Creates a fresh record in `dialing` state.
    pub fn new(id: Uuid, phone: String, lead_name: String, voice_profile: String) -> Self {
        Self {
            id,
            carrier_ref: None,
            status: CallStatus::Dialing,
            started_at: Utc::now(),
            connected_at: None,
            ended_by: None,
            pending_hangup_by: None,
            voice_profile,
            lead_name,
            phone,
            message: Some("Dialing customer".to_string()),
            outcome: None,
            sentiment: None,
            notes: None,
        }
    }

    /// Seconds of connected audio, if the call ever connected.
    pub fn connected_duration_secs(&self) -> Option<u64> {
        self.connected_at
            .map(|t| (Utc::now() - t).num_seconds().max(0) as u64)
    }
}

/// One immutable row appended to call history per finalized call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    pub id: Uuid,
    pub lead_name: String,
    /// When the call started (dial time), RFC 3339.
    pub timestamp: DateTime<Utc>,
    pub duration_secs: u64,
    pub outcome: CallOutcome,
    pub sentiment: Sentiment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub ended_by: EndedBy,
}

/// Severity for dashboard notifications raised by tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Alert,
}

/// Which side of the conversation a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSender {
    User,
    Agent,
}

/// Events pushed to dashboard observers over the broadcast channel.
///
/// Fire-and-forget, at most once per ledger mutation; slow or
/// disconnected observers never block a ledger update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    StatusUpdate {
        id: Uuid,
        status: CallStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ended_by: Option<EndedBy>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_secs: Option<u64>,
    },
    Notification {
        level: NotificationLevel,
        message: String,
    },
    Transcript {
        id: Uuid,
        sender: TranscriptSender,
        text: String,
    },
}

/// Arguments for the `book_meeting` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMeetingArgs {
    #[serde(default)]
    pub client_name: Option<String>,
    pub client_email: String,
    pub meeting_type: MeetingType,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Arguments for the `log_outcome` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogOutcomeArgs {
    pub outcome: CallOutcome,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Arguments for the `transfer_call` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCallArgs {
    pub reason: String,
}

/// Error returned when a wire label does not map to a known enum value.
#[derive(Debug, Error)]
#[error("unknown {kind} label: {value}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl std::str::FromStr for CallStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dialing" => Ok(Self::Dialing),
            "ringing" => Ok(Self::Ringing),
            "connected" => Ok(Self::Connected),
            "disconnecting" => Ok(Self::Disconnecting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseLabelError {
                kind: "call status",
                value: other.to_string(),
            }),
        }
    }
}
