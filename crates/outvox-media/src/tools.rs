//! Structured tool-call handling.
//!
//! Every tool call gets a response, including calls to unknown tools
//! or calls with malformed arguments: the AI session stalls its turn
//! until the response arrives, so swallowing a bad call would hang the
//! conversation.

use outvox_ledger::CallLedger;
use outvox_types::{BookMeetingArgs, LogOutcomeArgs, NotificationLevel, TransferCallArgs};
use serde_json::{json, Value};
use uuid::Uuid;

/// Function declarations advertised to the AI session at setup.
pub(crate) fn declarations() -> Value {
    json!([
        {
            "name": "book_meeting",
            "description": "Book a sales meeting with the customer once they agree.",
            "parameters": {
                "type": "object",
                "properties": {
                    "client_name": { "type": "string" },
                    "client_email": { "type": "string" },
                    "meeting_type": { "type": "string", "enum": ["virtual", "in_person"] },
                    "date": { "type": "string" },
                    "time": { "type": "string" },
                    "notes": { "type": "string" }
                },
                "required": ["client_email", "meeting_type"]
            }
        },
        {
            "name": "log_outcome",
            "description": "Record the outcome of the call before ending it.",
            "parameters": {
                "type": "object",
                "properties": {
                    "outcome": {
                        "type": "string",
                        "enum": [
                            "Meeting Booked", "Follow-up", "Not Interested",
                            "Voicemail", "Call Later", "Call Finished", "Failed"
                        ]
                    },
                    "sentiment": { "type": "string", "enum": ["Positive", "Neutral", "Negative"] },
                    "notes": { "type": "string" }
                },
                "required": ["outcome", "sentiment"]
            }
        },
        {
            "name": "transfer_call",
            "description": "Request a transfer to a human representative.",
            "parameters": {
                "type": "object",
                "properties": {
                    "reason": { "type": "string" }
                },
                "required": ["reason"]
            }
        }
    ])
}

/// Executes one tool call and returns the result string for the
/// response. Never fails; errors become error result strings.
pub(crate) async fn dispatch(ledger: &CallLedger, call_id: Uuid, name: &str, args: Value) -> String {
    match name {
        "book_meeting" => match serde_json::from_value::<BookMeetingArgs>(args) {
            Ok(args) => {
                let slot = match (args.date.as_deref(), args.time.as_deref()) {
                    (Some(date), Some(time)) => format!(" on {date} at {time}"),
                    (Some(date), None) => format!(" on {date}"),
                    _ => String::new(),
                };
                ledger.notify(
                    NotificationLevel::Success,
                    format!(
                        "Meeting ({}) booked for {}{slot}",
                        args.meeting_type.label(),
                        args.client_email
                    ),
                );
                tracing::info!(%call_id, email = %args.client_email, "meeting booked");
                format!(
                    "Meeting booked successfully for {}{slot}. Confirm the details with the customer.",
                    args.client_email
                )
            }
            Err(e) => {
                tracing::warn!(%call_id, "book_meeting called with invalid arguments: {e}");
                format!("Error: invalid book_meeting arguments: {e}")
            }
        },
        "log_outcome" => match serde_json::from_value::<LogOutcomeArgs>(args) {
            Ok(args) => {
                match ledger
                    .record_outcome(call_id, args.outcome, args.sentiment, args.notes)
                    .await
                {
                    Ok(_) => "Outcome logged. You may end the call politely.".to_string(),
                    Err(e) => {
                        tracing::warn!(%call_id, "log_outcome failed: {e}");
                        format!("Error: could not log outcome: {e}")
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%call_id, "log_outcome called with invalid arguments: {e}");
                format!("Error: invalid log_outcome arguments: {e}")
            }
        },
        "transfer_call" => match serde_json::from_value::<TransferCallArgs>(args) {
            Ok(args) => {
                ledger.notify(
                    NotificationLevel::Alert,
                    format!("Transfer to human requested: {}", args.reason),
                );
                tracing::info!(%call_id, reason = %args.reason, "transfer requested");
                "A human representative has been notified and will follow up.".to_string()
            }
            Err(e) => {
                tracing::warn!(%call_id, "transfer_call called with invalid arguments: {e}");
                format!("Error: invalid transfer_call arguments: {e}")
            }
        },
        other => {
            tracing::warn!(%call_id, tool = other, "unknown tool call");
            format!("Error: unknown tool '{other}'")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outvox_types::{CallOutcome, CallStatus, DashboardEvent, EndedBy, Sentiment};
    use std::time::Duration;

    fn ledger() -> CallLedger {
        CallLedger::new(Duration::from_secs(1))
    }

    async fn connected_call(ledger: &CallLedger) -> Uuid {
        let id = ledger
            .create_call("+919876543210".into(), "Aditi".into(), "Kore".into())
            .await
            .id;
        ledger.media_connected(id).await;
        id
    }

    #[tokio::test]
    async fn book_meeting_notifies_dashboard() {
        let ledger = ledger();
        let id = connected_call(&ledger).await;
        let mut rx = ledger.subscribe();

        let args = json!({
            "client_email": "dr.mehta@example.com",
            "meeting_type": "virtual",
            "date": "2026-09-02",
            "time": "11:00"
        });
        let result = dispatch(&ledger, id, "book_meeting", args).await;
        assert!(result.contains("dr.mehta@example.com"));
        assert!(result.contains("2026-09-02"));

        let event = rx.recv().await.unwrap();
        match event {
            DashboardEvent::Notification { level, message } => {
                assert_eq!(level, NotificationLevel::Success);
                assert!(message.contains("virtual"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn book_meeting_accepts_legacy_meeting_type_labels() {
        let ledger = ledger();
        let id = connected_call(&ledger).await;
        let args = json!({ "client_email": "x@example.com", "meeting_type": "Google Meet" });
        let result = dispatch(&ledger, id, "book_meeting", args).await;
        assert!(!result.starts_with("Error"));
    }

    #[tokio::test]
    async fn log_outcome_finalizes_connected_call() {
        let ledger = ledger();
        let id = connected_call(&ledger).await;
        let args = json!({
            "outcome": "Meeting Booked",
            "sentiment": "Positive",
            "notes": "Silver package"
        });
        let result = dispatch(&ledger, id, "log_outcome", args).await;
        assert!(result.contains("logged"));

        let record = ledger.get(id).await.unwrap();
        assert_eq!(record.status, CallStatus::Completed);
        assert_eq!(record.ended_by, Some(EndedBy::Agent));
        assert_eq!(record.outcome, Some(CallOutcome::MeetingBooked));
        assert_eq!(record.sentiment, Some(Sentiment::Positive));
    }

    #[tokio::test]
    async fn invalid_arguments_still_produce_a_response() {
        let ledger = ledger();
        let id = connected_call(&ledger).await;
        let result = dispatch(&ledger, id, "log_outcome", json!({ "outcome": "Meh" })).await;
        assert!(result.starts_with("Error"));
    }

    #[tokio::test]
    async fn unknown_tool_produces_error_response() {
        let ledger = ledger();
        let id = connected_call(&ledger).await;
        let result = dispatch(&ledger, id, "send_rocket", json!({})).await;
        assert_eq!(result, "Error: unknown tool 'send_rocket'");
    }
}
