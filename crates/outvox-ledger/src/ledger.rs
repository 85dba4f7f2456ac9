//! Call table, lifecycle reconciliation, and status fan-out.

use crate::LedgerError;
use chrono::Utc;
use outvox_types::{
    CallHistoryEntry, CallOutcome, CallRecord, CallStatus, CarrierCallStatus, DashboardEvent,
    EndedBy, NotificationLevel, Sentiment, TranscriptSender,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Capacity of the dashboard broadcast channel. Observers that lag
/// beyond this many undelivered events start missing updates.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A status update reported by the carrier's webhook endpoint.
///
/// Correlation is by local `call_id` when the carrier echoes our custom
/// parameter, otherwise by scanning for the `carrier_ref`. Webhooks can
/// arrive before the dial HTTP response has stored the carrier
/// reference, so neither field alone is reliable.
#[derive(Debug, Clone)]
pub struct WebhookUpdate {
    pub call_id: Option<Uuid>,
    pub carrier_ref: Option<String>,
    pub status: CarrierCallStatus,
    pub duration_secs: Option<u64>,
}

struct LedgerInner {
    calls: HashMap<Uuid, CallRecord>,
    history: Vec<CallHistoryEntry>,
}

/// Keyed table of call records plus the dashboard broadcast channel.
///
/// Cheap to clone; all clones share the same table. Every
/// read-modify-write runs under one async mutex, which serializes
/// per-call updates across the HTTP handler, the webhook handler, and
/// the media socket handler.
#[derive(Clone)]
pub struct CallLedger {
    inner: Arc<Mutex<LedgerInner>>,
    events_tx: broadcast::Sender<DashboardEvent>,
    hangup_fallback: Duration,
}

impl CallLedger {
    /// Creates an empty ledger.
    ///
    /// `hangup_fallback` bounds how long a `disconnecting` call waits
    /// for a terminal webhook before being force-finalized.
    pub fn new(hangup_fallback: Duration) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(LedgerInner {
                calls: HashMap::new(),
                history: Vec::new(),
            })),
            events_tx,
            hangup_fallback,
        }
    }

    /// Subscribes a new dashboard observer.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events_tx.subscribe()
    }

    /// Creates a record in `dialing` state and returns a snapshot.
    pub async fn create_call(
        &self,
        phone: String,
        lead_name: String,
        voice_profile: String,
    ) -> CallRecord {
        let record = CallRecord::new(Uuid::new_v4(), phone, lead_name, voice_profile);
        let snapshot = record.clone();
        {
            let mut inner = self.inner.lock().await;
            inner.calls.insert(record.id, record);
        }
        self.send_status(&snapshot, None);
        tracing::info!(id = %snapshot.id, phone = %snapshot.phone, "call created");
        snapshot
    }

    /// Returns a snapshot of one call record.
    pub async fn get(&self, id: Uuid) -> Option<CallRecord> {
        self.inner.lock().await.calls.get(&id).cloned()
    }

    /// Returns finalized history entries, newest first.
    pub async fn history(&self) -> Vec<CallHistoryEntry> {
        let inner = self.inner.lock().await;
        inner.history.iter().rev().cloned().collect()
    }

    /// Returns the most recently started call that is still live.
    ///
    /// The carrier's media socket does not always carry our call id, so
    /// the bridge attaches to this call when the socket opens.
    pub async fn active_call(&self) -> Option<CallRecord> {
        let inner = self.inner.lock().await;
        inner
            .calls
            .values()
            .filter(|r| {
                matches!(
                    r.status,
                    CallStatus::Dialing | CallStatus::Ringing | CallStatus::Connected
                )
            })
            .max_by_key(|r| r.started_at)
            .cloned()
    }

    /// Dial HTTP response: carrier accepted the call.
    pub async fn dial_accepted(
        &self,
        id: Uuid,
        carrier_ref: Option<String>,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .calls
            .get_mut(&id)
            .ok_or_else(|| LedgerError::UnknownCall(id.to_string()))?;
        if let Some(carrier_ref) = carrier_ref {
            record.carrier_ref.get_or_insert(carrier_ref);
        }
        // A webhook may already have advanced the call past dialing
        // before the dial response landed; never move it back.
        if record.status == CallStatus::Dialing {
            record.status = CallStatus::Ringing;
            record.message = Some("Ringing customer".to_string());
            let snapshot = record.clone();
            drop(inner);
            self.send_status(&snapshot, None);
        } else {
            tracing::debug!(%id, status = record.status.label(), "dial response arrived late; keeping current status");
        }
        Ok(())
    }

    /// Dial HTTP response: carrier rejected the call.
    pub async fn dial_rejected(&self, id: Uuid, reason: &str) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        if !inner.calls.contains_key(&id) {
            return Err(LedgerError::UnknownCall(id.to_string()));
        }
        self.finalize_locked(
            &mut inner,
            id,
            CallStatus::Failed,
            Some(EndedBy::Network),
            None,
            format!("Dial failed: {reason}"),
        );
        Ok(())
    }

    /// Applies a carrier webhook to the matching call.
    pub async fn apply_webhook(&self, update: WebhookUpdate) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        let id = Self::correlate(&inner, &update)?;

        if let Some(carrier_ref) = &update.carrier_ref {
            if let Some(record) = inner.calls.get_mut(&id) {
                record.carrier_ref.get_or_insert(carrier_ref.clone());
            }
        }

        match update.status {
            CarrierCallStatus::Ringing => {
                let Some(record) = inner.calls.get_mut(&id) else {
                    return Ok(());
                };
                if record.status == CallStatus::Dialing {
                    record.status = CallStatus::Ringing;
                    record.message = Some("Ringing customer".to_string());
                    let snapshot = record.clone();
                    drop(inner);
                    self.send_status(&snapshot, None);
                } else {
                    tracing::debug!(%id, status = record.status.label(), "discarding late ringing webhook");
                }
            }
            CarrierCallStatus::Answered => {
                self.mark_connected_locked(&mut inner, id, "webhook");
            }
            terminal => {
                let (status, hint) = match terminal {
                    CarrierCallStatus::Completed => (CallStatus::Completed, EndedBy::Customer),
                    CarrierCallStatus::Busy | CarrierCallStatus::NoAnswer => {
                        (CallStatus::Failed, EndedBy::Network)
                    }
                    _ => (CallStatus::Failed, EndedBy::Customer),
                };
                self.finalize_locked(
                    &mut inner,
                    id,
                    status,
                    Some(hint),
                    update.duration_secs,
                    format!("Carrier reported {}", status.label()),
                );
            }
        }
        Ok(())
    }

    /// Media socket opened: redundant connected signal, used when the
    /// webhook is delayed or lost.
    pub async fn media_connected(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        self.mark_connected_locked(&mut inner, id, "media socket");
    }

    /// Media socket closed: finalizes the call if nothing else has.
    pub async fn media_closed(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        self.finalize_locked(
            &mut inner,
            id,
            CallStatus::Completed,
            Some(EndedBy::Customer),
            None,
            "Media stream closed".to_string(),
        );
    }

    /// Marks the call failed (carrier rejection mid-flight, AI session
    /// failure, buffer overflow).
    pub async fn fail_call(&self, id: Uuid, reason: &str) {
        let mut inner = self.inner.lock().await;
        self.finalize_locked(
            &mut inner,
            id,
            CallStatus::Failed,
            Some(EndedBy::Unknown),
            None,
            format!("Call failed: {reason}"),
        );
    }

    /// Records the AI agent's logged outcome. Finalizes the call with
    /// `ended_by = agent` when a call duration can be computed.
    ///
    /// Returns whether this call finalized the record.
    pub async fn record_outcome(
        &self,
        id: Uuid,
        outcome: CallOutcome,
        sentiment: Sentiment,
        notes: Option<String>,
    ) -> Result<bool, LedgerError> {
        let mut inner = self.inner.lock().await;
        let connected = {
            let record = inner
                .calls
                .get_mut(&id)
                .ok_or_else(|| LedgerError::UnknownCall(id.to_string()))?;
            if record.status.is_terminal() {
                tracing::debug!(%id, "outcome arrived after finalization; keeping history as recorded");
                return Ok(false);
            }
            record.outcome = Some(outcome);
            record.sentiment = Some(sentiment);
            if notes.is_some() {
                record.notes = notes;
            }
            record.connected_at.is_some()
        };
        if connected {
            Ok(self.finalize_locked(
                &mut inner,
                id,
                CallStatus::Completed,
                Some(EndedBy::Agent),
                None,
                "Outcome logged by agent".to_string(),
            ))
        } else {
            if let Some(record) = inner.calls.get(&id) {
                let snapshot = record.clone();
                drop(inner);
                self.send_status(&snapshot, None);
            }
            Ok(false)
        }
    }

    /// Operator hangup: transitions to `disconnecting`, marks the
    /// pending hangup, and arms the fallback timer.
    ///
    /// The carrier hangup request itself is the caller's job and is
    /// fire-and-forget; the local close is authoritative. If no
    /// terminal webhook arrives within the fallback window the call is
    /// force-finalized as completed.
    pub async fn request_hangup(&self, id: Uuid) -> Result<(), LedgerError> {
        {
            let mut inner = self.inner.lock().await;
            let record = inner
                .calls
                .get_mut(&id)
                .ok_or_else(|| LedgerError::UnknownCall(id.to_string()))?;
            // Only a call with an active carrier leg can be hung up;
            // a repeated request must not re-arm the fallback timer.
            match record.status {
                CallStatus::Ringing | CallStatus::Connected => {}
                other => {
                    tracing::debug!(%id, status = other.label(), "ignoring hangup request in this state");
                    return Ok(());
                }
            }
            record.pending_hangup_by = Some(EndedBy::Agent);
            record.status = CallStatus::Disconnecting;
            record.message = Some("Hanging up".to_string());
            let snapshot = record.clone();
            drop(inner);
            self.send_status(&snapshot, None);
        }

        let ledger = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ledger.hangup_fallback).await;
            ledger.force_finalize_after_hangup(id).await;
        });
        Ok(())
    }

    /// Raises a dashboard notification (tool side effects).
    pub fn notify(&self, level: NotificationLevel, message: String) {
        self.send_event(DashboardEvent::Notification { level, message });
    }

    /// Pushes a live transcript line to the dashboard.
    pub fn transcript(&self, id: Uuid, sender: TranscriptSender, text: String) {
        self.send_event(DashboardEvent::Transcript { id, sender, text });
    }

    async fn force_finalize_after_hangup(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        let still_open = inner
            .calls
            .get(&id)
            .map(|r| !r.status.is_terminal())
            .unwrap_or(false);
        if still_open {
            tracing::warn!(%id, "no terminal webhook after hangup; forcing finalization");
            self.finalize_locked(
                &mut inner,
                id,
                CallStatus::Completed,
                Some(EndedBy::Agent),
                None,
                "Hangup confirmed locally".to_string(),
            );
        }
    }

    fn correlate(inner: &LedgerInner, update: &WebhookUpdate) -> Result<Uuid, LedgerError> {
        if let Some(id) = update.call_id {
            if inner.calls.contains_key(&id) {
                return Ok(id);
            }
        }
        if let Some(carrier_ref) = update.carrier_ref.as_deref() {
            if let Some(record) = inner
                .calls
                .values()
                .find(|r| r.carrier_ref.as_deref() == Some(carrier_ref))
            {
                return Ok(record.id);
            }
        }
        Err(LedgerError::UnknownCall(format!(
            "call_id={:?} carrier_ref={:?}",
            update.call_id, update.carrier_ref
        )))
    }

    /// Transitions to `connected`, setting `connected_at` exactly once
    /// on whichever proof of audio arrives first. Duplicate or late
    /// signals are discarded.
    fn mark_connected_locked(&self, inner: &mut tokio::sync::MutexGuard<'_, LedgerInner>, id: Uuid, source: &str) {
        let Some(record) = inner.calls.get_mut(&id) else {
            tracing::debug!(%id, source, "connected signal for unknown call");
            return;
        };
        match record.status {
            CallStatus::Dialing | CallStatus::Ringing => {
                record.status = CallStatus::Connected;
                if record.connected_at.is_none() {
                    record.connected_at = Some(Utc::now());
                }
                record.message = Some("Call connected".to_string());
                let snapshot = record.clone();
                tracing::info!(%id, source, "call connected");
                self.send_status(&snapshot, None);
            }
            other => {
                tracing::debug!(%id, source, status = other.label(), "discarding duplicate or late connected signal");
            }
        }
    }

    /// The single finalization path. Returns false when the record is
    /// already terminal (the race loser) or unknown.
    fn finalize_locked(
        &self,
        inner: &mut tokio::sync::MutexGuard<'_, LedgerInner>,
        id: Uuid,
        terminal: CallStatus,
        hint: Option<EndedBy>,
        webhook_duration: Option<u64>,
        message: String,
    ) -> bool {
        debug_assert!(terminal.is_terminal());
        let Some(record) = inner.calls.get_mut(&id) else {
            tracing::debug!(%id, "finalize for unknown call");
            return false;
        };
        if record.status.is_terminal() {
            tracing::debug!(%id, status = record.status.label(), "discarding event that would regress a terminal status");
            return false;
        }

        let ended_by = record.pending_hangup_by.or(hint).unwrap_or(EndedBy::Unknown);
        let duration = record
            .connected_duration_secs()
            .or(webhook_duration)
            .unwrap_or(0);
        record.status = terminal;
        record.ended_by = Some(ended_by);
        record.message = Some(message);
        let outcome = record.outcome.unwrap_or(match terminal {
            CallStatus::Completed => CallOutcome::CallFinished,
            _ => CallOutcome::Failed,
        });
        let sentiment = record.sentiment.unwrap_or(Sentiment::Neutral);
        let entry = CallHistoryEntry {
            id,
            lead_name: record.lead_name.clone(),
            timestamp: record.started_at,
            duration_secs: duration,
            outcome,
            sentiment,
            notes: record.notes.clone(),
            ended_by,
        };
        let snapshot = record.clone();
        inner.history.push(entry);
        tracing::info!(%id, status = terminal.label(), ?ended_by, duration, "call finalized");
        self.send_status(&snapshot, Some(duration));
        true
    }

    fn send_status(&self, record: &CallRecord, duration_secs: Option<u64>) {
        self.send_event(DashboardEvent::StatusUpdate {
            id: record.id,
            status: record.status,
            message: record.message.clone(),
            ended_by: record.ended_by,
            duration_secs,
        });
    }

    fn send_event(&self, event: DashboardEvent) {
        // No receivers just means no dashboard is open right now.
        if let Err(e) = self.events_tx.send(event) {
            tracing::debug!("dashboard broadcast dropped: {}", e);
        }
    }
}
