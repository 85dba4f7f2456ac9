//! Status webhook payload.

use outvox_types::CarrierCallStatus;
use serde::Deserialize;
use uuid::Uuid;

/// Body of the carrier's call-status webhook.
///
/// `call_id` is our own id, echoed back only when the carrier supports
/// custom parameters; `carrier_ref` is the carrier's leg id. At least
/// one is expected, and a webhook can arrive before the dial HTTP
/// response stored the carrier ref.
#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusWebhook {
    #[serde(default)]
    pub call_id: Option<Uuid>,
    #[serde(default)]
    pub carrier_ref: Option<String>,
    pub status: CarrierCallStatus,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}
