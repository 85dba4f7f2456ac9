//! Click-to-call REST client.

use crate::CarrierError;
use serde::{Deserialize, Serialize};

/// What the carrier told us when it accepted a dial.
#[derive(Debug, Clone)]
pub struct DialOutcome {
    /// The carrier's own identifier for the call leg. Some deployments
    /// only return it in the first webhook, so it may be absent here.
    pub carrier_ref: Option<String>,
}

#[derive(Serialize)]
struct DialPayload<'a> {
    /// Fire the call without holding the HTTP request open.
    r#async: u8,
    customer_number: &'a str,
    api_key: &'a str,
}

#[derive(Serialize)]
struct HangupPayload<'a> {
    call_id: &'a str,
    api_key: &'a str,
}

#[derive(Deserialize)]
struct DialResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

/// Thin client for the carrier's click-to-call API.
///
/// One instance is shared by all handlers; `reqwest::Client` pools
/// connections internally.
#[derive(Debug, Clone)]
pub struct CarrierClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CarrierClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Places an outbound call to `phone`.
    ///
    /// The carrier signals acceptance either with `success: true` or
    /// with a "queued" message; anything else is a rejection.
    pub async fn dial(&self, phone: &str) -> Result<DialOutcome, CarrierError> {
        let number = sanitize_phone(phone);
        let payload = DialPayload {
            r#async: 1,
            customer_number: &number,
            api_key: &self.api_key,
        };
        let response: DialResponse = self
            .http
            .post(format!("{}/click_to_call_support", self.base_url))
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        let queued = response
            .message
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains("queued"));
        if response.success == Some(true) || queued {
            let carrier_ref = response.uuid.or(response.request_id);
            tracing::info!(?carrier_ref, "carrier accepted dial");
            Ok(DialOutcome { carrier_ref })
        } else {
            let message = response
                .message
                .unwrap_or_else(|| "no reason given".to_string());
            Err(CarrierError::Rejected(message))
        }
    }

    /// Asks the carrier to tear down a call leg.
    ///
    /// Best effort. The local lifecycle does not depend on this
    /// succeeding; the hangup fallback timer covers a lost request.
    pub async fn hangup(&self, carrier_ref: &str) -> Result<(), CarrierError> {
        let payload = HangupPayload {
            call_id: carrier_ref,
            api_key: &self.api_key,
        };
        let response = self
            .http
            .post(format!("{}/hangup_call", self.base_url))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), carrier_ref, "carrier hangup returned an error status");
        }
        Ok(())
    }
}

/// Strips formatting characters and prefixes the default country code
/// onto bare ten-digit numbers.
fn sanitize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        format!("91{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn sanitize_strips_formatting_and_adds_country_code() {
        assert_eq!(sanitize_phone("+91 98765-43210"), "919876543210");
        assert_eq!(sanitize_phone("9876543210"), "919876543210");
        assert_eq!(sanitize_phone("919876543210"), "919876543210");
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn dial_accepts_explicit_success() {
        let router = Router::new().route(
            "/click_to_call_support",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["async"], 1);
                assert_eq!(body["customer_number"], "919876543210");
                Json(json!({ "success": true, "uuid": "leg-7" }))
            }),
        );
        let base = serve(router).await;

        let client = CarrierClient::new(base, "secret");
        let outcome = client.dial("98765 43210").await.unwrap();
        assert_eq!(outcome.carrier_ref.as_deref(), Some("leg-7"));
    }

    #[tokio::test]
    async fn dial_accepts_queued_message_without_success_flag() {
        let router = Router::new().route(
            "/click_to_call_support",
            post(|| async { Json(json!({ "message": "Call Queued", "request_id": "rq-1" })) }),
        );
        let base = serve(router).await;

        let client = CarrierClient::new(base, "secret");
        let outcome = client.dial("9876543210").await.unwrap();
        assert_eq!(outcome.carrier_ref.as_deref(), Some("rq-1"));
    }

    #[tokio::test]
    async fn dial_rejection_carries_the_carrier_message() {
        let router = Router::new().route(
            "/click_to_call_support",
            post(|| async { Json(json!({ "success": false, "message": "insufficient balance" })) }),
        );
        let base = serve(router).await;

        let client = CarrierClient::new(base, "secret");
        let err = client.dial("9876543210").await.unwrap_err();
        match err {
            CarrierError::Rejected(message) => assert_eq!(message, "insufficient balance"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
