//! WebhookSink -- delivers notifications by POSTing JSON to a URL.
//!
//! The payload is `{"subject", "body", "sentAt"}`. When a signing secret is
//! configured, the exact request body is signed with HMAC-SHA256 and sent as
//! `X-Waypoint-Signature: sha256=<hex>` so receivers can verify it.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use waypoint_core::notify::{Ack, NotificationSink};
use waypoint_types::error::DeliveryError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Waypoint-Signature";

/// Response header a receiver may use to report its message ID.
const MESSAGE_ID_HEADER: &str = "X-Message-Id";

/// Compute the `sha256=<hex>` signature for a webhook body.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, DeliveryError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| DeliveryError::Rejected(format!("invalid signing key: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex_encode(&mac.finalize().into_bytes())))
}

/// Encode bytes to a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// HTTP webhook notification sink.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    signing_secret: Option<SecretString>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, signing_secret: Option<SecretString>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("waypoint/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            signing_secret,
        })
    }
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("url", &self.url)
            .field("signed", &self.signing_secret.is_some())
            .finish()
    }
}

impl NotificationSink for WebhookSink {
    async fn send(&self, sink: &str, subject: &str, body: &str) -> Result<Ack, DeliveryError> {
        let payload = serde_json::json!({
            "subject": subject,
            "body": body,
            "sentAt": Utc::now().to_rfc3339(),
        });
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| DeliveryError::Rejected(format!("failed to encode payload: {e}")))?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.signing_secret {
            let signature = sign_payload(secret.expose_secret().as_bytes(), &bytes)?;
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(bytes)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(format!("'{sink}': {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!(
                "'{sink}' returned HTTP {status}: {}",
                text.trim()
            )));
        }

        let message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Ack { message_id })
    }
}
