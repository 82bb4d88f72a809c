//! SMS gateway client (channel B).
//!
//! Posts a single transactional message to a configured HTTP gateway. The
//! recipient is normalized to an E.164-like `+<digits>` form and the message
//! text is produced single-segment sized by the renderer.

use serde::Serialize;

use crate::delivery::SmsTransport;

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Gateway {
        status: reqwest::StatusCode,
        message: String,
    },
}

#[derive(Clone, Debug)]
pub struct SmsClient {
    client: reqwest::Client,
    gateway_url: String,
    sender_id: String,
}

#[derive(Debug, Serialize)]
struct OutboundSms<'a> {
    to: &'a str,
    message: &'a str,
    sender_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Ensures the `+` international prefix the gateway expects.
pub(crate) fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{trimmed}")
    }
}

impl SmsClient {
    pub fn new(client: reqwest::Client, gateway_url: String, sender_id: String) -> Self {
        Self {
            client,
            gateway_url,
            sender_id,
        }
    }

    pub async fn send(&self, phone_number: &str, message: &str) -> Result<(), SmsError> {
        let to = normalize_phone(phone_number);
        let body = OutboundSms {
            to: &to,
            message,
            sender_id: &self.sender_id,
            kind: "transactional",
        };

        let response = self
            .client
            .post(&self.gateway_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to = %to, "sms sent");
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(SmsError::Gateway { status, message })
    }
}

impl SmsTransport for SmsClient {
    async fn send_summary(&self, phone_number: &str, body: &str) -> Result<(), String> {
        self.send(phone_number, body)
            .await
            .map_err(|err| err.to_string())
    }
}
