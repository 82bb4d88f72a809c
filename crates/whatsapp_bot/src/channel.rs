//! WhatsApp Cloud API client (channel A).
//!
//! Text messages support `*emphasis*` markup; interactive messages carry at
//! most three reply buttons. Media arrives by id and is downloaded in two
//! steps (metadata lookup, then the signed URL).

use serde::Deserialize;

use crate::delivery::ChatTransport;
use crate::ui::Button;

const GRAPH_BASE: &str = "https://graph.facebook.com/v22.0";

/// The transport rejects interactive messages with more than 3 buttons.
const MAX_BUTTONS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },
}

#[derive(Clone, Debug)]
pub struct ChannelClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    #[serde(default)]
    url: Option<String>,
}

impl ChannelClient {
    pub fn new(client: reqwest::Client, access_token: String, phone_number_id: String) -> Self {
        Self {
            client,
            base_url: GRAPH_BASE.to_string(),
            access_token,
            phone_number_id,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    async fn post_messages(&self, body: serde_json::Value) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(ChannelError::Api { status, message })
    }

    /// Sends a plain text message.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        self.post_messages(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body }
        }))
        .await
    }

    /// Sends a message with up to three reply buttons.
    pub async fn send_buttons(
        &self,
        to: &str,
        body: &str,
        buttons: &[Button],
    ) -> Result<(), ChannelError> {
        let buttons: Vec<serde_json::Value> = buttons
            .iter()
            .take(MAX_BUTTONS)
            .map(|button| {
                serde_json::json!({
                    "type": "reply",
                    "reply": { "id": button.id, "title": button.title }
                })
            })
            .collect();

        self.post_messages(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": buttons }
            }
        }))
        .await
    }

    /// Acknowledges an inbound message.
    pub async fn mark_as_read(&self, message_id: &str) -> Result<(), ChannelError> {
        self.post_messages(serde_json::json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id
        }))
        .await
    }

    /// Downloads inbound media content by id.
    pub async fn download_media(&self, media_id: &str) -> Result<Vec<u8>, ChannelError> {
        let info: MediaInfo = self
            .client
            .get(format!("{}/{}", self.base_url, media_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(url) = info.url else {
            return Err(ChannelError::Api {
                status: reqwest::StatusCode::NOT_FOUND,
                message: "media has no download url".to_string(),
            });
        };

        let bytes = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

impl ChatTransport for ChannelClient {
    async fn send_summary(&self, recipient: &str, body: &str) -> Result<(), String> {
        self.send_text(recipient, body)
            .await
            .map_err(|err| err.to_string())
    }
}
