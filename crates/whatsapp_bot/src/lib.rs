//! WhatsApp bot.
//!
//! The bot receives webhook events from the HTTP server, runs them through
//! the dialogue dispatcher and answers over the WhatsApp Cloud API. It also
//! owns the second delivery channel (SMS) and the monthly summary batch.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Africa::Blantyre;

use api_types::webhook::{InboundEvent, InboundMessage};
use engine::Engine;

pub mod channel;
pub mod delivery;
pub mod extract;
pub mod gemini;
pub mod handlers;
pub mod scheduler;
pub mod sms;
pub mod state;
pub mod ui;
pub mod vision;

use channel::ChannelClient;
use gemini::GeminiClient;
use handlers::{Event, Reply};
use sms::SmsClient;
use state::SessionStore;
use vision::VisionClient;

/// Everything one inbound event needs: engine, per-sender sessions, the
/// extraction providers and the outbound transports.
pub struct Processor {
    engine: Arc<Engine>,
    sessions: SessionStore,
    channel: ChannelClient,
    sms: Option<SmsClient>,
    vision: VisionClient,
    gemini: GeminiClient,
}

impl Processor {
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::default()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn sms_configured(&self) -> bool {
        self.sms.is_some()
    }

    /// Handles one decoded webhook message end to end: user bootstrap,
    /// acknowledgement, dispatch, reply. Never returns an error; every
    /// failure resolves into a reply or a log line.
    pub async fn handle_message(&self, message: InboundMessage) {
        let user = match self.engine.get_or_create_user(&message.sender).await {
            Ok(user) => user,
            Err(err) => {
                tracing::error!(sender = %message.sender, "user bootstrap failed: {err}");
                return;
            }
        };

        if let Some(message_id) = message.message_id.as_deref()
            && let Err(err) = self.channel.mark_as_read(message_id).await
        {
            tracing::debug!("mark-as-read failed: {err}");
        }

        let today = today_local();
        let reply = match &message.event {
            InboundEvent::Text { body } => {
                handlers::dispatch(
                    &self.engine,
                    &self.sessions,
                    &self.vision,
                    &self.gemini,
                    &user,
                    Event::Text(body),
                    today,
                )
                .await
            }
            InboundEvent::Image { media_id } => match self.channel.download_media(media_id).await {
                Ok(bytes) => {
                    handlers::dispatch(
                        &self.engine,
                        &self.sessions,
                        &self.vision,
                        &self.gemini,
                        &user,
                        Event::Image(&bytes),
                        today,
                    )
                    .await
                }
                Err(err) => {
                    tracing::warn!(sender = %message.sender, "media download failed: {err}");
                    Reply::Text(ui::media_unavailable())
                }
            },
            InboundEvent::Button { id } => {
                handlers::dispatch(
                    &self.engine,
                    &self.sessions,
                    &self.vision,
                    &self.gemini,
                    &user,
                    Event::Button(id),
                    today,
                )
                .await
            }
        };

        let sent = match reply {
            Reply::Text(body) => self.channel.send_text(&message.sender, &body).await,
            Reply::Buttons { body, buttons } => {
                self.channel
                    .send_buttons(&message.sender, &body, &buttons)
                    .await
            }
        };
        if let Err(err) = sent {
            tracing::error!(sender = %message.sender, "reply send failed: {err}");
        }
    }

    /// Runs the dual-channel delivery batch for one `YYYY-MM` period.
    pub async fn run_monthly_batch(&self, year_month: &str) -> delivery::BatchOutcome {
        delivery::deliver_all_due(
            &self.engine,
            Some(&self.channel),
            self.sms.as_ref(),
            year_month,
        )
        .await
    }
}

/// Today's calendar date in the user's timezone.
fn today_local() -> NaiveDate {
    Utc::now().with_timezone(&Blantyre).date_naive()
}

#[derive(Default)]
pub struct ProcessorBuilder {
    engine: Option<Arc<Engine>>,
    whatsapp: Option<(String, String)>,
    sms: Option<(String, String)>,
    vision_api_key: String,
    gemini_api_key: String,
}

impl ProcessorBuilder {
    pub fn engine(mut self, engine: Arc<Engine>) -> ProcessorBuilder {
        self.engine = Some(engine);
        self
    }

    pub fn whatsapp(mut self, access_token: &str, phone_number_id: &str) -> ProcessorBuilder {
        self.whatsapp = Some((access_token.to_string(), phone_number_id.to_string()));
        self
    }

    /// Optional: without it the batch runs chat-only (degraded deliveries).
    pub fn sms_gateway(mut self, gateway_url: &str, sender_id: &str) -> ProcessorBuilder {
        self.sms = Some((gateway_url.to_string(), sender_id.to_string()));
        self
    }

    pub fn providers(mut self, vision_api_key: &str, gemini_api_key: &str) -> ProcessorBuilder {
        self.vision_api_key = vision_api_key.to_string();
        self.gemini_api_key = gemini_api_key.to_string();
        self
    }

    pub fn build(self) -> Result<Processor, String> {
        let engine = self.engine.ok_or("engine is required")?;
        let (access_token, phone_number_id) =
            self.whatsapp.ok_or("whatsapp credentials are required")?;

        let client = reqwest::Client::new();
        Ok(Processor {
            engine,
            sessions: SessionStore::default(),
            channel: ChannelClient::new(client.clone(), access_token, phone_number_id),
            sms: self
                .sms
                .map(|(url, sender)| SmsClient::new(client.clone(), url, sender)),
            vision: VisionClient::new(client.clone(), self.vision_api_key),
            gemini: GeminiClient::new(client, self.gemini_api_key),
        })
    }
}
