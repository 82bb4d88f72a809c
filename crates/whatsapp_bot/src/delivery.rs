//! Dual-channel delivery coordinator.
//!
//! A monthly summary goes out over channel A (chat) and channel B (SMS).
//! The channels are attempted independently: one failing, timing out or
//! being unconfigured never stops the other, and nothing here returns an
//! error. Every outcome is captured in the result. The batch variant walks
//! all users with spending in the period and buckets the per-user outcomes.

use std::time::Duration;

use engine::{Engine, MonthlySummary, users};
use serde::Serialize;

use crate::ui;

/// A hung transport call is abandoned after this long so one stuck delivery
/// cannot stall the batch.
const CHANNEL_TIMEOUT: Duration = Duration::from_secs(20);

/// Chat-style delivery target (channel A).
pub trait ChatTransport {
    fn send_summary(
        &self,
        recipient: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

/// SMS delivery target (channel B).
pub trait SmsTransport {
    fn send_summary(
        &self,
        phone_number: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

/// Per-channel outcome of one delivery.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub channel_a_ok: bool,
    pub channel_a_error: Option<String>,
    pub channel_b_ok: bool,
    pub channel_b_error: Option<String>,
}

impl DeliveryResult {
    pub fn any_ok(&self) -> bool {
        self.channel_a_ok || self.channel_b_ok
    }

    pub fn all_ok(&self) -> bool {
        self.channel_a_ok && self.channel_b_ok
    }
}

/// Aggregate outcome of a [`deliver_all_due`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub period: String,
    pub total_users: u64,
    /// Both channels delivered.
    pub dual_success: u64,
    /// Exactly one channel delivered.
    pub degraded: u64,
    /// Neither channel delivered.
    pub failed: u64,
}

async fn attempt<F>(send: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    match tokio::time::timeout(CHANNEL_TIMEOUT, send).await {
        Ok(result) => result,
        Err(_) => Err(format!(
            "timed out after {}s",
            CHANNEL_TIMEOUT.as_secs()
        )),
    }
}

/// Sends one user's summary over both channels.
pub async fn deliver<A: ChatTransport, B: SmsTransport>(
    chat: Option<&A>,
    sms: Option<&B>,
    user: &users::Model,
    summary: &MonthlySummary,
) -> DeliveryResult {
    let mut result = DeliveryResult::default();

    match chat {
        Some(chat) => {
            let body = ui::delivery_message(summary);
            match attempt(chat.send_summary(&user.sender_id, &body)).await {
                Ok(()) => result.channel_a_ok = true,
                Err(err) => {
                    tracing::warn!(sender = %user.sender_id, "chat delivery failed: {err}");
                    result.channel_a_error = Some(err);
                }
            }
        }
        None => result.channel_a_error = Some("chat channel not configured".to_string()),
    }

    match (sms, user.phone_number.as_deref()) {
        (Some(sms), Some(phone)) => {
            let body = ui::sms_summary(summary);
            match attempt(sms.send_summary(phone, &body)).await {
                Ok(()) => result.channel_b_ok = true,
                Err(err) => {
                    tracing::warn!(sender = %user.sender_id, "sms delivery failed: {err}");
                    result.channel_b_error = Some(err);
                }
            }
        }
        (None, _) => result.channel_b_error = Some("sms channel not configured".to_string()),
        (_, None) => result.channel_b_error = Some("no phone number on file".to_string()),
    }

    result
}

/// Delivers the period's summary to every user who spent in it.
///
/// A per-user engine failure is counted and logged, never propagated; the
/// batch always completes.
pub async fn deliver_all_due<A: ChatTransport, B: SmsTransport>(
    engine: &Engine,
    chat: Option<&A>,
    sms: Option<&B>,
    year_month: &str,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        period: year_month.to_string(),
        ..BatchOutcome::default()
    };

    let due = match engine.users_with_expenses_in(year_month).await {
        Ok(due) => due,
        Err(err) => {
            tracing::error!("could not list batch recipients: {err}");
            return outcome;
        }
    };

    for user in due {
        outcome.total_users += 1;

        let summary = match engine.summarize(user.id, year_month).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::error!(user = user.id, "summary failed for batch: {err}");
                outcome.failed += 1;
                continue;
            }
        };

        let result = deliver(chat, sms, &user, &summary).await;
        if result.all_ok() {
            outcome.dual_success += 1;
        } else if result.any_ok() {
            outcome.degraded += 1;
        } else {
            outcome.failed += 1;
        }
    }

    tracing::info!(
        period = %outcome.period,
        total = outcome.total_users,
        dual = outcome.dual_success,
        degraded = outcome.degraded,
        failed = outcome.failed,
        "monthly delivery batch complete"
    );
    outcome
}
