//! Dialogue dispatcher.
//!
//! [`dispatch`] is the conversational state machine: it classifies one
//! inbound event against the sender's current dialogue state and returns the
//! reply to send. It talks to the engine and the extraction providers but
//! never to a transport, so the whole state machine is testable without any
//! network.

use chrono::{Datelike, NaiveDate};
use engine::{Engine, ExpenseDraft, MoneyCents, RateCategory, users, year_month_of};

use crate::{
    extract::{self, Recognizer, Structurer},
    state::{DialogueState, SessionStore},
    ui::{self, Button},
};

/// Manual amounts outside `[0.01, 10000.00]` TRY are rejected.
const MIN_MANUAL_AMOUNT: MoneyCents = MoneyCents::new(1);
const MAX_MANUAL_AMOUNT: MoneyCents = MoneyCents::new(1_000_000);

/// Merchant names outside 2–50 characters (after trim) are rejected.
const MERCHANT_CHARS: std::ops::RangeInclusive<usize> = 2..=50;

/// One inbound event, with image bytes already fetched from the channel.
#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    Text(&'a str),
    Image(&'a [u8]),
    Button(&'a str),
}

/// What the dispatcher wants sent back to the sender.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Text(String),
    Buttons { body: String, buttons: Vec<Button> },
}

impl Reply {
    pub fn body(&self) -> &str {
        match self {
            Reply::Text(body) => body,
            Reply::Buttons { body, .. } => body,
        }
    }
}

/// The fixed command vocabulary, matched case-insensitively after trimming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Greeting,
    Help,
    Summary,
    Report,
    ManualStart,
    Rate(RateCategory),
}

fn parse_command(text: &str) -> Option<Command> {
    match text.trim().to_ascii_lowercase().as_str() {
        "hi" | "hello" | "hey" | "start" => Some(Command::Greeting),
        "help" | "info" => Some(Command::Help),
        "total" | "balance" | "summary" => Some(Command::Summary),
        "report" => Some(Command::Report),
        "manual" => Some(Command::ManualStart),
        "pos" => Some(Command::Rate(RateCategory::Pos)),
        "atm" => Some(Command::Rate(RateCategory::Atm)),
        _ => None,
    }
}

/// Parses a bounded manual amount entry.
fn parse_manual_amount(text: &str) -> Option<MoneyCents> {
    let amount: MoneyCents = text.trim().parse().ok()?;
    (MIN_MANUAL_AMOUNT..=MAX_MANUAL_AMOUNT)
        .contains(&amount)
        .then_some(amount)
}

fn valid_merchant(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    MERCHANT_CHARS
        .contains(&trimmed.chars().count())
        .then_some(trimmed)
}

/// Handles one event for one sender and returns the reply.
pub async fn dispatch<R: Recognizer, S: Structurer>(
    engine: &Engine,
    sessions: &SessionStore,
    recognizer: &R,
    structurer: &S,
    user: &users::Model,
    event: Event<'_>,
    today: NaiveDate,
) -> Reply {
    match event {
        Event::Text(text) => handle_text(engine, sessions, user, text, today).await,
        Event::Image(bytes) => {
            handle_image(engine, sessions, recognizer, structurer, user, bytes, today).await
        }
        Event::Button(id) => handle_button(engine, sessions, user, id, today).await,
    }
}

async fn handle_text(
    engine: &Engine,
    sessions: &SessionStore,
    user: &users::Model,
    text: &str,
    today: NaiveDate,
) -> Reply {
    if let Some(command) = parse_command(text) {
        return match command {
            Command::Greeting => Reply::Text(ui::welcome()),
            Command::Help => Reply::Text(ui::help()),
            Command::Summary => send_summary(engine, user, &year_month_of(today), today).await,
            Command::Report => send_report(engine, user, &year_month_of(today)).await,
            Command::ManualStart => {
                // A new manual entry discards any incomplete prior state.
                sessions
                    .set(&user.sender_id, DialogueState::AwaitingAmount)
                    .await;
                Reply::Text(ui::amount_prompt())
            }
            Command::Rate(category) => commit_staged(engine, sessions, user, category).await,
        };
    }

    match sessions.get(&user.sender_id).await {
        Some(DialogueState::AwaitingAmount) => match parse_manual_amount(text) {
            Some(amount) => {
                sessions
                    .set(&user.sender_id, DialogueState::AwaitingMerchant { amount })
                    .await;
                Reply::Text(ui::merchant_prompt())
            }
            // Invalid input re-prompts without advancing the stage.
            None => Reply::Text(ui::amount_invalid()),
        },
        Some(DialogueState::AwaitingMerchant { amount }) => match valid_merchant(text) {
            Some(merchant) => {
                let draft = ExpenseDraft::manual(merchant, amount, today);
                let prompt = ui::rate_prompt(&draft, engine.rates());
                sessions
                    .set(&user.sender_id, DialogueState::AwaitingRate(draft))
                    .await;
                Reply::Buttons {
                    body: prompt.0,
                    buttons: prompt.1,
                }
            }
            None => Reply::Text(ui::merchant_invalid()),
        },
        _ => Reply::Text(ui::help()),
    }
}

async fn handle_image<R: Recognizer, S: Structurer>(
    engine: &Engine,
    sessions: &SessionStore,
    recognizer: &R,
    structurer: &S,
    user: &users::Model,
    bytes: &[u8],
    today: NaiveDate,
) -> Reply {
    // A new receipt supersedes whatever dialogue was in flight.
    sessions.clear(&user.sender_id).await;

    match extract::extract(recognizer, structurer, bytes, today).await {
        Ok(draft) => {
            let (body, buttons) = ui::rate_prompt(&draft, engine.rates());
            sessions
                .set(&user.sender_id, DialogueState::AwaitingRate(draft))
                .await;
            Reply::Buttons { body, buttons }
        }
        Err(err) => {
            tracing::warn!(sender = %user.sender_id, stage = err.stage.as_str(), "extraction failed: {}", err.message);
            Reply::Text(ui::extraction_failed(err.stage.as_str(), &err.message))
        }
    }
}

async fn handle_button(
    engine: &Engine,
    sessions: &SessionStore,
    user: &users::Model,
    id: &str,
    today: NaiveDate,
) -> Reply {
    match id {
        "pos_rate" => commit_staged(engine, sessions, user, RateCategory::Pos).await,
        "atm_rate" => commit_staged(engine, sessions, user, RateCategory::Atm).await,
        "all_time" => match engine.summarize_all_time(user.id).await {
            Ok(summary) => Reply::Text(ui::monthly_report(&summary)),
            Err(err) => {
                tracing::error!(sender = %user.sender_id, "all-time summary failed: {err}");
                Reply::Text(ui::help())
            }
        },
        _ => match id.strip_prefix("month_") {
            Some(period) if is_year_month(period) => send_summary(engine, user, period, today).await,
            _ => Reply::Text(ui::help()),
        },
    }
}

async fn commit_staged(
    engine: &Engine,
    sessions: &SessionStore,
    user: &users::Model,
    category: RateCategory,
) -> Reply {
    let Some(draft) = sessions.take_staged(&user.sender_id).await else {
        return Reply::Text(ui::no_pending());
    };

    match engine.commit_expense(user.id, draft, category).await {
        Ok((expense, summary)) => Reply::Text(ui::expense_saved(&expense, &summary)),
        Err(err) => {
            tracing::error!(sender = %user.sender_id, "expense commit failed: {err}");
            Reply::Text(ui::commit_failed())
        }
    }
}

async fn send_summary(
    engine: &Engine,
    user: &users::Model,
    period: &str,
    today: NaiveDate,
) -> Reply {
    match engine.summarize(user.id, period).await {
        Ok(summary) => {
            let previous = previous_period(period).unwrap_or_else(|| {
                engine::previous_year_month(today)
            });
            let (body, buttons) = ui::summary_reply(&summary, &previous);
            Reply::Buttons { body, buttons }
        }
        Err(err) => {
            tracing::error!(sender = %user.sender_id, "summary failed: {err}");
            Reply::Text(ui::help())
        }
    }
}

async fn send_report(engine: &Engine, user: &users::Model, period: &str) -> Reply {
    match engine.summarize(user.id, period).await {
        Ok(summary) => Reply::Text(ui::monthly_report(&summary)),
        Err(err) => {
            tracing::error!(sender = %user.sender_id, "report failed: {err}");
            Reply::Text(ui::help())
        }
    }
}

fn is_year_month(period: &str) -> bool {
    NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d").is_ok()
}

/// `YYYY-MM` of the month before the given bucket.
fn previous_period(period: &str) -> Option<String> {
    let first = NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d").ok()?;
    let previous = first.pred_opt()?;
    Some(format!("{}-{:02}", previous.year(), previous.month()))
}
