use chrono::NaiveDate;
use sea_orm::Database;

use engine::{Engine, MoneyCents, RateCategory, RateTable, RawReceipt, users};
use migration::MigratorTrait;
use whatsapp_bot::extract::{ProviderError, Recognized, Recognizer, Structurer};
use whatsapp_bot::handlers::{Event, Reply, dispatch};
use whatsapp_bot::state::SessionStore;

struct OkRecognizer;

impl Recognizer for OkRecognizer {
    async fn recognize(&self, _image: &[u8]) -> Result<Recognized, ProviderError> {
        Ok(Recognized {
            text: "MIGROS TOPLAM 45,50".to_string(),
            confidence: 0.92,
        })
    }
}

struct FailingRecognizer;

impl Recognizer for FailingRecognizer {
    async fn recognize(&self, _image: &[u8]) -> Result<Recognized, ProviderError> {
        Err(ProviderError::ocr("no text detected in image"))
    }
}

struct FixedStructurer(RawReceipt);

impl Structurer for FixedStructurer {
    async fn structure(&self, _text: &str) -> Result<RawReceipt, ProviderError> {
        Ok(self.0.clone())
    }
}

struct FailingStructurer;

impl Structurer for FailingStructurer {
    async fn structure(&self, _text: &str) -> Result<RawReceipt, ProviderError> {
        Err(ProviderError::llm("invalid JSON response"))
    }
}

fn receipt() -> RawReceipt {
    RawReceipt {
        merchant_name: Some("Migros".to_string()),
        total_amount: Some(serde_json::json!(120.0)),
        date: Some("10/06/25".to_string()),
        confidence: Some("high".to_string()),
        ..RawReceipt::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

async fn setup() -> (Engine, SessionStore, users::Model) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .rates(RateTable::new(48.0, 54.0))
        .build();
    let user = engine.get_or_create_user("265991304876").await.unwrap();
    (engine, SessionStore::default(), user)
}

async fn send_text(
    engine: &Engine,
    sessions: &SessionStore,
    user: &users::Model,
    text: &str,
) -> Reply {
    dispatch(
        engine,
        sessions,
        &OkRecognizer,
        &FixedStructurer(receipt()),
        user,
        Event::Text(text),
        today(),
    )
    .await
}

async fn send_button(
    engine: &Engine,
    sessions: &SessionStore,
    user: &users::Model,
    id: &str,
) -> Reply {
    dispatch(
        engine,
        sessions,
        &OkRecognizer,
        &FixedStructurer(receipt()),
        user,
        Event::Button(id),
        today(),
    )
    .await
}

#[tokio::test]
async fn manual_flow_commits_one_pos_expense() {
    let (engine, sessions, user) = setup().await;

    let reply = send_text(&engine, &sessions, &user, "manual").await;
    assert!(reply.body().contains("amount"));

    let reply = send_text(&engine, &sessions, &user, "45.50").await;
    assert!(reply.body().contains("merchant"));

    let reply = send_text(&engine, &sessions, &user, "Migros").await;
    let Reply::Buttons { buttons, .. } = &reply else {
        panic!("expected rate buttons, got {reply:?}");
    };
    assert_eq!(buttons[0].id, "pos_rate");

    // Typed rate keyword is equivalent to the button.
    let reply = send_text(&engine, &sessions, &user, "POS").await;
    assert!(reply.body().contains("saved"), "got: {}", reply.body());

    let expenses = engine.expenses_for(user.id, None).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].merchant, "Migros");
    assert_eq!(expenses[0].amount_source, MoneyCents::new(4550));
    assert_eq!(expenses[0].rate_category, RateCategory::Pos);
    // 45.50 * 48.00 = 2184.00 MWK
    assert_eq!(expenses[0].amount_target, MoneyCents::new(218_400));
    assert_eq!(expenses[0].year_month, "2025-06");
}

#[tokio::test]
async fn invalid_manual_input_reprompts_without_advancing() {
    let (engine, sessions, user) = setup().await;

    send_text(&engine, &sessions, &user, "manual").await;

    let reply = send_text(&engine, &sessions, &user, "a lot").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::amount_invalid());
    let reply = send_text(&engine, &sessions, &user, "10000.01").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::amount_invalid());

    // Still awaiting the amount, not reset to idle.
    let reply = send_text(&engine, &sessions, &user, "45.50").await;
    assert!(reply.body().contains("merchant"));

    let reply = send_text(&engine, &sessions, &user, "x").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::merchant_invalid());
    let reply = send_text(&engine, &sessions, &user, "Migros").await;
    assert!(matches!(reply, Reply::Buttons { .. }));
}

#[tokio::test]
async fn image_discards_stale_manual_state() {
    let (engine, sessions, user) = setup().await;

    send_text(&engine, &sessions, &user, "manual").await;
    send_text(&engine, &sessions, &user, "45.50").await;

    // A receipt photo mid-flow supersedes the manual entry.
    let reply = dispatch(
        &engine,
        &sessions,
        &OkRecognizer,
        &FixedStructurer(receipt()),
        &user,
        Event::Image(b"jpeg-bytes"),
        today(),
    )
    .await;
    assert!(matches!(reply, Reply::Buttons { .. }));

    let reply = send_button(&engine, &sessions, &user, "atm_rate").await;
    assert!(reply.body().contains("saved"));

    // Exactly one expense: the receipt, not the abandoned manual entry.
    let expenses = engine.expenses_for(user.id, None).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].amount_source, MoneyCents::new(12_000));
    assert_eq!(expenses[0].rate_category, RateCategory::Atm);

    // The old merchant-name-shaped text now falls back to help.
    let reply = send_text(&engine, &sessions, &user, "Migros").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::help());
}

#[tokio::test]
async fn rate_choice_without_staged_record_is_guidance() {
    let (engine, sessions, user) = setup().await;

    let reply = send_button(&engine, &sessions, &user, "pos_rate").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::no_pending());
    assert!(engine.expenses_for(user.id, None).await.unwrap().is_empty());

    // A staged record commits exactly once.
    send_text(&engine, &sessions, &user, "manual").await;
    send_text(&engine, &sessions, &user, "45.50").await;
    send_text(&engine, &sessions, &user, "Migros").await;
    send_button(&engine, &sessions, &user, "pos_rate").await;
    let reply = send_button(&engine, &sessions, &user, "pos_rate").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::no_pending());
    assert_eq!(engine.expenses_for(user.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn pipeline_failures_report_their_stage_and_stage_nothing() {
    let (engine, sessions, user) = setup().await;

    let reply = dispatch(
        &engine,
        &sessions,
        &FailingRecognizer,
        &FixedStructurer(receipt()),
        &user,
        Event::Image(b"jpeg-bytes"),
        today(),
    )
    .await;
    assert!(reply.body().contains("Could not read"), "got: {}", reply.body());

    let reply = dispatch(
        &engine,
        &sessions,
        &OkRecognizer,
        &FailingStructurer,
        &user,
        Event::Image(b"jpeg-bytes"),
        today(),
    )
    .await;
    assert!(reply.body().contains("make sense"), "got: {}", reply.body());

    // Neither failure staged anything.
    let reply = send_button(&engine, &sessions, &user, "pos_rate").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::no_pending());
}

#[tokio::test]
async fn summary_commands_and_period_buttons() {
    let (engine, sessions, user) = setup().await;

    send_text(&engine, &sessions, &user, "manual").await;
    send_text(&engine, &sessions, &user, "100").await;
    send_text(&engine, &sessions, &user, "Migros").await;
    send_text(&engine, &sessions, &user, "atm").await;

    let reply = send_text(&engine, &sessions, &user, "Total").await;
    let Reply::Buttons { body, buttons } = &reply else {
        panic!("expected summary buttons");
    };
    assert!(body.contains("2025-06"));
    assert_eq!(buttons[0].id, "month_2025-05");
    assert_eq!(buttons[1].id, "all_time");

    let reply = send_button(&engine, &sessions, &user, "month_2025-05").await;
    assert!(reply.body().contains("2025-05"));

    let reply = send_button(&engine, &sessions, &user, "all_time").await;
    assert!(reply.body().contains("1 transaction") || reply.body().contains("Transactions: 1"));

    let reply = send_text(&engine, &sessions, &user, "report").await;
    assert!(reply.body().contains("Top merchants"));

    // Unknown buttons fall back to help.
    let reply = send_button(&engine, &sessions, &user, "month_junk").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::help());
    let reply = send_button(&engine, &sessions, &user, "whatever").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::help());
}

#[tokio::test]
async fn greeting_and_noise_replies() {
    let (engine, sessions, user) = setup().await;

    let reply = send_text(&engine, &sessions, &user, "hello").await;
    assert!(reply.body().contains("Welcome"));

    // A bare decimal with no manual session open is not an amount entry.
    let reply = send_text(&engine, &sessions, &user, "45.50").await;
    assert_eq!(reply.body(), whatsapp_bot::ui::help());
    assert!(engine.expenses_for(user.id, None).await.unwrap().is_empty());
}
