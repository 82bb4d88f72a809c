use chrono::NaiveDate;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    Confidence, Engine, ExpenseDraft, MoneyCents, RateCategory, RateTable, receipt::RawReceipt,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .rates(RateTable::new(48.0, 54.0))
        .build();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, String, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .rates(RateTable::new(48.0, 54.0))
        .build();

    (engine, url, path)
}

fn draft(merchant: &str, amount: i64, date: (i32, u32, u32)) -> ExpenseDraft {
    let mut draft = ExpenseDraft::manual(
        merchant,
        MoneyCents::new(amount),
        NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
    );
    draft.confidence = Confidence::High;
    draft
}

#[tokio::test]
async fn first_contact_creates_user_with_phone_fallback() {
    let (engine, _db) = engine_with_db().await;

    let user = engine.get_or_create_user("265991304876").await.unwrap();
    assert_eq!(user.sender_id, "265991304876");
    assert_eq!(user.phone_number.as_deref(), Some("+265991304876"));

    let again = engine.get_or_create_user("265991304876").await.unwrap();
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn non_numeric_sender_gets_no_phone() {
    let (engine, _db) = engine_with_db().await;
    let user = engine.get_or_create_user("web:alice").await.unwrap();
    assert_eq!(user.phone_number, None);
}

#[tokio::test]
async fn commit_applies_rate_and_year_month() {
    let (engine, _db) = engine_with_db().await;
    let user = engine.get_or_create_user("265991304876").await.unwrap();

    let (expense, summary) = engine
        .commit_expense(user.id, draft("Migros", 50_75, (2025, 6, 2)), RateCategory::Pos)
        .await
        .unwrap();

    // 50.75 TRY * 48.00 = 2436.00 MWK
    assert_eq!(expense.amount_target, MoneyCents::new(243_600));
    assert_eq!(expense.rate_value, 48.0);
    assert_eq!(expense.year_month, "2025-06");
    assert_eq!(summary.period, "2025-06");
    assert_eq!(summary.transaction_count, 1);
    assert_eq!(summary.total_target, MoneyCents::new(243_600));
}

#[tokio::test]
async fn commit_target_matches_rounded_arithmetic() {
    let (engine, _db) = engine_with_db().await;
    let user = engine.get_or_create_user("265991304876").await.unwrap();

    for (cents, category) in [
        (1i64, RateCategory::Pos),
        (103, RateCategory::Atm),
        (45_50, RateCategory::Pos),
        (9_999_99, RateCategory::Atm),
    ] {
        let (expense, _) = engine
            .commit_expense(user.id, draft("Migros", cents, (2025, 6, 2)), category)
            .await
            .unwrap();
        let expected = (cents as f64 * expense.rate_value).round() as i64;
        assert_eq!(expense.amount_target.cents(), expected);
        assert_eq!(engine::year_month_of(expense.expense_date), expense.year_month);
    }
}

#[tokio::test]
async fn summaries_total_rows_and_are_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let user = engine.get_or_create_user("265991304876").await.unwrap();

    engine
        .commit_expense(user.id, draft("Migros", 100_00, (2025, 6, 2)), RateCategory::Pos)
        .await
        .unwrap();
    engine
        .commit_expense(user.id, draft("A101", 50_00, (2025, 6, 9)), RateCategory::Atm)
        .await
        .unwrap();
    engine
        .commit_expense(user.id, draft("Migros", 25_00, (2025, 7, 1)), RateCategory::Pos)
        .await
        .unwrap();

    let june = engine.summarize(user.id, "2025-06").await.unwrap();
    assert_eq!(june.transaction_count, 2);
    assert_eq!(june.total_source, MoneyCents::new(150_00));
    // 100 * 48 + 50 * 54 = 7500 MWK
    assert_eq!(june.total_target, MoneyCents::new(750_000));
    assert_eq!(june.rate_breakdown.pos, MoneyCents::new(480_000));
    assert_eq!(june.rate_breakdown.atm, MoneyCents::new(270_000));

    let again = engine.summarize(user.id, "2025-06").await.unwrap();
    assert_eq!(june, again);

    let empty = engine.summarize(user.id, "2025-01").await.unwrap();
    assert_eq!(empty.transaction_count, 0);
    assert_eq!(empty.total_target, MoneyCents::ZERO);
    assert_eq!(empty.top_merchant(), engine::NO_MERCHANT);
    assert_eq!(empty.peak_day, 0);

    let all_time = engine.summarize_all_time(user.id).await.unwrap();
    assert_eq!(all_time.transaction_count, 3);
    assert_eq!(all_time.period, engine::ALL_TIME);

    let yearly = engine.summarize_yearly(user.id, 2025).await.unwrap();
    assert_eq!(yearly.transaction_count, 3);
    assert_eq!(yearly.monthly.len(), 12);
    assert_eq!(yearly.monthly[5].transaction_count, 2);
    assert_eq!(yearly.top_merchants[0].name, "Migros");
}

#[tokio::test]
async fn receipt_draft_commits_with_items() {
    let (engine, _db) = engine_with_db().await;
    let user = engine.get_or_create_user("265991304876").await.unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

    let raw = RawReceipt {
        merchant_name: Some("Migros".to_string()),
        total_amount: Some(serde_json::json!(45.5)),
        date: Some("10/06/25".to_string()),
        items: Some(serde_json::json!([
            {"name": "Süt", "price": 25.0, "quantity": 1},
            {"name": "Ekmek", "price": 20.5, "quantity": 1}
        ])),
        confidence: Some("high".to_string()),
        ..RawReceipt::default()
    };
    let draft = engine::receipt::validate(&raw, today);

    let (expense, _) = engine
        .commit_expense(user.id, draft, RateCategory::Atm)
        .await
        .unwrap();
    assert_eq!(expense.items.len(), 2);
    assert_eq!(expense.rate_category, RateCategory::Atm);
    assert_eq!(expense.year_month, "2025-06");

    let reloaded = engine.expenses_for(user.id, Some("2025-06")).await.unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].items, expense.items);
}

#[tokio::test]
async fn batch_recipients_are_users_with_expenses_in_period() {
    let (engine, _db) = engine_with_db().await;
    let alice = engine.get_or_create_user("265991000001").await.unwrap();
    let bob = engine.get_or_create_user("265991000002").await.unwrap();
    let _idle = engine.get_or_create_user("265991000003").await.unwrap();

    engine
        .commit_expense(alice.id, draft("Migros", 10_00, (2025, 6, 1)), RateCategory::Pos)
        .await
        .unwrap();
    engine
        .commit_expense(bob.id, draft("A101", 10_00, (2025, 6, 3)), RateCategory::Pos)
        .await
        .unwrap();
    engine
        .commit_expense(alice.id, draft("Şok", 10_00, (2025, 5, 3)), RateCategory::Pos)
        .await
        .unwrap();

    let due = engine.users_with_expenses_in("2025-06").await.unwrap();
    let ids: Vec<i32> = due.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![alice.id, bob.id]);

    assert!(engine.users_with_expenses_in("2024-01").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_expense_is_administrative_only() {
    let (engine, _db) = engine_with_db().await;
    let user = engine.get_or_create_user("265991304876").await.unwrap();
    let (expense, _) = engine
        .commit_expense(user.id, draft("Migros", 10_00, (2025, 6, 1)), RateCategory::Pos)
        .await
        .unwrap();

    engine.delete_expense(expense.id).await.unwrap();
    assert!(engine.all_expenses().await.unwrap().is_empty());
    assert!(engine.delete_expense(expense.id).await.is_err());
}

#[tokio::test]
async fn expenses_survive_reconnect() {
    let (engine, url, path) = engine_with_file_db().await;
    let user = engine.get_or_create_user("265991304876").await.unwrap();
    engine
        .commit_expense(user.id, draft("Migros", 45_50, (2025, 6, 2)), RateCategory::Pos)
        .await
        .unwrap();
    drop(engine);

    let db = Database::connect(&url).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .rates(RateTable::new(48.0, 54.0))
        .build();
    let summary = engine.summarize(user.id, "2025-06").await.unwrap();
    assert_eq!(summary.transaction_count, 1);

    let _ = std::fs::remove_file(path);
}
