use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "fisbot={level},whatsapp_bot={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Arc::new(
        engine::Engine::builder()
            .database(db)
            .rates(engine::RateTable::new(settings.rates.pos, settings.rates.atm))
            .build(),
    );

    let mut builder = whatsapp_bot::Processor::builder()
        .engine(engine)
        .whatsapp(
            &settings.whatsapp.access_token,
            &settings.whatsapp.phone_number_id,
        )
        .providers(
            &settings.providers.vision_api_key,
            &settings.providers.gemini_api_key,
        );
    if let Some(sms) = &settings.sms {
        builder = builder.sms_gateway(&sms.gateway_url, &sms.sender_id);
    } else {
        tracing::warn!("no sms gateway configured - summaries go out chat-only");
    }
    let processor = Arc::new(builder.build()?);

    let state = server::ServerState {
        processor: processor.clone(),
        verify_token: settings.whatsapp.verify_token.clone(),
    };
    let bind = settings.server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    tasks.spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!("failed to bind server listener: {err}");
                return;
            }
        };
        if let Err(err) = server::run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    tasks.spawn(async move {
        whatsapp_bot::scheduler::run(processor).await;
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
