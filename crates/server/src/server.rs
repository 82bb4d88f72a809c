use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use whatsapp_bot::Processor;

use crate::{summaries, webhook};

#[derive(Clone)]
pub struct ServerState {
    pub processor: Arc<Processor>,
    /// Shared secret for the channel's webhook verification handshake.
    pub verify_token: String,
}

async fn health(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "sms_enabled": state.processor.sms_configured(),
    }))
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/webhook", get(webhook::verify).post(webhook::ingest))
        .route("/health", get(health))
        .route(
            "/summary/{sender_id}/{period}",
            get(summaries::get_summary),
        )
        .route("/summaries/run", post(summaries::run_batch))
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
