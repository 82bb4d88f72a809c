//! Webhook verification and event ingestion.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use api_types::webhook::Envelope;

use crate::ServerState;

/// Channel-side verification handshake: echo the challenge when the token
/// matches, 403 otherwise. Query keys arrive dotted (`hub.mode`, ...).
pub async fn verify(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        tracing::info!("webhook verification successful");
        challenge.into_response()
    } else {
        tracing::warn!("webhook verification failed");
        (StatusCode::FORBIDDEN, "Verification failed").into_response()
    }
}

/// Inbound event ingestion.
///
/// Malformed or message-less envelopes are logged and answered with a
/// neutral ok: the channel retries on error statuses and the sender must
/// never see a transport-level failure. Messages are processed in arrival
/// order within the envelope.
pub async fn ingest(State(state): State<ServerState>, body: Bytes) -> Json<serde_json::Value> {
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!("unparseable webhook payload: {err}");
            return Json(serde_json::json!({ "status": "ok" }));
        }
    };

    let events = envelope.into_events();
    if events.is_empty() {
        return Json(serde_json::json!({ "status": "ok" }));
    }

    for message in events {
        state.processor.handle_message(message).await;
    }

    Json(serde_json::json!({ "status": "ok" }))
}
