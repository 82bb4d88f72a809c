//! On-demand summary queries and the manual batch trigger.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;

use engine::EngineError;
use whatsapp_bot::delivery::BatchOutcome;

use crate::{ServerError, ServerState};

/// `GET /summary/{sender_id}/{period}` where `period` is `YYYY-MM`, a bare
/// `YYYY` (yearly rollup) or `all`.
pub async fn get_summary(
    State(state): State<ServerState>,
    Path((sender_id, period)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let engine = state.processor.engine();
    let user = engine
        .user_by_sender(&sender_id)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

    let summary = if period == "all" {
        serialize(&engine.summarize_all_time(user.id).await?)?
    } else if let Ok(year) = period.parse::<i32>() {
        serialize(&engine.summarize_yearly(user.id, year).await?)?
    } else if is_year_month(&period) {
        serialize(&engine.summarize(user.id, &period).await?)?
    } else {
        return Err(ServerError::Generic(format!("invalid period: {period}")));
    };

    Ok(Json(summary))
}

/// `POST /summaries/run?period=YYYY-MM`. Defaults to the previous month,
/// matching what the scheduler would send.
pub async fn run_batch(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<BatchOutcome>, ServerError> {
    let period = match params.get("period") {
        Some(period) if is_year_month(period) => period.clone(),
        Some(period) => {
            return Err(ServerError::Generic(format!("invalid period: {period}")));
        }
        None => engine::previous_year_month(Utc::now().date_naive()),
    };

    let outcome = state.processor.run_monthly_batch(&period).await;
    Ok(Json(outcome))
}

fn is_year_month(period: &str) -> bool {
    let mut parts = period.split('-');
    let (Some(year), Some(month), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    year.len() == 4
        && year.chars().all(|c| c.is_ascii_digit())
        && month.len() == 2
        && matches!(month.parse::<u32>(), Ok(1..=12))
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ServerError> {
    serde_json::to_value(value).map_err(|err| ServerError::Generic(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_validation() {
        assert!(is_year_month("2025-06"));
        assert!(!is_year_month("2025-13"));
        assert!(!is_year_month("2025"));
        assert!(!is_year_month("25-06"));
        assert!(!is_year_month("2025-06-01"));
    }
}
