//! Expense primitives.
//!
//! An `Expense` is one committed transaction: a TRY amount, its MWK
//! conversion under the rate the user picked, and the `YYYY-MM` bucket key
//! every aggregation groups by.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, MoneyCents, RateCategory, ResultEngine};

/// How trustworthy the extracted data is.
///
/// `Manual` marks records typed in by the user instead of extracted from a
/// receipt photo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
    Manual,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Manual => "manual",
        }
    }

    /// Returns the lower of the two confidence levels (`Manual` is treated
    /// as its own lane and never downgraded).
    #[must_use]
    pub fn capped_at(self, cap: Confidence) -> Confidence {
        match (self, cap) {
            (Self::Manual, _) => Self::Manual,
            (Self::Low, _) | (_, Self::Low) => Self::Low,
            (Self::Medium, _) | (_, Self::Medium) => Self::Medium,
            (Self::High, other) => other,
        }
    }
}

impl TryFrom<&str> for Confidence {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "manual" => Ok(Self::Manual),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid confidence: {other}"
            ))),
        }
    }
}

/// One line item on a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Unit price in source-currency minor units.
    pub price: MoneyCents,
    pub quantity: u32,
}

/// A committed transaction. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expense {
    pub id: i32,
    pub user_id: i32,
    pub merchant: String,
    pub amount_source: MoneyCents,
    pub amount_target: MoneyCents,
    pub rate_category: RateCategory,
    pub rate_value: f64,
    pub expense_date: NaiveDate,
    /// `YYYY-MM` bucket key, always derived from `expense_date`.
    pub year_month: String,
    pub items: Vec<LineItem>,
    pub confidence: Confidence,
    pub created_at: DateTime<Utc>,
}

/// Formats a date's `YYYY-MM` aggregation bucket key.
#[must_use]
pub fn year_month_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

impl Expense {
    pub fn source_currency(&self) -> Currency {
        Currency::Try
    }

    pub fn target_currency(&self) -> Currency {
        Currency::Mwk
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub merchant: String,
    pub amount_source: i64,
    pub amount_target: i64,
    pub rate_category: String,
    pub rate_value: f64,
    pub expense_date: Date,
    pub year_month: String,
    pub items_json: Option<String>,
    pub confidence: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        let items_json = if expense.items.is_empty() {
            None
        } else {
            serde_json::to_string(&expense.items).ok()
        };
        Self {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(expense.user_id),
            merchant: ActiveValue::Set(expense.merchant.clone()),
            amount_source: ActiveValue::Set(expense.amount_source.cents()),
            amount_target: ActiveValue::Set(expense.amount_target.cents()),
            rate_category: ActiveValue::Set(expense.rate_category.as_str().to_string()),
            rate_value: ActiveValue::Set(expense.rate_value),
            expense_date: ActiveValue::Set(expense.expense_date),
            year_month: ActiveValue::Set(expense.year_month.clone()),
            items_json: ActiveValue::Set(items_json),
            confidence: ActiveValue::Set(expense.confidence.as_str().to_string()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Expense> {
        let items = match model.items_json.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|err| EngineError::InvalidAmount(format!("invalid items_json: {err}")))?,
        };
        Ok(Expense {
            id: model.id,
            user_id: model.user_id,
            merchant: model.merchant,
            amount_source: MoneyCents::new(model.amount_source),
            amount_target: MoneyCents::new(model.amount_target),
            rate_category: RateCategory::try_from(model.rate_category.as_str())?,
            rate_value: model.rate_value,
            expense_date: model.expense_date,
            year_month: model.year_month,
            items,
            confidence: Confidence::try_from(model.confidence.as_str()).unwrap_or_default(),
            created_at: model.created_at,
        })
    }
}
