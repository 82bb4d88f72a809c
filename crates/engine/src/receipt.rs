//! Receipt extraction records and their validation.
//!
//! The structuring provider returns loosely-typed JSON ([`RawReceipt`]).
//! [`validate`] normalizes it into an [`ExpenseDraft`], the staged record a
//! rate choice later commits. Validation is total: bad fields are corrected
//! and the confidence downgraded, never rejected, so the user always gets a
//! complete (if degraded) record to confirm.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::{Confidence, LineItem, MoneyCents};

/// Replaces a blank merchant name.
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

/// Maximum distance between a receipt date and today before the date is
/// considered bogus and replaced.
const MAX_DATE_DRIFT_DAYS: i64 = 365;

/// Structuring-provider output, as loose as the provider may produce it.
///
/// Every field is optional; amounts may arrive as JSON numbers or strings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawReceipt {
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Value>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub items: Option<Value>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub tax_amount: Option<Value>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub extraction_notes: Option<String>,
}

/// A normalized, not-yet-committed expense awaiting a rate choice.
///
/// Produced by [`validate`] for receipt photos and by
/// [`ExpenseDraft::manual`] for the typed-in flow.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseDraft {
    pub merchant: String,
    /// Total in source-currency (TRY) minor units.
    pub amount: MoneyCents,
    pub date: NaiveDate,
    pub items: Vec<LineItem>,
    pub receipt_number: Option<String>,
    pub tax: Option<MoneyCents>,
    pub confidence: Confidence,
    /// Corrections applied during validation, shown to the user verbatim.
    pub notes: Vec<String>,
}

impl ExpenseDraft {
    /// Builds a draft from the completed manual-entry dialogue.
    #[must_use]
    pub fn manual(merchant: &str, amount: MoneyCents, today: NaiveDate) -> Self {
        Self {
            merchant: normalize_merchant(merchant),
            amount,
            date: today,
            items: Vec::new(),
            receipt_number: None,
            tax: None,
            confidence: Confidence::Manual,
            notes: Vec::new(),
        }
    }
}

/// Normalizes a raw structuring result into a committable draft.
///
/// Corrections (spec'd order):
/// - non-numeric or non-positive total ⇒ `0.00`, confidence forced to low
/// - missing/unparsable date, or a date more than a year away from `today`,
///   ⇒ `today`, confidence capped at medium
/// - non-list items ⇒ empty list; item quantities clamped to ≥ 1
/// - unknown confidence tag ⇒ medium
/// - blank merchant ⇒ [`UNKNOWN_MERCHANT`], confidence forced to low
#[must_use]
pub fn validate(raw: &RawReceipt, today: NaiveDate) -> ExpenseDraft {
    let mut notes = Vec::new();
    let mut confidence = raw
        .confidence
        .as_deref()
        .and_then(|c| Confidence::try_from(c).ok())
        .unwrap_or_default();

    let amount = match raw.total_amount.as_ref().and_then(coerce_amount) {
        Some(amount) if amount.is_positive() => amount,
        _ => {
            notes.push("total amount unreadable, set to 0.00".to_string());
            confidence = Confidence::Low;
            MoneyCents::ZERO
        }
    };

    let date = match raw.date.as_deref().and_then(parse_receipt_date) {
        Some(date) if (date - today).num_days().abs() <= MAX_DATE_DRIFT_DAYS => date,
        Some(date) => {
            notes.push(format!("date {date} out of range, using today"));
            confidence = confidence.capped_at(Confidence::Medium);
            today
        }
        None => {
            notes.push("date missing or unreadable, using today".to_string());
            confidence = confidence.capped_at(Confidence::Medium);
            today
        }
    };

    let items = raw.items.as_ref().map(coerce_items).unwrap_or_default();

    let merchant = match raw.merchant_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => normalize_merchant(name),
        _ => {
            notes.push("merchant name missing".to_string());
            confidence = Confidence::Low;
            UNKNOWN_MERCHANT.to_string()
        }
    };

    if let Some(extra) = raw.extraction_notes.as_deref().map(str::trim)
        && !extra.is_empty()
    {
        notes.push(extra.to_string());
    }

    ExpenseDraft {
        merchant,
        amount,
        date,
        items,
        receipt_number: raw
            .receipt_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        tax: raw.tax_amount.as_ref().and_then(coerce_amount),
        confidence,
        notes,
    }
}

/// NFC-normalizes and whitespace-collapses a merchant name so aggregation
/// groups visually-identical names.
#[must_use]
pub fn normalize_merchant(name: &str) -> String {
    name.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .nfc()
        .collect()
}

/// Coerces a JSON number or numeric string into minor units.
fn coerce_amount(value: &Value) -> Option<MoneyCents> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|v| MoneyCents::new((v * 100.0).round() as i64)),
        Value::String(s) => {
            // Receipts use the Turkish decimal comma; MoneyCents accepts both.
            s.trim().parse::<MoneyCents>().ok().or_else(|| {
                s.trim()
                    .replace(',', ".")
                    .parse::<f64>()
                    .ok()
                    .map(|v| MoneyCents::new((v * 100.0).round() as i64))
            })
        }
        _ => None,
    }
}

fn coerce_items(value: &Value) -> Vec<LineItem> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("Unknown")
                .to_string();
            let price = obj.get("price").and_then(coerce_amount)?;
            let quantity = obj
                .get("quantity")
                .and_then(Value::as_u64)
                .map(|q| q.max(1).min(u32::MAX as u64) as u32)
                .unwrap_or(1);
            Some(LineItem {
                name,
                price,
                quantity,
            })
        })
        .collect()
}

/// Best-effort receipt date parser.
///
/// Tries ISO `YYYY-MM-DD` first (what the structuring prompt asks for), then
/// the day-first layouts that actually appear on the receipts:
/// `DD/MM/YY(YY)`, `DD.MM.YY(YY)`, `DD-MM-YY(YY)`.
#[must_use]
pub fn parse_receipt_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    for separator in ['/', '.', '-'] {
        let parts: Vec<&str> = trimmed.split(separator).collect();
        let [day, month, year] = parts.as_slice() else {
            continue;
        };
        let day: u32 = day.trim().parse().ok()?;
        let month: u32 = month.trim().parse().ok()?;
        let year = year.trim();
        let year: i32 = match year.len() {
            2 => 2000 + year.parse::<i32>().ok()?,
            4 => year.parse().ok()?,
            _ => return None,
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn day_first_dates_are_recovered() {
        assert_eq!(
            parse_receipt_date("15/03/25"),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        assert_eq!(
            parse_receipt_date("05.07.24"),
            NaiveDate::from_ymd_opt(2024, 7, 5)
        );
        assert_eq!(
            parse_receipt_date("28-02-2025"),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(
            parse_receipt_date("2025-03-15"),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        assert_eq!(parse_receipt_date("sometime in March"), None);
    }

    #[test]
    fn far_future_date_is_replaced_with_today() {
        let future = today() + chrono::Days::new(400);
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!(45.5)),
            date: Some(future.format("%Y-%m-%d").to_string()),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        let draft = validate(&raw, today());
        assert_eq!(draft.date, today());
        assert_eq!(draft.confidence, Confidence::Medium);
        assert!(!draft.notes.is_empty());
    }

    #[test]
    fn recent_date_within_a_year_is_kept() {
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!(45.5)),
            date: Some("15/03/25".to_string()),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        let draft = validate(&raw, today());
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(draft.confidence, Confidence::High);
    }

    #[test]
    fn unreadable_amount_forces_low_confidence() {
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!("unknown")),
            date: Some("2025-06-10".to_string()),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        let draft = validate(&raw, today());
        assert_eq!(draft.amount, MoneyCents::ZERO);
        assert_eq!(draft.confidence, Confidence::Low);
    }

    #[test]
    fn turkish_decimal_comma_amount_is_parsed() {
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!("25,40")),
            date: Some("2025-06-10".to_string()),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        assert_eq!(validate(&raw, today()).amount, MoneyCents::new(2540));
    }

    #[test]
    fn blank_merchant_is_replaced_with_sentinel() {
        let raw = RawReceipt {
            merchant_name: Some("   ".to_string()),
            total_amount: Some(json!(10.0)),
            date: Some("2025-06-10".to_string()),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        let draft = validate(&raw, today());
        assert_eq!(draft.merchant, UNKNOWN_MERCHANT);
        assert_eq!(draft.confidence, Confidence::Low);
    }

    #[test]
    fn unknown_confidence_defaults_to_medium() {
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!(10.0)),
            date: Some("2025-06-10".to_string()),
            confidence: Some("certain".to_string()),
            ..RawReceipt::default()
        };

        assert_eq!(validate(&raw, today()).confidence, Confidence::Medium);
    }

    #[test]
    fn non_list_items_coerce_to_empty() {
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!(10.0)),
            date: Some("2025-06-10".to_string()),
            items: Some(json!("none")),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        assert!(validate(&raw, today()).items.is_empty());
    }

    #[test]
    fn items_are_coerced_with_min_quantity() {
        let raw = RawReceipt {
            merchant_name: Some("Migros".to_string()),
            total_amount: Some(json!(10.0)),
            date: Some("2025-06-10".to_string()),
            items: Some(json!([
                {"name": "Süt", "price": 25.0, "quantity": 2},
                {"name": "", "price": "3,40", "quantity": 0},
                {"name": "no price"}
            ])),
            confidence: Some("high".to_string()),
            ..RawReceipt::default()
        };

        let draft = validate(&raw, today());
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].name, "Süt");
        assert_eq!(draft.items[0].price, MoneyCents::new(2500));
        assert_eq!(draft.items[1].name, "Unknown");
        assert_eq!(draft.items[1].quantity, 1);
    }

    #[test]
    fn merchant_names_are_whitespace_collapsed() {
        assert_eq!(normalize_merchant("  Migros   Jet "), "Migros Jet");
    }
}
