//! Monthly, yearly and all-time spend aggregation.
//!
//! Summaries are computed on demand from the expense rows, never stored.
//! Every field is always present: a period with zero transactions yields
//! zero totals, an empty merchant ranking and peak day `0`, so callers can
//! format a reply without null-checking anything.

use chrono::Datelike;
use serde::Serialize;

use crate::{Expense, MoneyCents, RateCategory};

/// Sentinel shown when a period has no merchants to rank.
pub const NO_MERCHANT: &str = "N/A";

/// Period label for the unbounded summary.
pub const ALL_TIME: &str = "all time";

/// How many merchants a monthly summary ranks.
const MONTHLY_TOP_MERCHANTS: usize = 3;
/// How many merchants a yearly summary ranks.
const YEARLY_TOP_MERCHANTS: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MerchantTotal {
    pub name: String,
    pub total: MoneyCents,
}

/// Per-category totals over the fixed `{POS, ATM}` set; absent categories
/// stay at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RateBreakdown {
    pub pos: MoneyCents,
    pub atm: MoneyCents,
}

impl RateBreakdown {
    fn add(&mut self, category: RateCategory, amount: MoneyCents) {
        match category {
            RateCategory::Pos => self.pos += amount,
            RateCategory::Atm => self.atm += amount,
        }
    }

    pub fn total_for(&self, category: RateCategory) -> MoneyCents {
        match category {
            RateCategory::Pos => self.pos,
            RateCategory::Atm => self.atm,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// `YYYY-MM`, or [`ALL_TIME`] for the unbounded variant.
    pub period: String,
    pub transaction_count: u64,
    pub total_source: MoneyCents,
    pub total_target: MoneyCents,
    /// Largest target-currency totals first; ties break alphabetically.
    pub top_merchants: Vec<MerchantTotal>,
    pub rate_breakdown: RateBreakdown,
    pub average_transaction: MoneyCents,
    /// Calendar day-of-month with the highest aggregate spend; `0` when the
    /// period is empty. Ties break toward the smallest day.
    pub peak_day: u32,
    pub peak_day_total: MoneyCents,
}

impl MonthlySummary {
    /// The all-zero summary for a period without expenses.
    #[must_use]
    pub fn empty(period: &str) -> Self {
        Self {
            period: period.to_string(),
            transaction_count: 0,
            total_source: MoneyCents::ZERO,
            total_target: MoneyCents::ZERO,
            top_merchants: Vec::new(),
            rate_breakdown: RateBreakdown::default(),
            average_transaction: MoneyCents::ZERO,
            peak_day: 0,
            peak_day_total: MoneyCents::ZERO,
        }
    }

    /// Top merchant name, or the [`NO_MERCHANT`] sentinel.
    #[must_use]
    pub fn top_merchant(&self) -> &str {
        self.top_merchants
            .first()
            .map(|m| m.name.as_str())
            .unwrap_or(NO_MERCHANT)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthRollup {
    pub month: u32,
    pub period: String,
    pub transaction_count: u64,
    pub total_target: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearlySummary {
    pub year: i32,
    pub transaction_count: u64,
    pub total_source: MoneyCents,
    pub total_target: MoneyCents,
    pub rate_breakdown: RateBreakdown,
    /// One entry per calendar month, January first.
    pub monthly: Vec<MonthRollup>,
    /// Top five, ranked from the monthly top-three lists.
    pub top_merchants: Vec<MerchantTotal>,
}

/// Computes a summary over the expenses of one period.
///
/// The caller is responsible for `expenses` already being filtered to the
/// period (and user) in question.
#[must_use]
pub fn summarize(period: &str, expenses: &[Expense]) -> MonthlySummary {
    if expenses.is_empty() {
        return MonthlySummary::empty(period);
    }

    let mut total_source = MoneyCents::ZERO;
    let mut total_target = MoneyCents::ZERO;
    let mut rate_breakdown = RateBreakdown::default();
    let mut merchants: Vec<MerchantTotal> = Vec::new();
    let mut days: Vec<(u32, MoneyCents)> = Vec::new();

    for expense in expenses {
        total_source += expense.amount_source;
        total_target += expense.amount_target;
        rate_breakdown.add(expense.rate_category, expense.amount_target);

        match merchants.iter_mut().find(|m| m.name == expense.merchant) {
            Some(entry) => entry.total += expense.amount_target,
            None => merchants.push(MerchantTotal {
                name: expense.merchant.clone(),
                total: expense.amount_target,
            }),
        }

        let day = expense.expense_date.day();
        match days.iter_mut().find(|(d, _)| *d == day) {
            Some((_, total)) => *total += expense.amount_target,
            None => days.push((day, expense.amount_target)),
        }
    }

    let count = expenses.len() as u64;
    let average_transaction =
        MoneyCents::new((total_target.cents() as f64 / count as f64).round() as i64);

    let top_merchants = rank_merchants(merchants, MONTHLY_TOP_MERCHANTS);

    // Highest-spend day; ties go to the smallest day number.
    days.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let (peak_day, peak_day_total) = days.first().copied().unwrap_or((0, MoneyCents::ZERO));

    MonthlySummary {
        period: period.to_string(),
        transaction_count: count,
        total_source,
        total_target,
        top_merchants,
        rate_breakdown,
        average_transaction,
        peak_day,
        peak_day_total,
    }
}

/// Rolls twelve monthly summaries (January first) up into a yearly one.
#[must_use]
pub fn summarize_year(year: i32, months: &[MonthlySummary]) -> YearlySummary {
    let mut total_source = MoneyCents::ZERO;
    let mut total_target = MoneyCents::ZERO;
    let mut transaction_count = 0;
    let mut rate_breakdown = RateBreakdown::default();
    let mut merchants: Vec<MerchantTotal> = Vec::new();
    let mut monthly = Vec::with_capacity(months.len());

    for (idx, month) in months.iter().enumerate() {
        total_source += month.total_source;
        total_target += month.total_target;
        transaction_count += month.transaction_count;
        rate_breakdown.pos += month.rate_breakdown.pos;
        rate_breakdown.atm += month.rate_breakdown.atm;

        for merchant in &month.top_merchants {
            match merchants.iter_mut().find(|m| m.name == merchant.name) {
                Some(entry) => entry.total += merchant.total,
                None => merchants.push(merchant.clone()),
            }
        }

        monthly.push(MonthRollup {
            month: idx as u32 + 1,
            period: month.period.clone(),
            transaction_count: month.transaction_count,
            total_target: month.total_target,
        });
    }

    YearlySummary {
        year,
        transaction_count,
        total_source,
        total_target,
        rate_breakdown,
        monthly,
        top_merchants: rank_merchants(merchants, YEARLY_TOP_MERCHANTS),
    }
}

/// Largest totals first; equal totals order alphabetically by name.
fn rank_merchants(mut merchants: Vec<MerchantTotal>, keep: usize) -> Vec<MerchantTotal> {
    merchants.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    merchants.truncate(keep);
    merchants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Confidence, RateCategory};
    use chrono::{NaiveDate, Utc};

    fn expense(merchant: &str, target: i64, category: RateCategory, day: u32) -> Expense {
        Expense {
            id: 0,
            user_id: 1,
            merchant: merchant.to_string(),
            amount_source: MoneyCents::new(target / 48),
            amount_target: MoneyCents::new(target),
            rate_category: category,
            rate_value: 48.0,
            expense_date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            year_month: "2025-06".to_string(),
            items: Vec::new(),
            confidence: Confidence::High,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_period_has_defined_sentinels() {
        let summary = summarize("2025-06", &[]);
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(summary.total_source, MoneyCents::ZERO);
        assert_eq!(summary.total_target, MoneyCents::ZERO);
        assert_eq!(summary.average_transaction, MoneyCents::ZERO);
        assert_eq!(summary.top_merchant(), NO_MERCHANT);
        assert_eq!(summary.peak_day, 0);
        assert_eq!(summary.rate_breakdown.pos, MoneyCents::ZERO);
        assert_eq!(summary.rate_breakdown.atm, MoneyCents::ZERO);
    }

    #[test]
    fn totals_and_breakdown_sum_rows() {
        let rows = vec![
            expense("Migros", 10_000, RateCategory::Pos, 2),
            expense("A101", 5_000, RateCategory::Atm, 2),
            expense("Migros", 2_500, RateCategory::Pos, 9),
        ];
        let summary = summarize("2025-06", &rows);

        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.total_target, MoneyCents::new(17_500));
        assert_eq!(summary.rate_breakdown.pos, MoneyCents::new(12_500));
        assert_eq!(summary.rate_breakdown.atm, MoneyCents::new(5_000));
        assert_eq!(summary.average_transaction, MoneyCents::new(5833));
        assert_eq!(summary.top_merchant(), "Migros");
        assert_eq!(summary.peak_day, 2);
        assert_eq!(summary.peak_day_total, MoneyCents::new(15_000));
    }

    #[test]
    fn merchant_ties_break_alphabetically() {
        let rows = vec![
            expense("Şok", 5_000, RateCategory::Pos, 1),
            expense("A101", 5_000, RateCategory::Pos, 2),
            expense("Migros", 5_000, RateCategory::Pos, 3),
            expense("Bim", 4_000, RateCategory::Pos, 4),
        ];
        let summary = summarize("2025-06", &rows);
        let names: Vec<&str> = summary
            .top_merchants
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["A101", "Migros", "Şok"]);
    }

    #[test]
    fn day_ties_break_toward_smallest_day() {
        let rows = vec![
            expense("Migros", 5_000, RateCategory::Pos, 20),
            expense("A101", 5_000, RateCategory::Pos, 3),
        ];
        let summary = summarize("2025-06", &rows);
        assert_eq!(summary.peak_day, 3);
    }

    #[test]
    fn yearly_rollup_aggregates_months() {
        let june = summarize(
            "2025-06",
            &[
                expense("Migros", 10_000, RateCategory::Pos, 2),
                expense("A101", 4_000, RateCategory::Atm, 3),
            ],
        );
        let mut months: Vec<MonthlySummary> = (1..=12)
            .map(|m| MonthlySummary::empty(&format!("2025-{m:02}")))
            .collect();
        months[5] = june;

        let yearly = summarize_year(2025, &months);
        assert_eq!(yearly.transaction_count, 2);
        assert_eq!(yearly.total_target, MoneyCents::new(14_000));
        assert_eq!(yearly.rate_breakdown.atm, MoneyCents::new(4_000));
        assert_eq!(yearly.monthly.len(), 12);
        assert_eq!(yearly.monthly[5].transaction_count, 2);
        assert_eq!(yearly.top_merchants[0].name, "Migros");
    }
}
