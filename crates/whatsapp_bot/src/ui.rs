//! Message rendering.
//!
//! All user-facing copy lives here: dialogue prompts, the rate-choice
//! keyboard, commit confirmations, monthly reports and the short SMS
//! variant. Channel A understands `*emphasis*` markup; the SMS text is kept
//! plain and single-segment sized.

use engine::{
    Confidence, Currency, Expense, ExpenseDraft, MonthlySummary, RateCategory, RateTable,
};

/// One reply button (id + short label). The channel caps a message at three.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

impl Button {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

/// How many line items the rate prompt previews.
const PREVIEW_ITEMS: usize = 3;

pub fn welcome() -> String {
    "🤖 *Welcome to the receipt tracker!*\n\n\
     Send a photo of a Turkish receipt and I extract the details, convert \
     to MWK and track your monthly spending.\n\n\
     *Commands:*\n\
     • \"total\" – current month totals\n\
     • \"report\" – detailed monthly report\n\
     • \"manual\" – type an expense in by hand\n\
     • \"help\" – this overview"
        .to_string()
}

pub fn help() -> String {
    "📋 *Help*\n\n\
     📸 Send a clear receipt photo, then pick the POS or ATM rate when asked.\n\
     ✍️ \"manual\" records an expense without a photo.\n\
     📊 \"total\" shows this month, \"report\" the full breakdown.\n\n\
     Having trouble? Make sure the photo is sharp and well lit."
        .to_string()
}

pub fn amount_prompt() -> String {
    "✍️ Manual entry: send the amount in TRY (for example 45.50).".to_string()
}

pub fn amount_invalid() -> String {
    "That doesn't look like an amount. Send a number between 0.01 and 10000.00, like 45.50."
        .to_string()
}

pub fn merchant_prompt() -> String {
    "Got it. Now send the merchant name (2–50 characters).".to_string()
}

pub fn merchant_invalid() -> String {
    "Merchant names need 2–50 characters. Try again.".to_string()
}

pub fn no_pending() -> String {
    "There's no pending transaction. Send a receipt photo or \"manual\" to start one.".to_string()
}

pub fn media_unavailable() -> String {
    "❌ Could not download the image. Please send it again.".to_string()
}

pub fn extraction_failed(stage: &str, message: &str) -> String {
    match stage {
        "ocr" => format!("❌ Could not read the receipt ({message}). Try a sharper photo."),
        _ => format!("❌ Could not make sense of the receipt ({message}). Try again."),
    }
}

pub fn commit_failed() -> String {
    "❌ Saving failed on our side. Please try the rate choice again.".to_string()
}

fn confidence_emoji(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "✅",
        Confidence::Medium => "⚠️",
        Confidence::Low => "❌",
        Confidence::Manual => "✍️",
    }
}

/// The rate-choice prompt for a staged record, previewing both conversions
/// and up to three line items.
pub fn rate_prompt(draft: &ExpenseDraft, rates: RateTable) -> (String, Vec<Button>) {
    let pos = rates.convert(draft.amount, RateCategory::Pos);
    let atm = rates.convert(draft.amount, RateCategory::Atm);

    let mut text = format!(
        "{} *Receipt ready*\n\n\
         🏪 {}\n💰 {}\n📅 {}\n",
        confidence_emoji(draft.confidence),
        draft.merchant,
        draft.amount.format(Currency::Try),
        draft.date,
    );

    if !draft.items.is_empty() {
        text.push_str(&format!("🛍️ {} items\n", draft.items.len()));
        for item in draft.items.iter().take(PREVIEW_ITEMS) {
            text.push_str(&format!(
                "   • {} – {}\n",
                item.name,
                item.price.format(Currency::Try)
            ));
        }
        if draft.items.len() > PREVIEW_ITEMS {
            text.push_str(&format!(
                "   • … and {} more\n",
                draft.items.len() - PREVIEW_ITEMS
            ));
        }
    }

    for note in &draft.notes {
        text.push_str(&format!("ℹ️ {note}\n"));
    }

    text.push_str(&format!(
        "\n💱 *Which rate applies?*\n\
         🏪 POS (1 TL = {:.2} MWK) → *{}*\n\
         🏧 ATM (1 TL = {:.2} MWK) → *{}*",
        rates.pos,
        pos.format(Currency::Mwk),
        rates.atm,
        atm.format(Currency::Mwk),
    ));

    let buttons = vec![
        Button::new("pos_rate", "🏪 POS rate"),
        Button::new("atm_rate", "🏧 ATM rate"),
    ];
    (text, buttons)
}

/// Commit confirmation: the saved purchase plus the fresh month snapshot.
pub fn expense_saved(expense: &Expense, summary: &MonthlySummary) -> String {
    format!(
        "✅ *Receipt saved!*\n\n\
         *This purchase:*\n\
         🏪 {}\n\
         💰 {} → *{}*\n\
         📊 Rate: {} ({:.2})\n\
         📅 Date: {}\n\n\
         *Monthly summary ({}):*\n\
         💵 {} total\n\
         ₺ {} total\n\
         🧾 {} transactions\n\n\
         _Send \"total\" anytime to see the current month._",
        expense.merchant,
        expense.amount_source.format(Currency::Try),
        expense.amount_target.format(Currency::Mwk),
        expense.rate_category,
        expense.rate_value,
        expense.expense_date,
        summary.period,
        summary.total_target.format(Currency::Mwk),
        summary.total_source,
        summary.transaction_count,
    )
}

/// Short summary text plus the period-navigation buttons.
pub fn summary_reply(summary: &MonthlySummary, previous_period: &str) -> (String, Vec<Button>) {
    let text = format!(
        "📊 *Spending – {}*\n\n\
         💰 {} → *{}*\n\
         🧾 {} transactions\n\
         🏪 Top merchant: {}",
        summary.period,
        summary.total_source.format(Currency::Try),
        summary.total_target.format(Currency::Mwk),
        summary.transaction_count,
        summary.top_merchant(),
    );

    let buttons = vec![
        Button::new(&format!("month_{previous_period}"), "⬅️ Last month"),
        Button::new("all_time", "🗓️ All time"),
    ];
    (text, buttons)
}

/// The detailed monthly report ("report" command).
pub fn monthly_report(summary: &MonthlySummary) -> String {
    if summary.transaction_count == 0 {
        return format!("📊 No transactions found for {}.", summary.period);
    }

    let mut text = format!(
        "📊 *{} report*\n\n\
         *Totals:*\n\
         • Turkish Lira: {}\n\
         • Malawi Kwacha: {}\n\
         • Transactions: {}\n\
         • Average per transaction: {}\n\n\
         *Top merchants:*",
        summary.period,
        summary.total_source.format(Currency::Try),
        summary.total_target.format(Currency::Mwk),
        summary.transaction_count,
        summary.average_transaction.format(Currency::Mwk),
    );

    for (idx, merchant) in summary.top_merchants.iter().enumerate() {
        text.push_str(&format!(
            "\n{}. {}: {}",
            idx + 1,
            merchant.name,
            merchant.total.format(Currency::Mwk)
        ));
    }

    text.push_str(&format!(
        "\n\n*Payment methods:*\n\
         • POS: {}\n\
         • ATM: {}\n\n\
         *Insights:*\n\
         • Highest spending day: {} ({})",
        summary.rate_breakdown.pos.format(Currency::Mwk),
        summary.rate_breakdown.atm.format(Currency::Mwk),
        summary.peak_day,
        summary.peak_day_total.format(Currency::Mwk),
    ));

    text
}

/// The monthly summary as delivered over channel A.
pub fn delivery_message(summary: &MonthlySummary) -> String {
    monthly_report(summary)
}

/// The monthly summary as delivered over channel B; plain text, oriented at
/// a single 160-character segment.
pub fn sms_summary(summary: &MonthlySummary) -> String {
    format!(
        "{} spending: {} TRY -> {} MWK, {} receipts. Top: {}. Receipt tracker",
        summary.period,
        summary.total_source,
        summary.total_target,
        summary.transaction_count,
        summary.top_merchant(),
    )
}
