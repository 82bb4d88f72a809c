use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, prelude::*,
};

pub use currency::Currency;
pub use error::EngineError;
pub use expenses::{Confidence, Expense, LineItem, year_month_of};
pub use money::MoneyCents;
pub use rates::{RateCategory, RateTable};
pub use receipt::{ExpenseDraft, RawReceipt, UNKNOWN_MERCHANT};
pub use summary::{ALL_TIME, MonthlySummary, NO_MERCHANT, YearlySummary};

mod currency;
mod error;
pub mod expenses;
mod money;
mod rates;
pub mod receipt;
pub mod summary;
pub mod users;

type ResultEngine<T> = Result<T, EngineError>;

/// Domain engine: users, committed expenses and their aggregation.
///
/// The engine owns nothing mutable in memory; every operation reads from or
/// appends to the database, so concurrent commits for different users are
/// independent and a commit is a single atomic insert.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    rates: RateTable,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The configured POS/ATM rate table.
    pub fn rates(&self) -> RateTable {
        self.rates
    }

    /// Looks a user up by the opaque channel sender id.
    pub async fn user_by_sender(&self, sender_id: &str) -> ResultEngine<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::SenderId.eq(sender_id))
            .one(&self.database)
            .await?)
    }

    /// Returns the user for a sender id, creating the row on first contact.
    ///
    /// WhatsApp sender ids are phone numbers in practice, so an all-digit
    /// sender id doubles as the SMS fallback number.
    pub async fn get_or_create_user(&self, sender_id: &str) -> ResultEngine<users::Model> {
        if let Some(user) = self.user_by_sender(sender_id).await? {
            return Ok(user);
        }

        let phone_number = sender_id
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| format!("+{sender_id}"));

        let user = users::ActiveModel {
            id: ActiveValue::NotSet,
            sender_id: ActiveValue::Set(sender_id.to_string()),
            phone_number: ActiveValue::Set(phone_number),
            created_at: ActiveValue::Set(Utc::now()),
        };
        Ok(user.insert(&self.database).await?)
    }

    /// Commits a staged record under the chosen rate category.
    ///
    /// Appends exactly one expense row (`amount_target` derived from the
    /// rate table, `year_month` from the validated transaction date) and
    /// returns the persisted expense together with a fresh summary of that
    /// month for the confirmation message.
    pub async fn commit_expense(
        &self,
        user_id: i32,
        draft: ExpenseDraft,
        category: RateCategory,
    ) -> ResultEngine<(Expense, MonthlySummary)> {
        let rate_value = self.rates.rate_for(category);
        let amount_target = self.rates.convert(draft.amount, category);
        let year_month = year_month_of(draft.date);

        let expense = Expense {
            id: 0,
            user_id,
            merchant: draft.merchant,
            amount_source: draft.amount,
            amount_target,
            rate_category: category,
            rate_value,
            expense_date: draft.date,
            year_month: year_month.clone(),
            items: draft.items,
            confidence: draft.confidence,
            created_at: Utc::now(),
        };

        let model = expenses::ActiveModel::from(&expense)
            .insert(&self.database)
            .await?;
        let expense = Expense::try_from(model)?;

        let summary = self.summarize(user_id, &year_month).await?;
        Ok((expense, summary))
    }

    /// Loads one user's expenses, newest first, optionally scoped to a
    /// `YYYY-MM` bucket.
    pub async fn expenses_for(
        &self,
        user_id: i32,
        year_month: Option<&str>,
    ) -> ResultEngine<Vec<Expense>> {
        let mut query = expenses::Entity::find().filter(expenses::Column::UserId.eq(user_id));
        if let Some(year_month) = year_month {
            query = query.filter(expenses::Column::YearMonth.eq(year_month));
        }
        let models = query
            .order_by_desc(expenses::Column::ExpenseDate)
            .all(&self.database)
            .await?;

        models.into_iter().map(Expense::try_from).collect()
    }

    /// Monthly summary for one `YYYY-MM` bucket.
    pub async fn summarize(&self, user_id: i32, year_month: &str) -> ResultEngine<MonthlySummary> {
        let expenses = self.expenses_for(user_id, Some(year_month)).await?;
        Ok(summary::summarize(year_month, &expenses))
    }

    /// Summary over the user's entire history.
    pub async fn summarize_all_time(&self, user_id: i32) -> ResultEngine<MonthlySummary> {
        let expenses = self.expenses_for(user_id, None).await?;
        Ok(summary::summarize(ALL_TIME, &expenses))
    }

    /// Yearly rollup over the twelve calendar months of `year`.
    pub async fn summarize_yearly(&self, user_id: i32, year: i32) -> ResultEngine<YearlySummary> {
        let mut months = Vec::with_capacity(12);
        for month in 1..=12 {
            let period = format!("{year}-{month:02}");
            months.push(self.summarize(user_id, &period).await?);
        }
        Ok(summary::summarize_year(year, &months))
    }

    /// Users with at least one expense in the given `YYYY-MM` bucket, i.e.
    /// the recipients of the monthly delivery batch.
    pub async fn users_with_expenses_in(
        &self,
        year_month: &str,
    ) -> ResultEngine<Vec<users::Model>> {
        let mut user_ids: Vec<i32> = expenses::Entity::find()
            .filter(expenses::Column::YearMonth.eq(year_month))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|row| row.user_id)
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?)
    }

    /// Lists every expense (administrative surface).
    pub async fn all_expenses(&self) -> ResultEngine<Vec<Expense>> {
        let models = expenses::Entity::find()
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Expense::try_from).collect()
    }

    /// Deletes one expense row (administrative surface; the conversational
    /// core never deletes).
    pub async fn delete_expense(&self, expense_id: i32) -> ResultEngine<()> {
        let tx = self.database.begin().await?;
        let Some(model) = expenses::Entity::find_by_id(expense_id).one(&tx).await? else {
            return Err(EngineError::KeyNotFound("expense not exists".to_string()));
        };
        model.delete(&tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Returns the `YYYY-MM` bucket of the month before `today`.
#[must_use]
pub fn previous_year_month(today: NaiveDate) -> String {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    format!("{year}-{month:02}")
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    rates: Option<RateTable>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the configured POS/ATM rate table.
    pub fn rates(mut self, rates: RateTable) -> EngineBuilder {
        self.rates = Some(rates);
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
            rates: self.rates.unwrap_or(RateTable {
                pos: 48.0,
                atm: 54.0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_year_month_wraps_january() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(previous_year_month(jan), "2024-12");

        let july = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(previous_year_month(july), "2025-06");
    }
}
