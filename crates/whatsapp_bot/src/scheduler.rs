//! Monthly summary schedule.
//!
//! Fires at 09:00 on the 1st of each month in the user's timezone
//! (Africa/Blantyre) and delivers the previous month's summaries.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Africa::Blantyre;
use chrono_tz::Tz;

use crate::Processor;

const RUN_HOUR: u32 = 9;

/// First upcoming `1st, 09:00` strictly after `now`.
pub fn next_monthly_run(now: DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive();
    let this_months = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .and_then(|d| d.and_hms_opt(RUN_HOUR, 0, 0))
        .and_then(|dt| now.timezone().from_local_datetime(&dt).single());

    if let Some(run) = this_months
        && run > now
    {
        return run;
    }

    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };

    // The 1st at 09:00 always exists in this timezone.
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(RUN_HOUR, 0, 0))
        .and_then(|dt| now.timezone().from_local_datetime(&dt).single())
        .unwrap_or_else(|| now + chrono::Duration::days(28))
}

/// Runs the monthly batch forever. Spawn alongside the server.
pub async fn run(processor: std::sync::Arc<Processor>) {
    loop {
        let now = Utc::now().with_timezone(&Blantyre);
        let next = next_monthly_run(now);
        let wait = (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        tracing::info!("next monthly summary run at {next}");
        tokio::time::sleep(wait).await;

        let period = engine::previous_year_month(next.date_naive());
        let outcome = processor.run_monthly_batch(&period).await;
        tracing::info!(
            period = %period,
            total = outcome.total_users,
            "scheduled monthly summaries sent"
        );
    }
}
