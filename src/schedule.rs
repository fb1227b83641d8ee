//! Daily harvest schedule
//!
//! Runs a harvest immediately, then once a day at the configured local time
//! until interrupted.

use crate::config::{parse_daily_at, Config};
use crate::crawler::harvest;
use crate::shutdown::Shutdown;
use crate::Result;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use std::time::Duration;

/// Time until the next occurrence of `at` strictly after `now`
pub fn next_run_delay(at: NaiveTime, now: NaiveDateTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Harvests now and then every day at `schedule.daily-at`
///
/// Returns `Ok(())` when interrupted while waiting. A failed pass ends the
/// schedule with its error.
pub async fn run_daily(config: Config, shutdown: Shutdown) -> Result<()> {
    let at = parse_daily_at(&config.schedule.daily_at)?;

    loop {
        let reports = harvest(config.clone(), shutdown.clone()).await?;
        let appended: usize = reports.iter().map(|r| r.appended).sum();
        tracing::info!("Harvest pass finished, {} rows appended", appended);

        let delay = next_run_delay(at, Local::now().naive_local());
        tracing::info!(
            "Next harvest at {} (in {} minutes)",
            at.format("%H:%M"),
            delay.as_secs() / 60
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.triggered() => {
                tracing::info!("Schedule stopped on interrupt");
                return Ok(());
            }
        }
    }
}
