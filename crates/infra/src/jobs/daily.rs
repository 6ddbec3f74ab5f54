use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use stockflow_core::SharedClock;

use crate::services::StockNotifier;

/// Map a local wall-clock time to an instant. A time skipped by a DST jump
/// runs one hour later; a repeated time runs at its first occurrence.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    let resolved = match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(local + Duration::hours(1))).earliest(),
    };
    resolved.map(|t| t.with_timezone(&Utc))
}

/// First instant strictly after `now` whose wall-clock time in `tz` is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    (0..=2)
        .filter_map(|days| resolve_local(tz, (today + Duration::days(days)).and_time(at)))
        .find(|candidate| *candidate > now)
        .unwrap_or(now + Duration::days(1))
}

/// Daily scheduled entry point of the stock check.
pub struct DailyStockCheck {
    notifier: Arc<StockNotifier>,
    clock: SharedClock,
    at: NaiveTime,
    tz: Tz,
    shutdown: Arc<Notify>,
}

impl DailyStockCheck {
    pub fn new(
        notifier: Arc<StockNotifier>,
        clock: SharedClock,
        at: NaiveTime,
        tz: Tz,
    ) -> Self {
        Self {
            notifier,
            clock,
            at,
            tz,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal this to stop the job. A signal sent before the job starts
    /// waiting is kept.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(at = %self.at, timezone = %self.tz, "daily stock check scheduled");

            loop {
                let now = self.clock.now();
                let next = next_run_after(now, self.at, self.tz);
                let wait = (next - now).to_std().unwrap_or(StdDuration::ZERO);
                info!(next_run = %next, "waiting for next stock check");

                tokio::select! {
                    _ = self.shutdown.notified() => {
                        info!("daily stock check received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        match self.notifier.check_and_notify().await {
                            Ok(result) => info!(
                                items_count = result.items_count,
                                outcome = ?result.outcome,
                                "scheduled stock check finished"
                            ),
                            Err(e) => error!(error = %e, "scheduled stock check failed"),
                        }
                    }
                }
            }

            info!("daily stock check stopped");
        })
    }
}
