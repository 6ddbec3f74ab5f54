use std::sync::Arc;

use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use stockflow_core::SharedClock;
use stockflow_notifications::{
    CheckOutcome, CheckResult, NewNotificationRecord, NotificationRecord, NotificationWindow,
    StockReport,
};

use super::ServiceResult;
use crate::mail::Mailer;
use crate::store::{InventoryRepository, NotificationRepository, SharedStore};

/// Low-stock alerting.
///
/// The scheduler, the token endpoint and the admin trigger all go through
/// [`StockNotifier::check_and_notify`]. Checks are serialized so two callers
/// cannot both pass the window.
pub struct StockNotifier {
    store: SharedStore,
    mailer: Arc<dyn Mailer>,
    clock: SharedClock,
    window: NotificationWindow,
    timezone: Tz,
    gate: Mutex<()>,
}

impl StockNotifier {
    pub fn new(
        store: SharedStore,
        mailer: Arc<dyn Mailer>,
        clock: SharedClock,
        window: NotificationWindow,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            window,
            timezone,
            gate: Mutex::new(()),
        }
    }

    #[instrument(skip(self), fields(items_count = tracing::field::Empty), err)]
    pub async fn check_and_notify(&self) -> ServiceResult<CheckResult> {
        let _guard = self.gate.lock().await;

        let items = self.store.items_needing_attention().await?;
        tracing::Span::current().record("items_count", items.len());
        if items.is_empty() {
            info!("all stock levels normal");
            return Ok(CheckResult::new(0, CheckOutcome::NothingToReport));
        }

        let now = self.clock.now();
        let last_sent = self.store.latest_notification_at().await?;
        if !self.window.allows(last_sent, now) {
            info!(
                items_count = items.len(),
                reopens_at = ?self.window.reopens_at(last_sent, now),
                "alert already sent recently, skipping"
            );
            return Ok(CheckResult::new(items.len(), CheckOutcome::Suppressed));
        }

        let local_now = now.with_timezone(&self.timezone).fixed_offset();
        let email = StockReport::new(&items, local_now).compose()?;
        self.mailer.send(&email).await?;

        if let Err(e) = self
            .store
            .append_notification(NewNotificationRecord::new(now, &items))
            .await
        {
            error!(error = %e, "alert sent but could not be logged");
            return Err(e.into());
        }

        info!(items_count = items.len(), subject = %email.subject, "stock alert sent");
        Ok(CheckResult::new(items.len(), CheckOutcome::Sent))
    }

    /// Sent alerts, newest first.
    pub async fn history(&self) -> ServiceResult<Vec<NotificationRecord>> {
        Ok(self.store.list_notifications().await?)
    }
}
