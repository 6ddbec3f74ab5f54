use chrono::{DateTime, Duration, Utc};

/// Global cooldown between two low-stock alerts.
///
/// An alert is suppressed while the latest one was sent strictly less than
/// `period` ago. The window is fed from the persisted log, so it survives
/// restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationWindow {
    period: Duration,
}

impl Default for NotificationWindow {
    fn default() -> Self {
        Self::hours(72)
    }
}

impl NotificationWindow {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// A period reaching past the representable range never elapses.
    pub fn allows(&self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_sent {
            None => true,
            Some(last) => now
                .checked_sub_signed(self.period)
                .is_some_and(|open_from| last <= open_from),
        }
    }

    /// Earliest instant a new alert may go out, if one is currently blocked.
    pub fn reopens_at(
        &self,
        last_sent: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        last_sent
            .filter(|_| !self.allows(last_sent, now))
            .and_then(|last| last.checked_add_signed(self.period))
    }
}
