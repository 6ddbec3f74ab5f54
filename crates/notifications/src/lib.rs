//! Low-stock alerting rules.
//!
//! - [`window`]: the global cooldown between two alerts
//! - [`report`]: selection, ordering and composition of the alert email
//! - [`record`]: the append-only log of sent alerts
//! - [`outcome`]: what a check did, as reported to callers

pub mod outcome;
pub mod record;
pub mod report;
pub mod window;

pub use outcome::{CheckOutcome, CheckResult};
pub use record::{ItemSnapshot, NewNotificationRecord, NotificationRecord};
pub use report::{AlertEmail, RenderError, StockReport, attention_order};
pub use window::NotificationWindow;
