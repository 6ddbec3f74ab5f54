//! `stockflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the shared error model, strongly-typed record identifiers and the clock
//! abstraction every time-dependent rule is written against.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{InventoryItemId, LifecycleItemId, NotificationId, OrderId, ToolId};
