//! Background jobs.
//!
//! - [`DailyStockCheck`]: runs the low-stock check once a day at a fixed
//!   local time, until told to shut down.

mod daily;

pub use daily::{DailyStockCheck, next_run_after};
