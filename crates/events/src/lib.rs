//! Domain events and the handlers that react to them.
//!
//! Events here are raised *inside* a unit of work: a handler turns an event
//! into effects, and the store that raised the event applies those effects
//! before it commits. Nothing is published asynchronously.

pub mod event;
pub mod handler;

pub use event::Event;
pub use handler::{EventHandler, collect_effects};
