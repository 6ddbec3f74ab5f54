//! Product lifecycle domain module.
//!
//! A physical batch is received, then either installed or declared
//! defective. Both outcomes are terminal. The batch is a single record whose
//! status moves forward in place; the rules for each move live here, the
//! transactional execution lives in the infrastructure layer.

pub mod item;
pub mod photos;

pub use item::{
    Installation, Intake, LifecycleDetails, LifecycleFields, LifecycleItem, LifecycleStatus,
    NewLifecycleItem, Transition,
};
pub use photos::PhotoSet;
