//! Distributor date alerting
//!
//! Compares the latest distributor date against yesterday on a fixed cadence
//! and publishes the result as a 0/1 gauge.

pub mod checker;
pub mod config;
pub mod guard;

pub use checker::{CheckOutcome, DateChecker};
pub use config::{AlertPolicy, AlertState, Decision, HoldReason};
pub use guard::{DateGuard, GuardError};
