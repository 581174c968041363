//! Database access layer for meterops-api
//!
//! Thin repositories over the tables created by `meterops_common::db`.

pub mod audit_log;
pub mod exceptions;
pub mod readings;
pub mod training_pool;

pub use readings::{NewReading, SyncOutcome};
