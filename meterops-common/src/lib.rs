//! # MeterOps Common Library
//!
//! Shared code for the MeterOps services including:
//! - Database schema initialization and models
//! - Bearer token verification
//! - Shared API response types
//! - Configuration loading
//! - Timestamp utilities

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
