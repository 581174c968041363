//! Errors shared by the MeterOps crates
//!
//! The API crate maps these onto HTTP statuses: `NotFound` to 404,
//! `InvalidInput` to 400, everything else to 500.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite failure, including a rolled back sync or status transaction
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database folder failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable config file or an unusable setting (short signing secret,
    /// zero body limit)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No reading with the requested id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad query value, such as a `since` that is not RFC 3339 or an
    /// unknown status
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data that no longer parses
    #[error("Internal error: {0}")]
    Internal(String),
}
