//! HTTP API handlers for meterops-api

pub mod analytics;
pub mod auth;
pub mod error;
pub mod exceptions;
pub mod health;
pub mod readings;

pub use analytics::get_analytics;
pub use auth::auth_middleware;
pub use error::ApiError;
pub use exceptions::list_exceptions;
pub use health::health_routes;
pub use readings::{list_readings, sync_readings, update_reading_status};
