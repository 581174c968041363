//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Settings-table access for the signing secret (via sqlx)
//! - Shared types
//!
//! The service wraps these with Axum middleware and error responses.

pub mod auth;
pub mod types;

pub use auth::{
    issue_token, load_signing_secret, parse_bearer, ApiAuthError, AuthenticatedUser,
    HmacTokenVerifier, TokenClaims, TokenVerifier,
};
pub use types::ErrorResponse;
