//! Authentication middleware for meterops-api
//!
//! Protected routes require `Authorization: Bearer <token>`. The verified
//! identity is stored in request extensions as `AuthenticatedUser`.
//!
//! **Note:** This is applied to protected routes only.
//! Health endpoint (/health) does NOT use this middleware.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, Method},
    middleware::Next,
    response::Response,
};
use meterops_common::api::{parse_bearer, ApiAuthError, AuthenticatedUser};
use tracing::debug;

use crate::api::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Only headers are inspected; a rejected request's body is never read.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // CORS preflight carries no credentials
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let user = authenticate(&state, &request).map_err(|e| {
        debug!(
            "Rejected {} {}: {}",
            request.method(),
            request.uri().path(),
            e
        );
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, request: &Request) -> Result<AuthenticatedUser, ApiAuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(ApiAuthError::MissingHeader)?;
    let value = header.to_str().map_err(|_| ApiAuthError::InvalidHeader)?;
    let token = parse_bearer(value)?;

    state.verifier.verify(token)
}
