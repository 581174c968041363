//! Exceptions listing

use axum::{extract::State, Json};
use meterops_common::db::ExceptionRecord;
use serde::Serialize;

use crate::api::ApiError;
use crate::db::exceptions::{self, RECENT_LIMIT};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ExceptionsResponse {
    pub exceptions: Vec<ExceptionRecord>,
}

/// GET /exceptions
///
/// The 50 most recent exceptions, newest first. Not scoped to the caller.
pub async fn list_exceptions(
    State(state): State<AppState>,
) -> Result<Json<ExceptionsResponse>, ApiError> {
    let exceptions = exceptions::list_recent(&state.db, RECENT_LIMIT).await?;
    Ok(Json(ExceptionsResponse { exceptions }))
}
