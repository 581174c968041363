//! Readings API: device sync, supervisor review, listing

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use meterops_common::api::AuthenticatedUser;
use meterops_common::db::{Reading, ReadingStatus};
use meterops_common::time::parse_rfc3339;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::ApiError;
use crate::db::{exceptions, readings};
use crate::payload::{parse_status_update, parse_sync_request};
use crate::AppState;

/// Exception context for failed sync batches
pub const SYNC_EXCEPTION_CONTEXT: &str = "readings_sync";
/// Exception code for failed sync batches
pub const SYNC_WRITE_FAILED: &str = "SYNC_WRITE_FAILED";

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    /// RFC 3339 lower bound on `updatedAt`
    pub since: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub readings: Vec<Reading>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub status: String,
}

/// GET /readings?since=&status=
///
/// Readings owned by the caller.
pub async fn list_readings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<ReadingsResponse>, ApiError> {
    let since = query
        .since
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_rfc3339)
        .transpose()?;

    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ReadingStatus>)
        .transpose()?;

    let readings = readings::fetch_for_owner(&state.db, &user.uid, since, status).await?;

    Ok(Json(ReadingsResponse { readings }))
}

/// POST /readings/sync
///
/// Validates the whole batch, then writes it in one transaction.
pub async fn sync_readings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<(StatusCode, Json<SyncResponse>), ApiError> {
    let batch = parse_sync_request(&body).map_err(|issues| {
        warn!(uid = %user.uid, ?issues, "Invalid payload");
        ApiError::BadRequest("Invalid payload".to_string())
    })?;

    match readings::save_batch(&state.db, &user.uid, &batch.readings).await {
        Ok(outcome) => {
            info!(
                uid = %user.uid,
                written = outcome.written,
                skipped = outcome.skipped,
                training_candidates = outcome.training_candidates,
                last_sync_at = %batch.last_sync_at,
                "Readings synced"
            );
            Ok((
                StatusCode::CREATED,
                Json(SyncResponse {
                    status: "synced".to_string(),
                }),
            ))
        }
        Err(e) => {
            error!(uid = %user.uid, "Sync batch failed: {}", e);
            let message = format!(
                "Sync of {} readings from {} failed: {}",
                batch.readings.len(),
                user.uid,
                e
            );
            if let Err(record_err) = exceptions::record(
                &state.db,
                SYNC_EXCEPTION_CONTEXT,
                SYNC_WRITE_FAILED,
                &message,
                None,
            )
            .await
            {
                error!("Failed to record sync exception: {}", record_err);
            }
            Err(e.into())
        }
    }
}

/// POST /readings/:reading_id/status
///
/// Body `{status: "verified" | "rejected"}`. Returns 204.
pub async fn update_reading_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(reading_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let decision = parse_status_update(&body).map_err(|e| {
        warn!(reading_id = %reading_id, "Invalid status update: {}", e);
        ApiError::BadRequest("Invalid status".to_string())
    })?;

    readings::update_status(&state.db, &reading_id, decision, &user.uid).await?;

    info!(
        reading_id = %reading_id,
        supervisor = %user.uid,
        status = ?decision,
        "Reading status updated"
    );

    Ok(StatusCode::NO_CONTENT)
}
