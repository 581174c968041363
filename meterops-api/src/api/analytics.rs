//! Analytics overview counters

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Local, Utc};
use meterops_common::api::AuthenticatedUser;
use meterops_common::db::{Reading, ReadingStatus};
use meterops_common::time::start_of_day;
use serde::Serialize;

use crate::api::ApiError;
use crate::db::readings;
use crate::AppState;

/// Counters shown on the supervisor dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsOverview {
    /// Readings awaiting review
    pub pending: usize,
    /// Readings flagged for the training pool
    pub flagged: usize,
    /// Readings captured since local midnight
    pub today: usize,
}

/// Count readings against a start-of-day cutoff
pub fn summarize(readings: &[Reading], day_start: DateTime<Utc>) -> AnalyticsOverview {
    readings
        .iter()
        .fold(AnalyticsOverview::default(), |mut overview, reading| {
            if reading.status == ReadingStatus::Pending {
                overview.pending += 1;
            }
            if reading.flagged_for_ml {
                overview.flagged += 1;
            }
            if reading.captured_at >= day_start {
                overview.today += 1;
            }
            overview
        })
}

/// GET /analytics
///
/// Recomputed from the caller's readings on every request.
pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<AnalyticsOverview>, ApiError> {
    let owned = readings::fetch_for_owner(&state.db, &user.uid, None, None).await?;
    let day_start = start_of_day(&Local::now());

    Ok(Json(summarize(&owned, day_start)))
}
