//! Readings repository
//!
//! Sync and status updates each run in a single transaction together with
//! their side writes (training pool rows, audit log entries), so either all
//! of it lands or none of it does.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use meterops_common::db::{
    CaptureMethod, GpsPoint, Reading, ReadingStatus, ReviewDecision, TrainingCandidate,
};
use meterops_common::time::{self, from_millis};
use meterops_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{audit_log, training_pool};

/// Audit action recorded for supervisor status changes
pub const UPDATE_STATUS_ACTION: &str = "UPDATE_STATUS";

/// Validated reading ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub reading_id: String,
    pub account_number: String,
    pub reading_value: f64,
    pub confidence: f64,
    pub method: CaptureMethod,
    pub status: ReadingStatus,
    pub flagged_for_ml: bool,
    pub image_url: String,
    pub gps: Option<GpsPoint>,
    pub device_id: String,
    pub captured_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a sync batch changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Readings inserted or replaced
    pub written: usize,
    /// Readings left untouched because they were already `synced`
    pub skipped: usize,
    /// Training pool rows written
    pub training_candidates: usize,
}

/// Upsert a batch of readings for owner `uid`
///
/// Keyed by reading id, so replaying a batch is harmless. When the batch
/// repeats an id only its last copy is written. A reading stored as
/// `synced` before this call is not overwritten.
pub async fn save_batch(pool: &SqlitePool, uid: &str, readings: &[NewReading]) -> Result<SyncOutcome> {
    let mut tx = pool.begin().await?;
    let mut outcome = SyncOutcome::default();
    let created_at = time::now();

    for reading in last_copy_per_id(readings) {
        let result = sqlx::query(
            r#"
            INSERT INTO readings (
                reading_id, uid, account_number, reading_value, confidence, method,
                status, flagged_for_ml, image_url, gps_lat, gps_lng, device_id,
                captured_at, updated_at, supervisor_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            ON CONFLICT(reading_id) DO UPDATE SET
                uid = excluded.uid,
                account_number = excluded.account_number,
                reading_value = excluded.reading_value,
                confidence = excluded.confidence,
                method = excluded.method,
                status = excluded.status,
                flagged_for_ml = excluded.flagged_for_ml,
                image_url = excluded.image_url,
                gps_lat = excluded.gps_lat,
                gps_lng = excluded.gps_lng,
                device_id = excluded.device_id,
                captured_at = excluded.captured_at,
                updated_at = excluded.updated_at,
                supervisor_id = NULL
            WHERE readings.status != 'synced'
            "#,
        )
        .bind(&reading.reading_id)
        .bind(uid)
        .bind(&reading.account_number)
        .bind(reading.reading_value)
        .bind(reading.confidence)
        .bind(reading.method.as_str())
        .bind(reading.status.as_str())
        .bind(reading.flagged_for_ml)
        .bind(&reading.image_url)
        .bind(reading.gps.map(|g| g.lat))
        .bind(reading.gps.map(|g| g.lng))
        .bind(&reading.device_id)
        .bind(reading.captured_at.timestamp_millis())
        .bind(reading.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            outcome.skipped += 1;
            continue;
        }
        outcome.written += 1;

        if reading.flagged_for_ml {
            let candidate = TrainingCandidate {
                reading_id: reading.reading_id.clone(),
                account_number: reading.account_number.clone(),
                image_url: reading.image_url.clone(),
                captured_at: reading.captured_at,
                created_at,
            };
            training_pool::upsert(&mut tx, &candidate).await?;
            outcome.training_candidates += 1;
        }
    }

    tx.commit().await?;

    Ok(outcome)
}

/// Last copy of each reading id, in batch order
fn last_copy_per_id(readings: &[NewReading]) -> Vec<&NewReading> {
    let last_index: HashMap<&str, usize> = readings
        .iter()
        .enumerate()
        .map(|(index, reading)| (reading.reading_id.as_str(), index))
        .collect();

    readings
        .iter()
        .enumerate()
        .filter(|(index, reading)| last_index.get(reading.reading_id.as_str()) == Some(index))
        .map(|(_, reading)| reading)
        .collect()
}

/// Record a supervisor decision and its audit entry
///
/// Returns `Error::NotFound` when no reading has `reading_id`; nothing is
/// written in that case.
pub async fn update_status(
    pool: &SqlitePool,
    reading_id: &str,
    decision: ReviewDecision,
    supervisor_id: &str,
) -> Result<()> {
    let status = ReadingStatus::from(decision);
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE readings SET status = ?, supervisor_id = ?, updated_at = ? WHERE reading_id = ?",
    )
    .bind(status.as_str())
    .bind(supervisor_id)
    .bind(time::now_millis())
    .bind(reading_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Reading {}", reading_id)));
    }

    audit_log::append(
        &mut tx,
        UPDATE_STATUS_ACTION,
        supervisor_id,
        &format!("Reading {} marked as {}", reading_id, status),
    )
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Readings owned by `uid`, oldest update first
///
/// `since` keeps readings updated at or after that instant; `status`
/// restricts to one lifecycle state.
pub async fn fetch_for_owner(
    pool: &SqlitePool,
    uid: &str,
    since: Option<DateTime<Utc>>,
    status: Option<ReadingStatus>,
) -> Result<Vec<Reading>> {
    let rows = sqlx::query(
        r#"
        SELECT reading_id, uid, account_number, reading_value, confidence, method, status,
               flagged_for_ml, image_url, gps_lat, gps_lng, device_id, captured_at,
               updated_at, supervisor_id
        FROM readings
        WHERE uid = ?1
          AND (?2 IS NULL OR updated_at >= ?2)
          AND (?3 IS NULL OR status = ?3)
        ORDER BY updated_at ASC, reading_id ASC
        "#,
    )
    .bind(uid)
    .bind(since.map(|ts| ts.timestamp_millis()))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    rows.iter().map(reading_from_row).collect()
}

/// Single reading by id
pub async fn fetch_one(pool: &SqlitePool, reading_id: &str) -> Result<Option<Reading>> {
    let row = sqlx::query(
        r#"
        SELECT reading_id, uid, account_number, reading_value, confidence, method, status,
               flagged_for_ml, image_url, gps_lat, gps_lng, device_id, captured_at,
               updated_at, supervisor_id
        FROM readings
        WHERE reading_id = ?
        "#,
    )
    .bind(reading_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(reading_from_row).transpose()
}

fn reading_from_row(row: &SqliteRow) -> Result<Reading> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;
    let gps_lat: Option<f64> = row.try_get("gps_lat")?;
    let gps_lng: Option<f64> = row.try_get("gps_lng")?;

    let gps = match (gps_lat, gps_lng) {
        (Some(lat), Some(lng)) => Some(GpsPoint { lat, lng }),
        _ => None,
    };

    Ok(Reading {
        id: row.try_get("reading_id")?,
        uid: row.try_get("uid")?,
        account_number: row.try_get("account_number")?,
        reading_value: row.try_get("reading_value")?,
        confidence: row.try_get("confidence")?,
        method: method
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt readings row: {}", e)))?,
        status: status
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt readings row: {}", e)))?,
        flagged_for_ml: row.try_get("flagged_for_ml")?,
        image_url: row.try_get("image_url")?,
        gps,
        device_id: row.try_get("device_id")?,
        captured_at: from_millis(row.try_get("captured_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
        supervisor_id: row.try_get("supervisor_id")?,
    })
}
