//! System exceptions surfaced to supervisors

use meterops_common::db::ExceptionRecord;
use meterops_common::time::{self, from_millis};
use meterops_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Number of exceptions returned by the dashboard listing
pub const RECENT_LIMIT: i64 = 50;

/// Most recent exceptions first
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<ExceptionRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT exception_id, context, error_code, message, reading_id, created_at, resolved
        FROM exceptions
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ExceptionRecord> {
            Ok(ExceptionRecord {
                exception_id: row.try_get("exception_id")?,
                context: row.try_get("context")?,
                error_code: row.try_get("error_code")?,
                message: row.try_get("message")?,
                reading_id: row.try_get("reading_id")?,
                created_at: from_millis(row.try_get("created_at")?),
                resolved: row.try_get("resolved")?,
            })
        })
        .collect()
}

/// Record a new unresolved exception
pub async fn record(
    pool: &SqlitePool,
    context: &str,
    error_code: &str,
    message: &str,
    reading_id: Option<&str>,
) -> Result<ExceptionRecord> {
    let exception = ExceptionRecord {
        exception_id: Uuid::new_v4().to_string(),
        context: context.to_string(),
        error_code: error_code.to_string(),
        message: message.to_string(),
        reading_id: reading_id.map(str::to_string),
        created_at: time::now(),
        resolved: false,
    };

    sqlx::query(
        r#"
        INSERT INTO exceptions (exception_id, context, error_code, message, reading_id, created_at, resolved)
        VALUES (?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&exception.exception_id)
    .bind(&exception.context)
    .bind(&exception.error_code)
    .bind(&exception.message)
    .bind(&exception.reading_id)
    .bind(exception.created_at.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(exception)
}
