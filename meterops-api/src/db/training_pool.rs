//! ML training pool: flagged readings mirrored for OCR model training

use meterops_common::db::TrainingCandidate;
use meterops_common::time::from_millis;
use meterops_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Insert or refresh the pool row for a reading
pub async fn upsert(conn: &mut SqliteConnection, candidate: &TrainingCandidate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ml_training_pool (reading_id, account_number, image_url, captured_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(reading_id) DO UPDATE SET
            account_number = excluded.account_number,
            image_url = excluded.image_url,
            captured_at = excluded.captured_at,
            created_at = excluded.created_at
        "#,
    )
    .bind(&candidate.reading_id)
    .bind(&candidate.account_number)
    .bind(&candidate.image_url)
    .bind(candidate.captured_at.timestamp_millis())
    .bind(candidate.created_at.timestamp_millis())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// All pool rows, newest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<TrainingCandidate>> {
    let rows = sqlx::query(
        r#"
        SELECT reading_id, account_number, image_url, captured_at, created_at
        FROM ml_training_pool
        ORDER BY created_at DESC, reading_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<TrainingCandidate> {
            Ok(TrainingCandidate {
                reading_id: row.try_get("reading_id")?,
                account_number: row.try_get("account_number")?,
                image_url: row.try_get("image_url")?,
                captured_at: from_millis(row.try_get("captured_at")?),
                created_at: from_millis(row.try_get("created_at")?),
            })
        })
        .collect()
}
