//! Append-only audit log

use meterops_common::db::AuditLogEntry;
use meterops_common::time::{self, from_millis};
use meterops_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Append an entry using the server clock
///
/// Takes a connection so callers can include it in their transaction.
pub async fn append(
    conn: &mut SqliteConnection,
    action: &str,
    user_id: &str,
    description: &str,
) -> Result<AuditLogEntry> {
    let entry = AuditLogEntry {
        id: Uuid::new_v4().to_string(),
        action: action.to_string(),
        user_id: user_id.to_string(),
        description: description.to_string(),
        timestamp: time::now(),
    };

    sqlx::query(
        "INSERT INTO audit_logs (id, action, user_id, description, timestamp) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.action)
    .bind(&entry.user_id)
    .bind(&entry.description)
    .bind(entry.timestamp.timestamp_millis())
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Most recent entries first
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<AuditLogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, action, user_id, description, timestamp
        FROM audit_logs
        ORDER BY timestamp DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<AuditLogEntry> {
            Ok(AuditLogEntry {
                id: row.try_get("id")?,
                action: row.try_get("action")?,
                user_id: row.try_get("user_id")?,
                description: row.try_get("description")?,
                timestamp: from_millis(row.try_get("timestamp")?),
            })
        })
        .collect()
}
