//! Call log repository. One row per call, rewritten on each state change.

use chrono::{DateTime, Utc};
use tether_common::error::TetherError;
use tether_common::models::{CallKind, CallLog, CallStatus};
use uuid::Uuid;

/// Raw `call_logs` row.
#[derive(Debug, sqlx::FromRow)]
pub struct CallLogRow {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub call_type: String,
    pub status: String,
    pub channel_id: String,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: i64,
}

impl TryFrom<CallLogRow> for CallLog {
    type Error = TetherError;

    fn try_from(row: CallLogRow) -> Result<Self, Self::Error> {
        let kind = row.call_type.parse::<CallKind>().map_err(|_| {
            TetherError::Internal(anyhow::anyhow!(
                "call {} has unknown call_type '{}'",
                row.id,
                row.call_type
            ))
        })?;
        Ok(CallLog {
            id: row.id,
            caller_id: row.caller_id,
            callee_id: row.callee_id,
            kind,
            status: row.status.parse::<CallStatus>()?,
            channel_name: row.channel_id,
            started_at: row.started_at,
            answered_at: row.answered_at,
            ended_at: row.ended_at,
            duration_secs: row.duration,
        })
    }
}

/// Insert a new call log.
pub async fn insert(pool: &sqlx::PgPool, call: &CallLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO call_logs
            (id, caller_id, callee_id, call_type, status, channel_id,
             started_at, answered_at, ended_at, duration)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(call.id)
    .bind(call.caller_id)
    .bind(call.callee_id)
    .bind(call.kind.as_str())
    .bind(call.status.as_str())
    .bind(&call.channel_name)
    .bind(call.started_at)
    .bind(call.answered_at)
    .bind(call.ended_at)
    .bind(call.duration_secs)
    .execute(pool)
    .await?;
    Ok(())
}

/// Find a call log by ID.
pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<CallLogRow>, sqlx::Error> {
    sqlx::query_as::<_, CallLogRow>("SELECT * FROM call_logs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Persist a transition, but only if the row is still in `expected` status.
///
/// Returns `false` when another request moved the call first.
pub async fn update_if_status(
    pool: &sqlx::PgPool,
    call: &CallLog,
    expected: CallStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE call_logs
        SET status = $1, answered_at = $2, ended_at = $3, duration = $4
        WHERE id = $5 AND status = $6
        "#,
    )
    .bind(call.status.as_str())
    .bind(call.answered_at)
    .bind(call.ended_at)
    .bind(call.duration_secs)
    .bind(call.id)
    .bind(expected.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
