//! Audit Task Repository (outbox table)
//!
//! Audit events persist here as outbox rows. The outbox worker claims
//! pending rows with `FOR UPDATE SKIP LOCKED` inside a short transaction
//! whose commit releases the row locks; the claimed set is then processed
//! in memory, so horizontally scaled workers never contend on the same rows.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{RepoError, RepoResult};
use crate::domain::{AuditTask, Event, TaskStatus};

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    audit_log: Vec<u8>,
    status: String,
    attempt_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    next_retry_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for AuditTask {
    type Error = RepoError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::parse(&row.status)
            .ok_or_else(|| RepoError::Database(format!("unknown task status {}", row.status)))?;
        Ok(AuditTask {
            id: row.id,
            payload: row.audit_log,
            status,
            attempt_count: row.attempt_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            finished_at: row.finished_at,
            next_retry_at: row.next_retry_at,
        })
    }
}

#[derive(Clone)]
pub struct AuditTaskRepository {
    pool: PgPool,
}

impl AuditTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Persist an audit event as a Created outbox row
    pub async fn save_log(&self, event: &Event) -> RepoResult<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| RepoError::Database(format!("event encode: {e}")))?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO audit_tasks (audit_log, status, attempt_count, created_at, updated_at)
             VALUES ($1, $2, 0, $3, $3)",
        )
        .bind(payload)
        .bind(TaskStatus::Created.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Claim up to `limit` pending rows, oldest first, skipping rows locked
    /// by concurrent workers. Must run inside `tx`; committing the
    /// transaction releases the locks while the caller keeps the task set.
    pub async fn fetch_pending_tasks(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> RepoResult<Vec<AuditTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, audit_log, status, attempt_count,
                    created_at, updated_at, finished_at, next_retry_at
             FROM audit_tasks
             WHERE status IN ($1, $2)
               AND (next_retry_at IS NULL OR next_retry_at < NOW())
               AND attempt_count < $3
             ORDER BY created_at
             LIMIT $4
             FOR UPDATE SKIP LOCKED",
        )
        .bind(TaskStatus::Created.as_str())
        .bind(TaskStatus::Failed.as_str())
        .bind(AuditTask::MAX_ATTEMPTS)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(AuditTask::try_from).collect()
    }

    /// Persist a status transition
    pub async fn update_task(&self, task: &AuditTask) -> RepoResult<()> {
        sqlx::query(
            "UPDATE audit_tasks
             SET status = $1, attempt_count = $2, updated_at = $3,
                 finished_at = $4, next_retry_at = $5
             WHERE id = $6",
        )
        .bind(task.status.as_str())
        .bind(task.attempt_count)
        .bind(task.updated_at)
        .bind(task.finished_at)
        .bind(task.next_retry_at)
        .bind(task.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Keyset-paginated audit event listing, newest first
    pub async fn get_logs(
        &self,
        limit: i64,
        cursor: Option<i64>,
    ) -> RepoResult<(Vec<Event>, Option<i64>)> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, audit_log, status, attempt_count,
                    created_at, updated_at, finished_at, next_retry_at
             FROM audit_tasks
             WHERE ($1::BIGINT IS NULL OR id < $1)
             ORDER BY id DESC
             LIMIT $2",
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        let mut next_cursor = None;
        for row in rows {
            next_cursor = Some(row.id);
            match serde_json::from_slice::<Event>(&row.audit_log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(task_id = row.id, error = %e, "Skipping undecodable audit payload")
                }
            }
        }
        Ok((events, next_cursor))
    }
}
