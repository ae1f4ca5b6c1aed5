//! Job table operations: idempotent enqueue, claim, and retry bookkeeping.
//!
//! Retry budget: 4 attempts total with exponential backoff starting at 5
//! seconds (5s, 10s, 20s between attempts). A job only reaches terminal
//! `failed` once the budget is exhausted.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::QueueError;
use crate::db::DatabaseError;

/// Attempts per job: the initial try plus three retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Backoff before the first retry; doubles per subsequent retry.
pub const INITIAL_BACKOFF_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(DatabaseError::InvalidEnum {
                field: "JobStatus".into(),
                value: s.into(),
            }),
        }
    }
}

/// A claimed generation job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub job_key: String,
    pub care_plan_id: i64,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDisposition {
    /// Requeued with backoff; will run again at the contained time.
    Retried { run_at: DateTime<Utc> },
    /// Attempt budget exhausted; terminally failed.
    Failed,
}

/// Enqueue a generation job. Idempotent on `job_key`: returns true when a
/// new job row was created, false when the key already existed.
pub fn enqueue(
    conn: &Connection,
    job_key: &str,
    care_plan_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, QueueError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO jobs (job_key, care_plan_id, status, max_attempts, run_at)
         VALUES (?1, ?2, 'queued', ?3, ?4)",
        params![job_key, care_plan_id, DEFAULT_MAX_ATTEMPTS, now],
    )?;
    Ok(inserted > 0)
}

/// Claim the oldest due queued job, flipping it to `running` and charging
/// one attempt. Returns `None` when nothing is due.
pub fn claim_next(conn: &Connection, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
    let tx = conn.unchecked_transaction()?;

    let row = tx
        .query_row(
            "SELECT id, job_key, care_plan_id, attempts, max_attempts, run_at, last_error
             FROM jobs
             WHERE status = 'queued' AND run_at <= ?1
             ORDER BY run_at ASC, id ASC
             LIMIT 1",
            params![now],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, DateTime<Utc>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((id, job_key, care_plan_id, attempts, max_attempts, run_at, last_error)) = row else {
        return Ok(None);
    };

    tx.execute(
        "UPDATE jobs
         SET status = 'running', attempts = attempts + 1,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?1",
        params![id],
    )?;
    tx.commit()?;

    Ok(Some(Job {
        id,
        job_key,
        care_plan_id,
        status: JobStatus::Running,
        attempts: attempts + 1,
        max_attempts,
        run_at,
        last_error,
    }))
}

/// Mark a job completed.
pub fn complete(conn: &Connection, job_id: i64) -> Result<(), QueueError> {
    conn.execute(
        "UPDATE jobs
         SET status = 'completed', last_error = NULL,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?1",
        params![job_id],
    )?;
    Ok(())
}

/// Backoff delay before retry number `attempt` (1-based attempt that just
/// failed): 5s after the first attempt, doubling per attempt.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    Duration::seconds(INITIAL_BACKOFF_SECS << exponent)
}

/// After a failed attempt: requeue with backoff, or terminally fail when the
/// attempt budget is exhausted.
pub fn retry_or_fail(
    conn: &Connection,
    job: &Job,
    error: &str,
    now: DateTime<Utc>,
) -> Result<JobDisposition, QueueError> {
    if job.attempts >= job.max_attempts {
        conn.execute(
            "UPDATE jobs
             SET status = 'failed', last_error = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
             WHERE id = ?2",
            params![error, job.id],
        )?;
        return Ok(JobDisposition::Failed);
    }

    let run_at = now + backoff_delay(job.attempts);
    conn.execute(
        "UPDATE jobs
         SET status = 'queued', last_error = ?1, run_at = ?2,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?3",
        params![error, run_at, job.id],
    )?;
    Ok(JobDisposition::Retried { run_at })
}
