//! Background generation worker — drains the job queue on its own thread.
//!
//! Claims due jobs, loads the order input, calls the LLM, and writes the
//! terminal care plan status back. Failed attempts are requeued with
//! backoff until the attempt budget runs out. Publishes an order update
//! whenever a care plan reaches `completed` or `failed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;

use super::jobs::{self, Job, JobDisposition};
use super::QueueError;
use crate::config::Config;
use crate::db::repository;
use crate::db::sqlite::open_database;
use crate::events::OrderEvents;
use crate::llm::{HttpLlmClient, LlmClient};

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY_MS: u64 = 250;

/// Handle for the background worker thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on
/// `Drop`. The job currently being processed (if any) completes first.
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown. No new jobs will be claimed.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the generation worker on a separate thread. The worker opens its
/// own database connection and LLM client from the given config.
pub fn start_worker(config: Config, events: OrderEvents) -> WorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::spawn(move || {
        let conn = match open_database(&config.database_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "Worker cannot open database, exiting");
                return;
            }
        };
        let llm = match HttpLlmClient::new(
            &config.llm_base_url,
            &config.llm_model,
            config.llm_timeout_secs,
        ) {
            Ok(llm) => llm,
            Err(e) => {
                tracing::error!(error = %e, "Worker cannot build LLM client, exiting");
                return;
            }
        };

        tracing::info!(
            poll_secs = config.worker_poll_secs,
            max_attempts = jobs::DEFAULT_MAX_ATTEMPTS,
            "Generation worker started"
        );
        worker_loop(&conn, &llm, &events, &flag, config.worker_poll_secs);
        tracing::info!("Generation worker shutting down");
    });

    WorkerHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn worker_loop(
    conn: &Connection,
    llm: &dyn LlmClient,
    events: &OrderEvents,
    shutdown: &AtomicBool,
    poll_secs: u64,
) {
    let poll_ms = poll_secs.max(1) * 1000;

    while !shutdown.load(Ordering::Relaxed) {
        match process_due_jobs(conn, llm, events) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(processed = n, "Worker drained due jobs"),
            Err(e) => tracing::error!(error = %e, "Worker pass failed"),
        }

        // Sleep in small increments for responsive shutdown
        let mut slept = 0;
        while slept < poll_ms && !shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(SLEEP_GRANULARITY_MS));
            slept += SLEEP_GRANULARITY_MS;
        }
    }
}

/// Claim and process every currently-due job. Returns how many were
/// processed this pass.
pub fn process_due_jobs(
    conn: &Connection,
    llm: &dyn LlmClient,
    events: &OrderEvents,
) -> Result<u32, QueueError> {
    let mut processed = 0;
    while let Some(job) = jobs::claim_next(conn, Utc::now())? {
        process_job(conn, &job, llm, events)?;
        processed += 1;
    }
    Ok(processed)
}

fn process_job(
    conn: &Connection,
    job: &Job,
    llm: &dyn LlmClient,
    events: &OrderEvents,
) -> Result<(), QueueError> {
    tracing::info!(
        job_key = %job.job_key,
        attempt = job.attempts,
        max = job.max_attempts,
        "Processing care plan job"
    );

    let Some(input) = repository::fetch_care_plan_input(conn, job.care_plan_id)? else {
        // The care plan is gone (e.g. its order was deleted); retrying
        // cannot succeed, fail the job immediately.
        tracing::warn!(job_key = %job.job_key, "Care plan missing, failing job");
        conn.execute(
            "UPDATE jobs SET status = 'failed', last_error = 'care plan not found',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
             WHERE id = ?1",
            rusqlite::params![job.id],
        )?;
        return Ok(());
    };

    if job.attempts == 1 {
        repository::mark_care_plan_processing(conn, input.care_plan_id)?;
    }

    let records = input.patient_records.as_deref().unwrap_or("");
    match llm.generate(records, &input.medication_name) {
        Ok(content) => {
            repository::complete_care_plan(conn, input.care_plan_id, &content)?;
            jobs::complete(conn, job.id)?;
            events.publish(input.order_id);
            tracing::info!(
                care_plan_id = input.care_plan_id,
                order_id = input.order_id,
                "Care plan completed"
            );
        }
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(
                care_plan_id = input.care_plan_id,
                attempt = job.attempts,
                error = %message,
                "Care plan generation failed"
            );
            match jobs::retry_or_fail(conn, job, &message, Utc::now())? {
                JobDisposition::Retried { run_at } => {
                    tracing::info!(job_key = %job.job_key, %run_at, "Job requeued with backoff");
                }
                JobDisposition::Failed => {
                    repository::fail_care_plan(conn, input.care_plan_id, &message)?;
                    events.publish(input.order_id);
                    tracing::error!(
                        care_plan_id = input.care_plan_id,
                        attempts = job.attempts,
                        "Care plan failed after final attempt"
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::db::repository::{get_care_plan, insert_care_plan};
    use crate::db::sqlite::open_memory_database;
    use crate::llm::{LlmClient, LlmError};
    use crate::models::CarePlanStatus;

    struct StubLlm {
        response: Result<String, ()>,
    }

    impl LlmClient for StubLlm {
        fn generate(&self, _records: &str, _medication: &str) -> Result<String, LlmError> {
            self.response
                .clone()
                .map_err(|_| LlmError::Connection("http://localhost:11434".into()))
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn seed(conn: &Connection) -> i64 {
        conn.execute_batch(
            "INSERT INTO providers (name, npi) VALUES ('Dr. Alice', '123');
             INSERT INTO patients (first_name, last_name, mrn, date_of_birth)
                 VALUES ('Jane', 'Doe', 'MRN-1', '1980-05-01');
             INSERT INTO orders (patient_id, provider_id, medication_name, patient_records, created_at)
                 VALUES (1, 1, 'Lisinopril', 'BP 150/95', '2024-01-03T09:00:00Z');",
        )
        .unwrap();
        insert_care_plan(conn, 1).unwrap()
    }

    #[test]
    fn successful_generation_completes_plan_and_job() {
        let conn = open_memory_database().unwrap();
        let plan_id = seed(&conn);
        jobs::enqueue(&conn, "careplan-1", plan_id, ts("2024-01-01T00:00:00Z")).unwrap();

        let events = OrderEvents::new();
        let mut rx = events.subscribe();
        let llm = StubLlm {
            response: Ok("1. Problem list ...".into()),
        };

        let processed = process_due_jobs(&conn, &llm, &events).unwrap();
        assert_eq!(processed, 1);

        let plan = get_care_plan(&conn, plan_id).unwrap().unwrap();
        assert_eq!(plan.status, CarePlanStatus::Completed);
        assert_eq!(plan.content.as_deref(), Some("1. Problem list ..."));

        let status: String = conn
            .query_row("SELECT status FROM jobs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "completed");

        // Update published for the order
        assert_eq!(rx.try_recv().unwrap().order_id, 1);
    }

    #[test]
    fn failed_generation_retries_then_fails_terminally() {
        let conn = open_memory_database().unwrap();
        let plan_id = seed(&conn);
        jobs::enqueue(&conn, "careplan-1", plan_id, ts("2024-01-01T00:00:00Z")).unwrap();

        let events = OrderEvents::new();
        let llm = StubLlm { response: Err(()) };

        // First attempt: requeued with backoff, plan stays processing
        assert_eq!(process_due_jobs(&conn, &llm, &events).unwrap(), 1);
        let plan = get_care_plan(&conn, plan_id).unwrap().unwrap();
        assert_eq!(plan.status, CarePlanStatus::Processing);

        // Exhaust the budget by making the backoff due immediately
        for _ in 1..jobs::DEFAULT_MAX_ATTEMPTS {
            conn.execute("UPDATE jobs SET run_at = '2024-01-01T00:00:00Z'", [])
                .unwrap();
            process_due_jobs(&conn, &llm, &events).unwrap();
        }

        let plan = get_care_plan(&conn, plan_id).unwrap().unwrap();
        assert_eq!(plan.status, CarePlanStatus::Failed);
        assert!(plan.error_message.unwrap().contains("Cannot connect"));

        let (status, attempts): (String, u32) = conn
            .query_row("SELECT status, attempts FROM jobs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(status, "failed");
        assert_eq!(attempts, jobs::DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn missing_care_plan_fails_the_job_without_retry() {
        let conn = open_memory_database().unwrap();
        let plan_id = seed(&conn);
        jobs::enqueue(&conn, "careplan-1", plan_id, ts("2024-01-01T00:00:00Z")).unwrap();
        // The schema's FK would block removing a plan a job still references;
        // disable enforcement just for this setup delete to stage the
        // missing-plan scenario.
        conn.pragma_update(None, "foreign_keys", "OFF").unwrap();
        conn.execute("DELETE FROM care_plans WHERE id = ?1", rusqlite::params![plan_id])
            .unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();

        let events = OrderEvents::new();
        let llm = StubLlm {
            response: Ok("unused".into()),
        };
        process_due_jobs(&conn, &llm, &events).unwrap();

        let (status, error): (String, String) = conn
            .query_row("SELECT status, last_error FROM jobs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(status, "failed");
        assert_eq!(error, "care plan not found");
    }

    #[test]
    fn worker_handle_shutdown_flag() {
        let handle = WorkerHandle {
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        assert!(!handle.shutdown.load(Ordering::Relaxed));
        handle.shutdown();
        assert!(handle.shutdown.load(Ordering::Relaxed));
    }
}
