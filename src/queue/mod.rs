//! Asynchronous care plan generation: a SQLite-backed job queue and the
//! background worker that drains it. Enqueue is synchronous and
//! fire-and-forget with respect to the HTTP caller; processing happens out
//! of band and writes terminal status back to the care plan record.

pub mod jobs;
pub mod worker;

pub use jobs::{enqueue, Job, JobStatus};
pub use worker::{start_worker, WorkerHandle};

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
