//! Shared state handed to every handler.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::events::OrderEvents;

/// Cloneable handler state: the shared database connection and the
/// order-update broadcast channel.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Arc<Mutex<Connection>>,
    pub events: OrderEvents,
}

impl ApiContext {
    pub fn new(conn: Connection, events: OrderEvents) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            events,
        }
    }

    /// Lock the database connection for one handler operation.
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }
}
