//! Persistence contracts for events and reports.
//!
//! The classifier and aggregator never touch a database directly; they are
//! handed store handles implementing these traits, so backends can be
//! swapped and tests can run against an in-memory database.

pub mod sqlite_store;

pub use sqlite_store::SqliteStore;

use crate::models::{Event, EventType, Report};
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),
}

/// Storage contract for classified events.
///
/// Batch inserts are all-or-nothing: a failure mid-batch propagates, since
/// a partially persisted batch is not a supported state. Single-row
/// deletes report success as `Ok(true)`/`Ok(false)` and surface backend
/// failures as `Err` for the caller to handle locally.
pub trait EventStore: Send + Sync {
    /// Persist a batch of events.
    fn insert_many(&self, events: &[Event]) -> Result<(), PersistenceError>;

    /// All stored events, in insertion order.
    fn query_all(&self) -> Result<Vec<Event>, PersistenceError>;

    /// All stored events of one category.
    fn query_by_type(&self, event_type: EventType) -> Result<Vec<Event>, PersistenceError>;

    /// Delete a single stored event. Returns whether a row was removed.
    fn delete_one(&self, event: &Event) -> Result<bool, PersistenceError>;

    /// Number of stored events for an (event type, source IP) pair.
    fn count_where(&self, event_type: EventType, source_ip: &str)
        -> Result<i64, PersistenceError>;
}

/// Storage contract for per-IP reports.
pub trait ReportStore: Send + Sync {
    /// All stored reports, ordered by source IP.
    fn query_all(&self) -> Result<Vec<Report>, PersistenceError>;

    /// The report for one source IP, if present.
    fn query_by_ip(&self, source_ip: &str) -> Result<Option<Report>, PersistenceError>;

    /// Reports carrying a non-empty operator comment.
    fn query_with_comment(&self) -> Result<Vec<Report>, PersistenceError>;

    /// Persist a batch of reports.
    fn insert_many(&self, reports: &[Report]) -> Result<(), PersistenceError>;

    /// Discard the whole report table and recreate it empty. Events are
    /// untouched.
    fn drop_and_recreate(&self) -> Result<(), PersistenceError>;

    /// Delete a single report. Returns whether a row was removed.
    fn delete_one(&self, report: &Report) -> Result<bool, PersistenceError>;
}
