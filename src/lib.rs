pub mod alerting;
pub mod classifier;
pub mod config;
pub mod input;
pub mod models;
pub mod output;
pub mod parser;
pub mod persistence;
pub mod report;

// Re-export commonly used types
pub use classifier::{classify, classify_lines};
pub use models::{AbuseAlert, Event, EventType, Report};
pub use persistence::{EventStore, ReportStore, SqliteStore};
pub use report::{aggregate, ReportGenerator};
pub use alerting::{AlertDispatcher, AlertQueue};
