pub mod alert;
pub mod event;
pub mod report;

pub use alert::AbuseAlert;
pub use event::{Event, EventType};
pub use report::Report;
