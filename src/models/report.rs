use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::event::EventType;

/// Per-source-IP rollup of classified events.
///
/// Reports are a materialized view over the event collection: every field
/// except `comment` is recomputed from scratch on each aggregation run.
/// `comment` is operator-authored and survives regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub source_ip: String,
    /// Timestamp of the most recent event for this IP.
    pub latest: DateTime<FixedOffset>,
    /// Count of all events for this IP, which may exceed the sum of the
    /// per-category counters.
    pub total_count: i64,
    pub post_login_count: i64,
    pub get_login_count: i64,
    pub get_4xx_count: i64,
    pub post_4xx_count: i64,
    pub post_count: i64,
    pub get_count: i64,
    /// Operator annotation, empty by default.
    pub comment: String,
}

impl Report {
    /// Base report with all category counters at zero.
    pub fn new(source_ip: String, latest: DateTime<FixedOffset>) -> Self {
        Report {
            source_ip,
            latest,
            total_count: 0,
            post_login_count: 0,
            get_login_count: 0,
            get_4xx_count: 0,
            post_4xx_count: 0,
            post_count: 0,
            get_count: 0,
            comment: String::new(),
        }
    }

    /// Counter for the given category.
    pub fn count(&self, event_type: EventType) -> i64 {
        match event_type {
            EventType::PostLogin => self.post_login_count,
            EventType::GetLogin => self.get_login_count,
            EventType::Get4xx => self.get_4xx_count,
            EventType::Post4xx => self.post_4xx_count,
            EventType::Post => self.post_count,
            EventType::Get => self.get_count,
        }
    }

    /// Mutable counter for the given category.
    pub fn count_mut(&mut self, event_type: EventType) -> &mut i64 {
        match event_type {
            EventType::PostLogin => &mut self.post_login_count,
            EventType::GetLogin => &mut self.get_login_count,
            EventType::Get4xx => &mut self.get_4xx_count,
            EventType::Post4xx => &mut self.post_4xx_count,
            EventType::Post => &mut self.post_count,
            EventType::Get => &mut self.get_count,
        }
    }
}
