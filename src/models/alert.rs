use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Alert raised when a report crosses an abuse threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseAlert {
    pub severity: u8,
    pub rule_name: String,
    pub source_ip: String,
    pub observed_count: i64,
    pub threshold: i64,
    /// Timestamp of the most recent event from the offending IP.
    pub latest: DateTime<FixedOffset>,
    pub description: String,
}

impl AbuseAlert {
    /// Severity in 7..=10, scaled by how far the count overshoots the
    /// threshold.
    pub fn severity_for(observed: i64, threshold: i64) -> u8 {
        let ratio = observed as f64 / threshold.max(1) as f64;
        if ratio > 5.0 {
            10
        } else if ratio > 3.0 {
            9
        } else if ratio > 2.0 {
            8
        } else {
            7
        }
    }
}
