use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Event categories, in classification priority order.
///
/// The classifier evaluates these top to bottom and assigns the first
/// matching category, so a POST to the login page is always `PostLogin`
/// even when `Post4xx` or `Post` would also hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "post_login")]
    PostLogin,
    #[serde(rename = "get_login")]
    GetLogin,
    #[serde(rename = "get_4xx")]
    Get4xx,
    #[serde(rename = "post_4xx")]
    Post4xx,
    #[serde(rename = "post")]
    Post,
    #[serde(rename = "get")]
    Get,
}

impl EventType {
    /// All categories in priority order.
    pub const ALL: [EventType; 6] = [
        EventType::PostLogin,
        EventType::GetLogin,
        EventType::Get4xx,
        EventType::Post4xx,
        EventType::Post,
        EventType::Get,
    ];

    /// Fixed string table used wherever an event type is persisted or
    /// compared. The database column and the serde representation both
    /// go through these exact strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PostLogin => "post_login",
            EventType::GetLogin => "get_login",
            EventType::Get4xx => "get_4xx",
            EventType::Post4xx => "post_4xx",
            EventType::Post => "post",
            EventType::Get => "get",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post_login" => Ok(EventType::PostLogin),
            "get_login" => Ok(EventType::GetLogin),
            "get_4xx" => Ok(EventType::Get4xx),
            "post_4xx" => Ok(EventType::Post4xx),
            "post" => Ok(EventType::Post),
            "get" => Ok(EventType::Get),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// One classified occurrence extracted from a single access-log line.
///
/// An `Event` always carries a resolved category; lines the classifier
/// cannot place in any category never become events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Client address parsed from the start of the line, empty if absent.
    pub source_ip: String,
    pub event_type: EventType,
    /// HTTP status code, 999 when none was found.
    pub status_code: u16,
    pub user_agent: String,
    pub url: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Original line text, retained for audit.
    pub raw_line: String,
}
