//! Field extractors for combined/common access-log lines.
//!
//! Every extractor takes one raw line and returns a best-effort value with
//! an explicit "not found" sentinel. Extraction never fails: log files are
//! untrusted input and a malformed line must not abort a batch.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;

use crate::models::{Event, EventType};

/// Path substring identifying login-page traffic.
pub const LOGIN_PAGE: &str = "wp-login.php";

/// Sentinel for lines without a recognizable HTTP method.
pub const NO_METHOD_FOUND: &str = "NO METHOD FOUND";
/// Sentinel for lines without a recognizable URL.
pub const NO_URL_FOUND: &str = "NO URL FOUND";
/// Sentinel for lines without a user-agent field.
pub const NO_USER_AGENT: &str = "NO USER AGENT";
/// Sentinel status code for lines without one.
pub const STATUS_NOT_FOUND: u16 = 999;

/// Bracketed-timestamp format, e.g. `01/Oct/2019:07:26:54 +0300`.
const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

fn source_ip_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Dots intentionally unescaped: any single separator is accepted. The
    // anchor still rejects addresses that only appear later in the line.
    RE.get_or_init(|| Regex::new(r"^\d+.\d+.\d+.\d+").unwrap())
}

fn method_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]+").unwrap())
}

fn status_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" \d{3} ").unwrap())
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" (/\S+)").unwrap())
}

/// Leading dotted-quad client address, or an empty string.
pub fn extract_source_ip(line: &str) -> String {
    source_ip_pattern()
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// HTTP method from the quoted request segment.
pub fn extract_method(line: &str) -> String {
    line.split('"')
        .nth(1)
        .and_then(|segment| method_pattern().find(segment))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| NO_METHOD_FOUND.to_string())
}

/// Three-digit status code from the segment after the request, or 999.
pub fn extract_status_code(line: &str) -> u16 {
    line.split('"')
        .nth(2)
        .and_then(|segment| status_code_pattern().find(segment))
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(STATUS_NOT_FOUND)
}

/// Request path from the quoted request segment.
pub fn extract_url(line: &str) -> String {
    line.split('"')
        .nth(1)
        .and_then(|segment| url_pattern().captures(segment))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| NO_URL_FOUND.to_string())
}

/// Sixth quote-delimited segment, verbatim.
pub fn extract_user_agent(line: &str) -> String {
    line.split('"')
        .nth(5)
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| NO_USER_AGENT.to_string())
}

/// Bracketed timestamp, falling back to the current wall-clock time when
/// the line has none or it does not parse.
pub fn extract_timestamp(line: &str) -> DateTime<FixedOffset> {
    let bracketed = line.split('[').nth(1).and_then(|s| s.split(']').next());
    match bracketed {
        Some(raw) => DateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap_or_else(|e| {
            log::debug!("failed to parse timestamp '{}': {}", raw, e);
            Utc::now().fixed_offset()
        }),
        None => Utc::now().fixed_offset(),
    }
}

/// True iff the extracted URL contains the login-page path.
pub fn is_login_page(line: &str) -> bool {
    extract_url(line).contains(LOGIN_PAGE)
}

/// True iff the extracted method is exactly `GET`.
pub fn is_get(line: &str) -> bool {
    extract_method(line) == "GET"
}

/// True iff the extracted method is exactly `POST`.
pub fn is_post(line: &str) -> bool {
    extract_method(line) == "POST"
}

/// All fields extracted from one line in a single pass.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub source_ip: String,
    pub method: String,
    pub status_code: u16,
    pub user_agent: String,
    pub url: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl ParsedLine {
    pub fn parse(line: &str) -> Self {
        ParsedLine {
            source_ip: extract_source_ip(line),
            method: extract_method(line),
            status_code: extract_status_code(line),
            user_agent: extract_user_agent(line),
            url: extract_url(line),
            timestamp: extract_timestamp(line),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    pub fn is_login_page(&self) -> bool {
        self.url.contains(LOGIN_PAGE)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Build the event record for a resolved category.
    pub fn into_event(self, event_type: EventType, line: &str) -> Event {
        Event {
            source_ip: self.source_ip,
            event_type,
            status_code: self.status_code,
            user_agent: self.user_agent,
            url: self.url,
            timestamp: self.timestamp,
            raw_line: line.to_string(),
        }
    }
}
