//! Per-IP report aggregation.
//!
//! Reports are recomputed from scratch on every run: the event collection
//! is the source of truth and the report table is a materialized view of
//! it. The only state that survives regeneration is the operator comment,
//! which is read back out before the table is discarded.

use std::collections::{BTreeMap, HashMap};

use crate::config::AlertThresholds;
use crate::models::{AbuseAlert, Event, EventType, Report};
use crate::persistence::{EventStore, PersistenceError, ReportStore};

/// Roll an event set up into one report per source IP.
///
/// Pass one groups events by IP and fills in the latest timestamp and the
/// total count; pass two counts each category separately, so a counter is
/// an exact count of the (IP, category) pair at the moment of the call.
/// Every IP with at least one event appears in the output exactly once.
pub fn aggregate(events: &[Event]) -> BTreeMap<String, Report> {
    let mut reports: BTreeMap<String, Report> = BTreeMap::new();

    for event in events {
        let report = reports
            .entry(event.source_ip.clone())
            .or_insert_with(|| Report::new(event.source_ip.clone(), event.timestamp));
        report.total_count += 1;
        if event.timestamp > report.latest {
            report.latest = event.timestamp;
        }
    }

    for event_type in EventType::ALL {
        for event in events.iter().filter(|e| e.event_type == event_type) {
            if let Some(report) = reports.get_mut(&event.source_ip) {
                *report.count_mut(event_type) += 1;
            }
        }
    }

    reports
}

/// Regenerates the stored report set from the stored event set.
///
/// Store handles are injected by the caller; the generator owns no
/// connection state of its own.
pub struct ReportGenerator<'a> {
    events: &'a dyn EventStore,
    reports: &'a dyn ReportStore,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(events: &'a dyn EventStore, reports: &'a dyn ReportStore) -> Self {
        ReportGenerator { events, reports }
    }

    /// Replace the stored report set with a fresh aggregation.
    ///
    /// Comments are collected before anything is deleted: regeneration is
    /// not crash-atomic, and everything except the comments can be
    /// recomputed from events if it is interrupted.
    pub fn regenerate(&self) -> Result<Vec<Report>, PersistenceError> {
        let comments: HashMap<String, String> = self
            .reports
            .query_with_comment()?
            .into_iter()
            .map(|report| (report.source_ip, report.comment))
            .collect();

        let events = self.events.query_all()?;
        let mut rollups = aggregate(&events);

        for (source_ip, comment) in comments {
            if let Some(report) = rollups.get_mut(&source_ip) {
                report.comment = comment;
            }
        }

        let fresh: Vec<Report> = rollups.into_values().collect();

        self.reports.drop_and_recreate()?;
        self.reports.insert_many(&fresh)?;

        log::info!("Regenerated {} report(s)", fresh.len());
        Ok(fresh)
    }
}

/// Screen reports against abuse thresholds, producing alerts for the ones
/// that cross them.
pub fn screen_reports(reports: &[Report], thresholds: &AlertThresholds) -> Vec<AbuseAlert> {
    let mut alerts = Vec::new();

    for report in reports {
        let login_attempts = report.post_login_count;
        if login_attempts > thresholds.max_login_attempts {
            alerts.push(AbuseAlert {
                severity: AbuseAlert::severity_for(login_attempts, thresholds.max_login_attempts),
                rule_name: "Login Attempt Threshold Exceeded".to_string(),
                source_ip: report.source_ip.clone(),
                observed_count: login_attempts,
                threshold: thresholds.max_login_attempts,
                latest: report.latest,
                description: format!(
                    "IP {} has {} login POSTs on record (threshold: {}). \
                     Possible brute force or credential stuffing.",
                    report.source_ip, login_attempts, thresholds.max_login_attempts
                ),
            });
        }

        let client_errors = report.get_4xx_count + report.post_4xx_count;
        if client_errors > thresholds.max_client_errors {
            alerts.push(AbuseAlert {
                severity: AbuseAlert::severity_for(client_errors, thresholds.max_client_errors),
                rule_name: "Client Error Threshold Exceeded".to_string(),
                source_ip: report.source_ip.clone(),
                observed_count: client_errors,
                threshold: thresholds.max_client_errors,
                latest: report.latest,
                description: format!(
                    "IP {} has {} 4xx responses on record (threshold: {}). \
                     Possible scanner probing for weak endpoints.",
                    report.source_ip, client_errors, thresholds.max_client_errors
                ),
            });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteStore;
    use chrono::{DateTime, FixedOffset};

    fn timestamp(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn event(source_ip: &str, event_type: EventType, ts: &str) -> Event {
        Event {
            source_ip: source_ip.to_string(),
            event_type,
            status_code: 200,
            user_agent: "Mozilla/5.0".to_string(),
            url: "/".to_string(),
            timestamp: timestamp(ts),
            raw_line: format!("{} {} {}", source_ip, event_type, ts),
        }
    }

    #[test]
    fn test_aggregate_groups_by_ip() {
        let events = vec![
            event("1.1.1.1", EventType::Get, "2019-10-01T07:00:00+03:00"),
            event("1.1.1.1", EventType::PostLogin, "2019-10-01T08:00:00+03:00"),
            event("2.2.2.2", EventType::Get4xx, "2019-10-01T09:00:00+03:00"),
        ];

        let reports = aggregate(&events);
        assert_eq!(reports.len(), 2);

        let first = &reports["1.1.1.1"];
        assert_eq!(first.total_count, 2);
        assert_eq!(first.get_count, 1);
        assert_eq!(first.post_login_count, 1);
        assert_eq!(first.get_4xx_count, 0);
        assert_eq!(first.latest, timestamp("2019-10-01T08:00:00+03:00"));

        let second = &reports["2.2.2.2"];
        assert_eq!(second.total_count, 1);
        assert_eq!(second.get_4xx_count, 1);
    }

    #[test]
    fn test_aggregate_latest_is_max_not_last() {
        // Newest event first: latest must still be the maximum.
        let events = vec![
            event("1.1.1.1", EventType::Get, "2019-10-02T00:00:00+03:00"),
            event("1.1.1.1", EventType::Get, "2019-10-01T00:00:00+03:00"),
        ];
        let reports = aggregate(&events);
        assert_eq!(
            reports["1.1.1.1"].latest,
            timestamp("2019-10-02T00:00:00+03:00")
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let events = vec![
            event("1.1.1.1", EventType::PostLogin, "2019-10-01T07:00:00+03:00"),
            event("1.1.1.1", EventType::Post4xx, "2019-10-01T07:01:00+03:00"),
            event("2.2.2.2", EventType::GetLogin, "2019-10-01T07:02:00+03:00"),
        ];
        assert_eq!(aggregate(&events), aggregate(&events));
    }

    #[test]
    fn test_aggregate_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_regenerate_counters_match_count_where() {
        let store = SqliteStore::in_memory().unwrap();
        let events: &dyn EventStore = &store;
        let reports: &dyn ReportStore = &store;

        events
            .insert_many(&[
                event("1.1.1.1", EventType::PostLogin, "2019-10-01T07:00:00+03:00"),
                event("1.1.1.1", EventType::PostLogin, "2019-10-01T07:01:00+03:00"),
                event("1.1.1.1", EventType::Get, "2019-10-01T07:02:00+03:00"),
                event("2.2.2.2", EventType::Get4xx, "2019-10-01T07:03:00+03:00"),
            ])
            .unwrap();

        ReportGenerator::new(events, reports).regenerate().unwrap();

        // Reload and compare every counter against an independent count.
        for report in reports.query_all().unwrap() {
            for event_type in EventType::ALL {
                assert_eq!(
                    report.count(event_type),
                    events.count_where(event_type, &report.source_ip).unwrap(),
                    "counter mismatch for {} / {}",
                    report.source_ip,
                    event_type
                );
            }
        }
    }

    #[test]
    fn test_regenerate_preserves_comments() {
        let store = SqliteStore::in_memory().unwrap();
        let events: &dyn EventStore = &store;
        let reports: &dyn ReportStore = &store;

        events
            .insert_many(&[
                event("1.1.1.1", EventType::PostLogin, "2019-10-01T07:00:00+03:00"),
                event("2.2.2.2", EventType::Get, "2019-10-01T07:01:00+03:00"),
            ])
            .unwrap();

        let generator = ReportGenerator::new(events, reports);
        generator.regenerate().unwrap();

        // Operator annotates one report: delete it and re-insert with the
        // comment, which is all the store contract offers.
        let mut annotated = reports.query_by_ip("1.1.1.1").unwrap().unwrap();
        reports.delete_one(&annotated).unwrap();
        annotated.comment = "known botnet member".to_string();
        reports.insert_many(std::slice::from_ref(&annotated)).unwrap();

        // New events arrive, reports regenerate: the comment must survive.
        events
            .insert_many(&[event(
                "1.1.1.1",
                EventType::PostLogin,
                "2019-10-01T08:00:00+03:00",
            )])
            .unwrap();
        generator.regenerate().unwrap();

        let report = reports.query_by_ip("1.1.1.1").unwrap().unwrap();
        assert_eq!(report.comment, "known botnet member");
        assert_eq!(report.post_login_count, 2);

        let other = reports.query_by_ip("2.2.2.2").unwrap().unwrap();
        assert_eq!(other.comment, "");
    }

    #[test]
    fn test_regenerate_drops_stale_reports() {
        let store = SqliteStore::in_memory().unwrap();
        let events: &dyn EventStore = &store;
        let reports: &dyn ReportStore = &store;

        let stale = event("9.9.9.9", EventType::Get, "2019-10-01T07:00:00+03:00");
        events.insert_many(std::slice::from_ref(&stale)).unwrap();

        let generator = ReportGenerator::new(events, reports);
        generator.regenerate().unwrap();
        assert!(reports.query_by_ip("9.9.9.9").unwrap().is_some());

        // Once the IP's events are gone, regeneration drops its report.
        events.delete_one(&stale).unwrap();
        generator.regenerate().unwrap();
        assert!(reports.query_by_ip("9.9.9.9").unwrap().is_none());
    }

    #[test]
    fn test_regenerate_twice_without_writes_is_stable() {
        let store = SqliteStore::in_memory().unwrap();
        let events: &dyn EventStore = &store;
        let reports: &dyn ReportStore = &store;

        events
            .insert_many(&[
                event("1.1.1.1", EventType::Get, "2019-10-01T07:00:00+03:00"),
                event("1.1.1.1", EventType::Post, "2019-10-01T07:05:00+03:00"),
            ])
            .unwrap();

        let generator = ReportGenerator::new(events, reports);
        let first = generator.regenerate().unwrap();
        let second = generator.regenerate().unwrap();
        assert_eq!(first, second);
        assert_eq!(reports.query_all().unwrap(), second);
    }

    #[test]
    fn test_screen_reports_thresholds() {
        let thresholds = AlertThresholds {
            max_login_attempts: 5,
            max_client_errors: 10,
        };

        let mut quiet = Report::new(
            "1.1.1.1".to_string(),
            timestamp("2019-10-01T07:00:00+03:00"),
        );
        quiet.post_login_count = 5; // at, not over

        let mut noisy = Report::new(
            "2.2.2.2".to_string(),
            timestamp("2019-10-01T07:00:00+03:00"),
        );
        noisy.post_login_count = 30;
        noisy.get_4xx_count = 8;
        noisy.post_4xx_count = 7;

        let alerts = screen_reports(&[quiet, noisy], &thresholds);
        assert_eq!(alerts.len(), 2);

        assert_eq!(alerts[0].rule_name, "Login Attempt Threshold Exceeded");
        assert_eq!(alerts[0].source_ip, "2.2.2.2");
        assert_eq!(alerts[0].observed_count, 30);
        assert_eq!(alerts[0].severity, 10);

        assert_eq!(alerts[1].rule_name, "Client Error Threshold Exceeded");
        assert_eq!(alerts[1].observed_count, 15);
        assert_eq!(alerts[1].severity, 7);
    }
}
