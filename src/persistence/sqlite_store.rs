//! SQLite implementation of the event and report stores

use super::{EventStore, PersistenceError, ReportStore};
use crate::models::{Event, EventType, Report};
use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed storage for events and reports.
///
/// One handle implements both store traits, so the same database file
/// holds the event log and the derived report table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and initialize the schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Helper to parse a stored RFC 3339 timestamp
    fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, PersistenceError> {
        DateTime::parse_from_rfc3339(raw)
            .map_err(|_| PersistenceError::InvalidData(format!("Invalid timestamp: {}", raw)))
    }

    /// Helper to parse a stored event-type name
    fn parse_event_type(raw: &str) -> Result<EventType, PersistenceError> {
        raw.parse().map_err(PersistenceError::InvalidData)
    }

    fn collect_events(
        rows: Vec<(String, String, i64, String, String, String, String)>,
    ) -> Result<Vec<Event>, PersistenceError> {
        let mut events = Vec::with_capacity(rows.len());
        for (source_ip, event_type, status_code, user_agent, url, date_time, log_line) in rows {
            events.push(Event {
                source_ip,
                event_type: Self::parse_event_type(&event_type)?,
                status_code: status_code as u16,
                user_agent,
                url,
                timestamp: Self::parse_timestamp(&date_time)?,
                raw_line: log_line,
            });
        }
        Ok(events)
    }

    fn collect_reports(
        rows: Vec<(String, String, i64, i64, i64, i64, i64, i64, i64, String)>,
    ) -> Result<Vec<Report>, PersistenceError> {
        let mut reports = Vec::with_capacity(rows.len());
        for (
            source_ip,
            latest,
            total_count,
            post_login_count,
            get_login_count,
            get_4xx_count,
            post_4xx_count,
            post_count,
            get_count,
            comment,
        ) in rows
        {
            reports.push(Report {
                source_ip,
                latest: Self::parse_timestamp(&latest)?,
                total_count,
                post_login_count,
                get_login_count,
                get_4xx_count,
                post_4xx_count,
                post_count,
                get_count,
                comment,
            });
        }
        Ok(reports)
    }
}

const EVENT_COLUMNS: &str =
    "source_ip, event_type, status_code, user_agent, url, date_time, log_line";

const REPORT_COLUMNS: &str = "source_ip, latest, total_count, post_login_count, get_login_count, \
     get_4xx_count, post_4xx_count, post_count, get_count, comment";

impl EventStore for SqliteStore {
    fn insert_many(&self, events: &[Event]) -> Result<(), PersistenceError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO events ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
                EVENT_COLUMNS
            ))?;
            for event in events {
                stmt.execute(params![
                    event.source_ip,
                    event.event_type.as_str(),
                    event.status_code as i64,
                    event.user_agent,
                    event.url,
                    event.timestamp.to_rfc3339(),
                    event.raw_line,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<Event>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM events ORDER BY id",
            EVENT_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Self::collect_events(rows)
    }

    fn query_by_type(&self, event_type: EventType) -> Result<Vec<Event>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM events WHERE event_type = ? ORDER BY id",
            EVENT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![event_type.as_str()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Self::collect_events(rows)
    }

    fn delete_one(&self, event: &Event) -> Result<bool, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        // Match on identity fields and remove at most one row, so duplicate
        // log lines are deleted one at a time.
        let affected = conn.execute(
            "DELETE FROM events WHERE id IN (
                 SELECT id FROM events
                 WHERE source_ip = ? AND event_type = ? AND log_line = ?
                 LIMIT 1
             )",
            params![event.source_ip, event.event_type.as_str(), event.raw_line],
        )?;
        Ok(affected > 0)
    }

    fn count_where(
        &self,
        event_type: EventType,
        source_ip: &str,
    ) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE event_type = ? AND source_ip = ?",
            params![event_type.as_str(), source_ip],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl ReportStore for SqliteStore {
    fn query_all(&self) -> Result<Vec<Report>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reports ORDER BY source_ip",
            REPORT_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Self::collect_reports(rows)
    }

    fn query_by_ip(&self, source_ip: &str) -> Result<Option<Report>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reports WHERE source_ip = ?",
            REPORT_COLUMNS
        ))?;

        let result = stmt.query_row(params![source_ip], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        });

        match result {
            Ok(row) => Ok(Self::collect_reports(vec![row])?.pop()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn query_with_comment(&self) -> Result<Vec<Report>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reports WHERE comment != '' ORDER BY source_ip",
            REPORT_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Self::collect_reports(rows)
    }

    fn insert_many(&self, reports: &[Report]) -> Result<(), PersistenceError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO reports ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                REPORT_COLUMNS
            ))?;
            for report in reports {
                stmt.execute(params![
                    report.source_ip,
                    report.latest.to_rfc3339(),
                    report.total_count,
                    report.post_login_count,
                    report.get_login_count,
                    report.get_4xx_count,
                    report.post_4xx_count,
                    report.post_count,
                    report.get_count,
                    report.comment,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn drop_and_recreate(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE IF EXISTS reports;")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn delete_one(&self, report: &Report) -> Result<bool, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "DELETE FROM reports WHERE source_ip = ?",
            params![report.source_ip],
        )?;
        Ok(affected > 0)
    }
}
