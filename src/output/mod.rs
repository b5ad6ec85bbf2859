use crate::models::{AbuseAlert, Report};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Output handler for reports and abuse alerts
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Jsonl, // Default
        }
    }
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new(
        format: OutputFormat,
        file_path: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let writer: Option<Box<dyn Write + Send>> = match (&format, file_path) {
            (OutputFormat::Console, _) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Write a per-IP report
    pub fn write_report(&mut self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        match &self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(report)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let json = serde_json::to_string(report)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Console => {
                let output = format!(
                    "{} total: {}, login POST/GET: {}/{}, 4xx GET/POST: {}/{}, \
                     plain GET/POST: {}/{}, latest: {}{}\n",
                    report.source_ip,
                    report.total_count,
                    report.post_login_count,
                    report.get_login_count,
                    report.get_4xx_count,
                    report.post_4xx_count,
                    report.get_count,
                    report.post_count,
                    report.latest.to_rfc3339(),
                    if report.comment.is_empty() {
                        String::new()
                    } else {
                        format!(" # {}", report.comment)
                    }
                );
                self.write_output(&output)?;
            }
        }
        Ok(())
    }

    /// Write an abuse alert
    pub fn write_alert(&mut self, alert: &AbuseAlert) -> Result<(), Box<dyn std::error::Error>> {
        match &self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(alert)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let json = serde_json::to_string(alert)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Console => {
                let output = format!(
                    "[{}] {} - IP: {}, count: {} (threshold: {}), Severity: {}\n",
                    alert.rule_name,
                    alert.description,
                    alert.source_ip,
                    alert.observed_count,
                    alert.threshold,
                    alert.severity
                );
                self.write_output(&output)?;
            }
        }
        Ok(())
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                use std::io::{self, Write};
                io::stdout().flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::DateTime;
    use std::io::Read;

    fn sample_report() -> Report {
        let mut report = Report::new(
            "150.95.105.63".to_string(),
            DateTime::parse_from_rfc3339("2019-10-01T07:26:54+03:00").unwrap(),
        );
        report.total_count = 4;
        *report.count_mut(EventType::PostLogin) = 3;
        *report.count_mut(EventType::Get) = 1;
        report
    }

    #[test]
    fn test_jsonl_output_is_one_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");

        let mut handler =
            OutputHandler::new(OutputFormat::Jsonl, Some(path.clone())).unwrap();
        handler.write_report(&sample_report()).unwrap();
        handler.write_report(&sample_report()).unwrap();
        handler.flush().unwrap();
        drop(handler);

        let mut contents = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Report = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.source_ip, "150.95.105.63");
        assert_eq!(parsed.post_login_count, 3);
    }

    #[test]
    fn test_unknown_format_defaults_to_jsonl() {
        assert!(matches!(OutputFormat::from_str("csv"), OutputFormat::Jsonl));
        assert!(matches!(OutputFormat::from_str("JSON"), OutputFormat::Json));
        assert!(matches!(
            OutputFormat::from_str("console"),
            OutputFormat::Console
        ));
    }
}
