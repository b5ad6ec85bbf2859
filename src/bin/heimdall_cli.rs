use std::path::PathBuf;
use structopt::StructOpt;

use heimdall::classifier;
use heimdall::config::Config;
use heimdall::input;
use heimdall::models::EventType;
use heimdall::output::{OutputFormat, OutputHandler};
use heimdall::persistence::{EventStore, ReportStore, SqliteStore};
use heimdall::report::ReportGenerator;

/// Heimdall access-log analyzer command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "heimdall", about = "Access-log abuse analyzer CLI")]
pub enum Cli {
    /// Classify a log file and optionally persist the events
    Parse {
        /// Path to log file
        #[structopt(short, long)]
        file: PathBuf,
        /// Only look for this event type (post_login is the only
        /// filter currently honored)
        #[structopt(short, long)]
        event: Option<EventType>,
        /// Save classified events to the database
        #[structopt(short, long)]
        persist: bool,
        /// Path to the SQLite database
        #[structopt(long, default_value = "heimdall.db")]
        db: PathBuf,
        /// Number of events to display
        #[structopt(short, long, default_value = "10")]
        lines: usize,
    },
    /// Regenerate and display the per-IP reports
    Report {
        /// Path to the SQLite database
        #[structopt(long, default_value = "heimdall.db")]
        db: PathBuf,
        /// Output format: "json", "jsonl", or "console"
        #[structopt(long, default_value = "console")]
        format: String,
    },
    /// Attach an operator comment to one IP's report
    Comment {
        /// Path to the SQLite database
        #[structopt(long, default_value = "heimdall.db")]
        db: PathBuf,
        /// Source IP of the report to annotate
        #[structopt(short, long)]
        ip: String,
        /// Comment text
        comment: String,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Parse {
            file,
            event,
            persist,
            db,
            lines,
        } => {
            let raw_lines = input::read_lines(&file)?;
            let events = classifier::classify_lines(&raw_lines, event);

            let display_count = std::cmp::min(lines, events.len());
            println!(
                "Classified {} event(s) from {} line(s) (showing {}):\n",
                events.len(),
                raw_lines.len(),
                display_count
            );
            for event in events.iter().take(display_count) {
                println!(
                    "  IP: {}, Type: {}, Status: {}, URL: {}, Timestamp: {}",
                    event.source_ip,
                    event.event_type,
                    event.status_code,
                    event.url,
                    event.timestamp.to_rfc3339()
                );
            }

            if persist {
                let store = SqliteStore::new(&db)?;
                let event_store: &dyn EventStore = &store;
                event_store.insert_many(&events)?;
                println!("\nSaved {} event(s) to {:?}", events.len(), db);
            }
        }
        Cli::Report { db, format } => {
            let store = SqliteStore::new(&db)?;
            let event_store: &dyn EventStore = &store;
            let report_store: &dyn ReportStore = &store;

            let reports = ReportGenerator::new(event_store, report_store).regenerate()?;

            let mut handler = OutputHandler::new(OutputFormat::from_str(&format), None)?;
            for report in &reports {
                handler.write_report(report)?;
            }
            println!("\n{} report(s) generated", reports.len());
        }
        Cli::Comment { db, ip, comment } => {
            let store = SqliteStore::new(&db)?;
            let report_store: &dyn ReportStore = &store;

            match report_store.query_by_ip(&ip)? {
                Some(mut report) => {
                    // The store contract has no update: replace the row.
                    if let Err(e) = report_store.delete_one(&report) {
                        eprintln!("Failed to replace report for {}: {}", ip, e);
                        std::process::exit(1);
                    }
                    report.comment = comment;
                    report_store.insert_many(std::slice::from_ref(&report))?;
                    println!("Comment set on report for {}", ip);
                }
                None => {
                    eprintln!("No report found for IP {}", ip);
                    eprintln!("Run 'heimdall_cli report' first to generate reports");
                    std::process::exit(1);
                }
            }
        }
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
    }

    Ok(())
}
