use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use heimdall::alerting::{AlertDispatcher, AlertQueue};
use heimdall::classifier;
use heimdall::config::Config;
use heimdall::input::AsyncFileTailer;
use heimdall::models::Event;
use heimdall::output::{OutputFormat, OutputHandler};
use heimdall::persistence::{EventStore, ReportStore, SqliteStore};
use heimdall::report::{screen_reports, ReportGenerator};

/// Watch-mode daemon: tail the access log, classify lines, persist event
/// batches, and regenerate abuse reports on an interval.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Heimdall daemon...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file not found, using defaults");
        Config::default()
    };

    // Setup graceful shutdown signal handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, gracefully stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    // Open the store; one handle serves both contracts
    let store = SqliteStore::new(&config.database.path)?;
    log::info!("Database: {:?}", config.database.path);

    // Initialize output handler for flagged reports
    let output_format = OutputFormat::from_str(&config.output.format);
    let mut output_handler = OutputHandler::new(output_format, config.output.file_path.clone())?;

    // Start the alert dispatcher
    let (alert_tx, alert_rx) = AlertDispatcher::create_channel();
    let dispatcher = AlertDispatcher::new(config.alerts.clone());
    tokio::spawn(dispatcher.run(alert_rx));
    let alert_queue = AlertQueue::new(alert_tx);

    // Start tailing the access log
    let (line_tx, mut line_rx) = mpsc::channel::<String>(1024);
    let access_log = config.input.access_log.clone();
    tokio::spawn(async move {
        let mut tailer = AsyncFileTailer::new(access_log);
        if let Err(e) = tailer.run(line_tx).await {
            log::error!("File tailer stopped: {}", e);
        }
    });

    log::info!("Daemon running. Press Ctrl+C to stop.");

    let mut buffer: Vec<Event> = Vec::new();
    let mut flush_tick = interval(Duration::from_secs(5));
    let mut aggregate_tick = interval(Duration::from_secs(config.aggregation.interval_seconds));
    // The first tick of a tokio interval fires immediately; consume it so
    // reports are not regenerated before any events arrive.
    aggregate_tick.tick().await;

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            maybe_line = line_rx.recv() => {
                match maybe_line {
                    Some(line) => {
                        if let Some(event) = classifier::classify(&line, None) {
                            buffer.push(event);
                        }
                        if buffer.len() >= config.aggregation.flush_batch_size {
                            flush_events(&store, &mut buffer);
                        }
                    }
                    None => {
                        log::warn!("Tailer channel closed, shutting down");
                        break;
                    }
                }
            }
            _ = flush_tick.tick() => {
                flush_events(&store, &mut buffer);
            }
            _ = aggregate_tick.tick() => {
                flush_events(&store, &mut buffer);
                regenerate_and_screen(&store, &config, &alert_queue, &mut output_handler);
            }
        }
    }

    // Final flush so no classified events are lost on shutdown
    flush_events(&store, &mut buffer);
    regenerate_and_screen(&store, &config, &alert_queue, &mut output_handler);
    output_handler.flush()?;

    log::info!("Heimdall daemon stopped");
    Ok(())
}

/// Persist the buffered events as one batch.
///
/// On failure the batch is kept for the next flush; the insert is
/// transactional, so no partial batch is ever stored.
fn flush_events(store: &SqliteStore, buffer: &mut Vec<Event>) {
    if buffer.is_empty() {
        return;
    }

    let events: &dyn EventStore = store;
    match events.insert_many(buffer) {
        Ok(()) => {
            log::info!("Saved {} event(s)", buffer.len());
            buffer.clear();
        }
        Err(e) => {
            log::error!("Failed to save {} event(s), retrying later: {}", buffer.len(), e);
        }
    }
}

/// Regenerate reports, then screen them against the abuse thresholds and
/// queue an alert for every report that crosses one.
fn regenerate_and_screen(
    store: &SqliteStore,
    config: &Config,
    alert_queue: &AlertQueue,
    output_handler: &mut OutputHandler,
) {
    let event_store: &dyn EventStore = store;
    let report_store: &dyn ReportStore = store;

    let reports = match ReportGenerator::new(event_store, report_store).regenerate() {
        Ok(reports) => reports,
        Err(e) => {
            log::error!("Report regeneration failed: {}", e);
            return;
        }
    };

    for alert in screen_reports(&reports, &config.alerts.thresholds) {
        log::warn!(
            "ABUSE DETECTED: [{}] {} - IP: {}, Severity: {}",
            alert.rule_name,
            alert.description,
            alert.source_ip,
            alert.severity
        );
        if let Err(e) = output_handler.write_alert(&alert) {
            log::error!("Failed to write alert: {}", e);
        }
        alert_queue.queue_alert(alert);
    }
}
