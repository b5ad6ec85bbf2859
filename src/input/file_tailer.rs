//! Continuous tailing of an access-log file.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use super::InputError;

/// Tails a log file from its current end, emitting raw lines.
///
/// Lines go out unparsed; the consumer decides what to do with them.
/// This keeps the tailer reusable for both classification and plain
/// monitoring.
pub struct AsyncFileTailer {
    file_path: PathBuf,
}

impl AsyncFileTailer {
    pub fn new(file_path: PathBuf) -> Self {
        AsyncFileTailer { file_path }
    }

    /// Run the tailer, sending lines through the channel.
    ///
    /// Runs until the receiving side is dropped. Starts at the end of the
    /// file, so only lines appended after startup are seen.
    pub async fn run(&mut self, tx: mpsc::Sender<String>) -> Result<(), InputError> {
        if !self.file_path.is_file() {
            return Err(InputError::NotFound(self.file_path.clone()));
        }

        let file = File::open(&self.file_path).await?;
        let mut reader = BufReader::new(file);
        reader.seek(std::io::SeekFrom::End(0)).await?;

        log::info!("Tailing {:?}", self.file_path);

        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    // EOF, wait for more data
                    sleep(Duration::from_millis(100)).await;
                }
                Ok(_) => {
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    if tx.send(line).await.is_err() {
                        log::info!("Channel closed, stopping file tailer");
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Error reading {:?}: {}", self.file_path, e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_tailer_rejects_missing_file() {
        let mut tailer = AsyncFileTailer::new(PathBuf::from("/nonexistent/access.log"));
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            tailer.run(tx).await,
            Err(InputError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tailer_emits_appended_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "line written before startup").unwrap();
        file.flush().unwrap();

        let path = file.path().to_path_buf();
        let (tx, mut rx) = mpsc::channel(8);

        let mut tailer = AsyncFileTailer::new(path);
        let handle = tokio::spawn(async move { tailer.run(tx).await });

        // Give the tailer time to open the file and seek to the end.
        sleep(Duration::from_millis(300)).await;

        writeln!(file, "1.1.1.1 - - [01/Oct/2019:07:26:54 +0300] \"GET / HTTP/1.1\" 200 1").unwrap();
        file.flush().unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for tailed line")
            .expect("channel closed unexpectedly");

        // The pre-existing line is skipped; only the appended one arrives.
        assert!(received.starts_with("1.1.1.1"));
        assert!(!received.ends_with('\n'));

        drop(rx);
        handle.abort();
    }
}
