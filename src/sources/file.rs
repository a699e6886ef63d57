//! File message source.
//!
//! Polls a single file path for newline-delimited JSON host messages.
//!
//! Behavior:
//! - Every non-empty line is one message; messages are sent in file order.
//! - If `delete_on_success = true`: the file is deleted after its messages
//!   were sent, so the producer writes a fresh file for the next batch.
//! - If `delete_on_success = false`: the file is re-read only when its
//!   (length, mtime_seconds) signature changes, and the whole file is sent
//!   again. Producers in this mode replace the file rather than append to it.
//! - Malformed lines are logged and skipped.
//! - A missing file is silent until it appears.
//!
//! The task ends when the channel closes or the cancellation token fires.

use std::fs;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio::{
    fs as afs,
    sync::mpsc::Sender,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{MessageSource, parse_lines};

/// Source that polls a single file for NDJSON messages.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
    poll_ms: u64,
    delete_on_success: bool,
}

impl FileSource {
    /// - `path`: target file path (absolute or relative).
    /// - `poll_ms`: optional polling interval (defaults to 100ms; minimum 10ms).
    /// - `delete_on_success`: whether to delete the file after dispatching it.
    pub fn new(path: String, poll_ms: Option<u64>, delete_on_success: Option<bool>) -> Self {
        Self {
            path,
            poll_ms: poll_ms.unwrap_or(100).max(10),
            delete_on_success: delete_on_success.unwrap_or(false),
        }
    }

    /// Coarse change signature (length, mtime seconds).
    fn file_signature(meta: &fs::Metadata) -> (u64, u64) {
        let len = meta.len();
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());
        (len, mtime)
    }
}

impl MessageSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn start(&self, sender: Sender<Value>, cancel: CancellationToken) -> JoinHandle<()> {
        let path = self.path.clone();
        let poll_ms = self.poll_ms;
        let delete_on_success = self.delete_on_success;

        tokio::spawn(async move {
            info!(
                target: "axbridge::sources",
                %path, poll_ms, delete_on_success,
                "FileSource task started"
            );

            let mut last_sig: Option<(u64, u64)> = None;
            let interval = Duration::from_millis(poll_ms);
            let mut next_tick = Instant::now();

            'poll: loop {
                tokio::select! {
                    () = cancel.cancelled() => break 'poll,
                    () = sleep_until(next_tick) => {}
                }
                next_tick += interval;

                let meta = match fs::metadata(&path) {
                    Ok(m) if m.is_file() => m,
                    Ok(_) => {
                        warn!(
                            target: "axbridge::sources",
                            %path,
                            "Path exists but is not a regular file"
                        );
                        continue;
                    }
                    Err(_) => continue,
                };

                let sig = Self::file_signature(&meta);
                if !delete_on_success && last_sig == Some(sig) {
                    trace!(target: "axbridge::sources", %path, "File unchanged; skipping");
                    continue;
                }

                let content = match afs::read_to_string(&path).await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(target: "axbridge::sources", %path, error = %e, "Failed to read file");
                        continue;
                    }
                };

                let messages = parse_lines("file", &content);
                let count = messages.len();
                for value in messages {
                    if let Err(e) = sender.send(value).await {
                        error!(
                            target: "axbridge::sources",
                            %path, error = %e,
                            "Channel closed; FileSource terminating"
                        );
                        break 'poll;
                    }
                }
                if count > 0 {
                    info!(target: "axbridge::sources", %path, count, "Dispatched messages from file");
                }

                if delete_on_success {
                    if let Err(e) = afs::remove_file(&path).await {
                        warn!(
                            target: "axbridge::sources",
                            %path, error = %e,
                            "Failed to delete file after dispatch"
                        );
                    }
                } else {
                    last_sig = Some(sig);
                }
            }

            info!(target: "axbridge::sources", %path, "FileSource task ended");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[test]
    fn poll_interval_has_a_floor() {
        assert_eq!(FileSource::new("x".into(), Some(50), Some(false)).poll_ms, 50);
        assert_eq!(FileSource::new("y".into(), Some(1), None).poll_ms, 10);
    }

    #[tokio::test]
    async fn sends_lines_in_order_and_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.ndjson");
        std::fs::write(&path, "{\"type\":\"connect\"}\n{\"type\":\"interrupt\"}\n").unwrap();

        let (tx, mut rx) = mpsc::channel::<Value>(8);
        let cancel = CancellationToken::new();
        let src = FileSource::new(path.to_string_lossy().into_owned(), Some(10), Some(true));
        let handle = src.start(tx, cancel.clone());

        assert_eq!(rx.recv().await.unwrap(), json!({"type": "connect"}));
        assert_eq!(rx.recv().await.unwrap(), json!({"type": "interrupt"}));

        cancel.cancel();
        handle.await.unwrap();
        assert!(!path.exists());
    }
}
