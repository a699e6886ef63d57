//! Stdin message source.
//!
//! Reads newline-delimited JSON host messages from standard input.
//!
//! Behavior:
//! - Each non-empty line is trimmed and parsed as JSON.
//! - Parsed values are forwarded through the channel in input order.
//! - Malformed lines are logged with `warn!` and skipped; reading continues.
//! - EOF, a closed channel or cancellation ends the task.
//!
//! Reads happen on a detached `axbridge-stdin` thread. A blocking stdin read
//! cannot be interrupted, so cancellation ends the task immediately and the
//! thread exits on its next line (or with the process).
//!
//! Useful for shell pipelines, e.g.:
//!     printf '{"type":"connect"}\n{"type":"action","action":{"type":"tap","x":5,"y":5}}\n' \
//!       | axbridge --config bridge.json

use std::io::{self, BufRead};
use std::thread;

use serde_json::Value;
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{MessageSource, parse_lines};

/// Source that reads newline-delimited JSON messages from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MessageSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<Value>, cancel: CancellationToken) -> JoinHandle<()> {
        let (line_tx, line_rx) = mpsc::channel::<String>(64);
        let reader = thread::Builder::new()
            .name("axbridge-stdin".into())
            .spawn(move || read_lines(io::stdin().lock(), &line_tx));
        if let Err(e) = reader {
            error!(target: "axbridge::sources", error = %e, "Failed to spawn stdin reader thread");
        }
        tokio::spawn(forward_lines(line_rx, sender, cancel))
    }
}

/// Blocking half: push raw lines until EOF, a read error or a closed channel.
fn read_lines<R: BufRead>(input: R, lines: &mpsc::Sender<String>) {
    for line in input.lines() {
        match line {
            Ok(line) => {
                if lines.blocking_send(line).is_err() {
                    trace!(target: "axbridge::sources", "stdin consumer gone; reader exiting");
                    return;
                }
            }
            Err(e) => {
                warn!(
                    target: "axbridge::sources",
                    error = %e,
                    "Error reading from stdin; terminating reader"
                );
                return;
            }
        }
    }
    info!(target: "axbridge::sources", "EOF on stdin; StdinSource exiting");
}

/// Async half: parse lines and forward them until the reader ends or
/// `cancel` fires.
async fn forward_lines(
    mut lines: mpsc::Receiver<String>,
    sender: Sender<Value>,
    cancel: CancellationToken,
) {
    info!(target: "axbridge::sources", "StdinSource task started (reading lines)");
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => {
                info!(target: "axbridge::sources", "StdinSource cancelled");
                break;
            }
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            break;
        };
        for value in parse_lines("stdin", &line) {
            if let Err(e) = sender.send(value).await {
                error!(
                    target: "axbridge::sources",
                    error = %e,
                    "Channel closed while sending stdin message; terminating task"
                );
                return;
            }
        }
    }
    trace!(target: "axbridge::sources", "StdinSource task ended");
}
