/*!
Host-message sources.

A source reads newline-delimited JSON host messages (lifecycle signals, raw
accessibility events, action requests) and pushes each parsed value into a
channel consumed by the session. Concrete implementations:

- `file.rs`         -> `FileSource`  (poll a single NDJSON file)
- `stdin_source.rs` -> `StdinSource` (NDJSON from standard input)

Each source is responsible for:
- Parsing raw input into `serde_json::Value`, one value per line, in order
- Pushing values via `Sender<Value>` while respecting backpressure (`send().await`)
- Logging errors and continuing (never panicking inside tasks)
- Stopping when the channel closes or the cancellation token fires
*/

use serde_json::Value;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, SourceConfig};

pub mod file;
pub mod stdin_source;

pub use file::FileSource;
pub use stdin_source::StdinSource;

/// Trait implemented by all host-message sources.
pub trait MessageSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background. The task ends when `cancel` fires,
    /// the channel closes, or the input is exhausted.
    fn start(&self, sender: Sender<Value>, cancel: CancellationToken) -> JoinHandle<()>;
}

/// Construct all configured sources, in config order.
pub fn build_sources_from_config(cfg: &Config) -> Vec<Box<dyn MessageSource>> {
    cfg.sources
        .iter()
        .map(|sc| -> Box<dyn MessageSource> {
            match sc {
                SourceConfig::File {
                    path,
                    poll_ms,
                    delete_on_success,
                } => Box::new(FileSource::new(path.clone(), *poll_ms, *delete_on_success)),
                SourceConfig::Stdin => Box::new(StdinSource::new()),
            }
        })
        .collect()
}

/// Spawn every source, returning their `JoinHandle`s.
pub fn spawn_all_sources(
    sources: &[Box<dyn MessageSource>],
    sender: Sender<Value>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|src| {
            info!(
                target: "axbridge::sources",
                source = %src.name(),
                "Starting source task"
            );
            src.start(sender.clone(), cancel.child_token())
        })
        .collect()
}

/// Parse every non-empty line of `text`, logging and skipping malformed ones.
pub(crate) fn parse_lines(source: &str, text: &str) -> Vec<Value> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    target: "axbridge::sources",
                    source, error = %e, line,
                    "Failed to parse JSON line"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_sources_in_config_order() {
        let cfg = crate::config::load_from_str(
            r#"{"sources": [{"type": "file", "path": "a.ndjson"}, {"type": "stdin"}]}"#,
        )
        .unwrap();
        let names: Vec<&str> = build_sources_from_config(&cfg)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, ["file", "stdin"]);
    }

    #[test]
    fn parse_lines_skips_blank_and_malformed() {
        let values = parse_lines("test", "{\"type\":\"connect\"}\n\n not json \n{\"type\":\"resume\"}\n");
        assert_eq!(values, vec![json!({"type": "connect"}), json!({"type": "resume"})]);
    }
}
