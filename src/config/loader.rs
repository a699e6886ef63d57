use anyhow::{Context, Result, bail, ensure};
use schemars::{Schema, schema_for};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::{Config, SourceConfig};
use crate::bridge::gesture::MAX_GESTURE_DURATION_MS;

/// Longest dispatch timeout accepted. Dispatch waits are meant to be short.
pub const MAX_DISPATCH_TIMEOUT_MS: u64 = 60_000;

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Config> {
    let cfg: Config =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Config model (for external validation or tooling).
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Write the JSON Schema for the Config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Range and consistency checks serde cannot express.
/// - Gesture defaults must fit the gesture duration cap; swipe and long press
///   must also be positive.
/// - The dispatch timeout must be positive and short.
/// - At most one stdin source; file sources need a path.
pub fn validate_config(cfg: &Config) -> Result<()> {
    let g = &cfg.gestures;
    ensure!(
        g.tap_duration_ms <= MAX_GESTURE_DURATION_MS,
        "gestures.tap_duration_ms must be at most {MAX_GESTURE_DURATION_MS}, got {}",
        g.tap_duration_ms
    );
    ensure!(
        g.swipe_duration_ms > 0 && g.swipe_duration_ms <= MAX_GESTURE_DURATION_MS,
        "gestures.swipe_duration_ms must be within 1..={MAX_GESTURE_DURATION_MS}, got {}",
        g.swipe_duration_ms
    );
    ensure!(
        g.long_press_duration_ms > 0 && g.long_press_duration_ms <= MAX_GESTURE_DURATION_MS,
        "gestures.long_press_duration_ms must be within 1..={MAX_GESTURE_DURATION_MS}, got {}",
        g.long_press_duration_ms
    );
    ensure!(
        g.dispatch_timeout_ms > 0 && g.dispatch_timeout_ms <= MAX_DISPATCH_TIMEOUT_MS,
        "gestures.dispatch_timeout_ms must be within 1..={MAX_DISPATCH_TIMEOUT_MS}, got {}",
        g.dispatch_timeout_ms
    );

    let mut stdin_sources = 0;
    for (idx, source) in cfg.sources.iter().enumerate() {
        match source {
            SourceConfig::Stdin => stdin_sources += 1,
            SourceConfig::File { path, .. } => {
                if path.trim().is_empty() {
                    bail!("File source at index {} has an empty path", idx);
                }
            }
        }
    }
    ensure!(stdin_sources <= 1, "At most one stdin source may be configured");

    Ok(())
}
