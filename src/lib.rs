#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! axbridge: an automation bridge between an OS accessibility subsystem and an
//! external decision engine.
//!
//! The bridge normalizes UI events for the engine and turns the engine's
//! action requests (tap, swipe, element lookup, screen capture) into gesture
//! dispatches and tree queries, gated on what the platform supports.
//! - `bridge`: event translation, element lookup, gestures, action execution, lifecycle.
//! - `platform`: the host and engine boundaries, plus simulated/desktop/logging implementations.
//! - `config`: configuration models, loader, and schema helpers.
//! - `sources`: host-message sources (file, stdin) for the headless CLI.
//! - `session`: applies host messages to a bridge in arrival order.
//!
//! Use `axbridge::prelude::*` to bring commonly used items into scope quickly.

/// Public module: the bridge core.
pub mod bridge;
/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: host and decision-engine boundaries.
pub mod platform;
/// Public module: headless host session.
pub mod session;
/// Public module: host-message sources (file, stdin).
pub mod sources;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Map a level name (trace|debug|info|warn|error) to a tracing level.
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set (as a plain level).
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with(level);
}

/// Initialize tracing at an explicit level. Logs go to stderr so stdout stays
/// free for action results.
pub fn init_tracing_with(level: tracing::Level) {
    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use axbridge::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use std::time::Duration;

    pub use crate as axbridge;

    // Core types
    pub use crate::bridge::{
        ActionHandle, ActionRequest, ActionResult, BridgeService, Capabilities, EventKind,
        LifecycleState, RawEvent, UiElementRef, UiEvent, UiNode,
    };
    pub use crate::platform::{AccessibilityHost, DecisionEngine, DispatchReply};

    // Frequently used internal modules
    pub use crate::{bridge, config, platform, sources};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse() {
        assert_eq!(parse_level("WARNING"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("debug"), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level("loud"), None);
        assert_eq!(version(), PKG_VERSION);
    }
}
