use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bridge::{ServiceInfo, UiNode};
use crate::platform::DispatchPolicy;

/// Root configuration for the bridge and its headless host.
///
/// Deserialized from a JSON file. Every section has defaults, so `{}` is a
/// valid configuration:
/// - `service`: the declaration sent to the OS at activation
/// - `gestures`: gesture timing and dispatch timeout
/// - `host`: settings for the simulated (or desktop) host
/// - `sources`: where host messages are read from
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceInfo,

    #[serde(default)]
    pub gestures: GestureSettings,

    #[serde(default)]
    pub host: HostConfig,

    /// Host-message sources (file, stdin).
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Gesture timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct GestureSettings {
    /// Tap hold time. A 0 is normalized to the minimum gesture duration.
    pub tap_duration_ms: u64,
    /// Duration used by `swipe` when the caller does not give one.
    pub swipe_duration_ms: u64,
    /// Duration used by `long_press` when the caller does not give one.
    pub long_press_duration_ms: u64,
    /// How long to wait for the OS to confirm a dispatched gesture.
    pub dispatch_timeout_ms: u64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            tap_duration_ms: 50,
            swipe_duration_ms: 500,
            long_press_duration_ms: 1000,
            dispatch_timeout_ms: 1000,
        }
    }
}

impl GestureSettings {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// Headless host settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HostConfig {
    /// Platform API level reported to the bridge.
    pub api_level: u32,
    /// Whether the native decision engine initializes successfully.
    pub native_init: bool,
    /// How the simulated OS answers gesture dispatches.
    pub dispatch: DispatchPolicy,
    /// Initial tree of the active window. Omitted means no active window.
    pub root: Option<UiNode>,
    /// File whose bytes are returned for screen captures.
    pub capture_file: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_level: 30,
            native_init: true,
            dispatch: DispatchPolicy::Accept,
            root: None,
            capture_file: None,
        }
    }
}

/// Host-message source configuration.
/// Use `type` to select a variant:
/// - "file": poll a single file for newline-delimited JSON messages
/// - "stdin": read newline-delimited JSON messages from standard input
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Poll a single file for messages.
    File {
        /// Absolute or relative path to the file.
        path: String,
        /// Poll interval in milliseconds (default: 100).
        #[serde(default)]
        poll_ms: Option<u64>,
        /// Delete the file after its messages were read (default: false).
        #[serde(default)]
        delete_on_success: Option<bool>,
    },

    /// Read messages from standard input.
    Stdin,
}
