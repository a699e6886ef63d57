//! Platform capability gating and the service declaration sent to the OS.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// First API level that accepts a service-info declaration and view-id lookups.
pub const MIN_LEVEL_SERVICE_INFO: u32 = 18;
/// First API level that supports view-id lookups.
pub const MIN_LEVEL_FIND_BY_ID: u32 = 18;
/// First API level that can set text on an editable node.
pub const MIN_LEVEL_SET_TEXT: u32 = 21;
/// First API level that supports synthetic gesture dispatch.
pub const MIN_LEVEL_GESTURE_DISPATCH: u32 = 24;

/// Event-type mask requesting every event the platform emits.
pub const TYPES_ALL_MASK: u32 = 0xFFFF_FFFF;

/// Feature availability, computed once per activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Capabilities {
    pub api_level: u32,
    pub service_info: bool,
    pub find_by_id: bool,
    pub set_text: bool,
    pub gesture_dispatch: bool,
}

impl Capabilities {
    /// Derive the capability set for a platform API level.
    pub fn for_api_level(api_level: u32) -> Self {
        Self {
            api_level,
            service_info: api_level >= MIN_LEVEL_SERVICE_INFO,
            find_by_id: api_level >= MIN_LEVEL_FIND_BY_ID,
            set_text: api_level >= MIN_LEVEL_SET_TEXT,
            gesture_dispatch: api_level >= MIN_LEVEL_GESTURE_DISPATCH,
        }
    }

    /// Nothing available. Used before the first activation.
    pub fn none() -> Self {
        Self::for_api_level(0)
    }
}

/// How the service presents feedback to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackMode {
    Spoken,
    Haptic,
    Audible,
    Visual,
    #[default]
    Generic,
}

/// Feature flags requested from the accessibility subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServiceFlags {
    pub touch_exploration: bool,
    pub enhanced_web_access: bool,
    pub report_view_ids: bool,
    pub filter_key_events: bool,
}

impl Default for ServiceFlags {
    fn default() -> Self {
        Self {
            touch_exploration: true,
            enhanced_web_access: true,
            report_view_ids: true,
            filter_key_events: true,
        }
    }
}

/// Declaration handed to the OS at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServiceInfo {
    /// Bit mask of the event types the service wants delivered.
    pub event_types: u32,
    pub feedback: FeedbackMode,
    pub flags: ServiceFlags,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            event_types: TYPES_ALL_MASK,
            feedback: FeedbackMode::Generic,
            flags: ServiceFlags::default(),
        }
    }
}
