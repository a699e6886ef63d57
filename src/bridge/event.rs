//! Event translation: raw accessibility callbacks into normalized [`UiEvent`]s.
//!
//! Translation is total. Codes the bridge does not know map to
//! [`EventKind::Other`] and are still forwarded; the decision engine decides
//! whether to ignore them.

use std::time::{SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Platform event-type code for a clicked view.
pub const TYPE_VIEW_CLICKED: i32 = 0x0000_0001;
/// Platform event-type code for a focused view.
pub const TYPE_VIEW_FOCUSED: i32 = 0x0000_0008;
/// Platform event-type code for a window content change.
pub const TYPE_WINDOW_CONTENT_CHANGED: i32 = 0x0000_0800;

/// An event exactly as the accessibility subsystem delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawEvent {
    /// Platform event-type code.
    pub event_type: i32,
    /// Text fragments attached to the event (may be empty).
    #[serde(default)]
    pub text: Vec<String>,
    /// Milliseconds since the Unix epoch at which the platform emitted the event.
    pub event_time_ms: u64,
}

impl RawEvent {
    /// Build a raw event stamped with the current wall-clock time.
    pub fn new(event_type: i32, text: Vec<String>) -> Self {
        Self {
            event_type,
            text,
            event_time_ms: now_ms(),
        }
    }
}

/// Normalized event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum EventKind {
    Clicked,
    Focused,
    ContentChanged,
    /// Any code without a dedicated variant, carried verbatim.
    Other(i32),
}

impl From<i32> for EventKind {
    fn from(code: i32) -> Self {
        match code {
            TYPE_VIEW_CLICKED => Self::Clicked,
            TYPE_VIEW_FOCUSED => Self::Focused,
            TYPE_WINDOW_CONTENT_CHANGED => Self::ContentChanged,
            other => Self::Other(other),
        }
    }
}

/// Normalized, immutable UI event handed to the decision engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UiEvent {
    pub kind: EventKind,
    pub text: Option<String>,
    pub timestamp_ms: u64,
}

/// Translate a raw platform event. Never fails.
///
/// Text fragments are joined with a single space; blank fragments are
/// skipped and an event without any text carries `None`.
pub fn translate(raw: &RawEvent) -> UiEvent {
    let parts: Vec<&str> = raw
        .text
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let text = if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    };

    UiEvent {
        kind: EventKind::from(raw.event_type),
        text,
        timestamp_ms: raw.event_time_ms,
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event_type: i32, text: &[&str]) -> RawEvent {
        RawEvent {
            event_type,
            text: text.iter().map(|s| (*s).to_string()).collect(),
            event_time_ms: 42,
        }
    }

    #[test]
    fn known_codes_map_to_named_kinds() {
        assert_eq!(translate(&raw(TYPE_VIEW_CLICKED, &[])).kind, EventKind::Clicked);
        assert_eq!(translate(&raw(TYPE_VIEW_FOCUSED, &[])).kind, EventKind::Focused);
        assert_eq!(
            translate(&raw(TYPE_WINDOW_CONTENT_CHANGED, &[])).kind,
            EventKind::ContentChanged
        );
    }

    #[test]
    fn unknown_codes_are_kept_as_other() {
        for code in [0, 2, 4, 0x20, 0x4000_0000, -1, i32::MIN, i32::MAX] {
            let ev = translate(&raw(code, &["x"]));
            assert_eq!(ev.kind, EventKind::Other(code));
            assert_eq!(ev.text.as_deref(), Some("x"));
        }
    }

    #[test]
    fn text_fragments_are_joined_and_blanks_dropped() {
        let ev = translate(&raw(TYPE_VIEW_CLICKED, &["Send", "  ", " now "]));
        assert_eq!(ev.text.as_deref(), Some("Send now"));
        assert_eq!(translate(&raw(TYPE_VIEW_CLICKED, &[" "])).text, None);
    }

    #[test]
    fn timestamp_is_taken_from_the_raw_event() {
        assert_eq!(translate(&raw(TYPE_VIEW_FOCUSED, &[])).timestamp_ms, 42);
    }

    #[test]
    fn translation_preserves_sequence_order() {
        let codes: Vec<i32> = (0..200).map(|i| (i * 7) % 4096).collect();
        let raws: Vec<RawEvent> = codes.iter().map(|c| raw(*c, &[])).collect();
        let out: Vec<EventKind> = raws.iter().map(|r| translate(r).kind).collect();
        let expected: Vec<EventKind> = codes.into_iter().map(EventKind::from).collect();
        assert_eq!(out, expected);
    }
}
