//! Element lookup against the active window's tree snapshot.
//!
//! Every lookup is single-result: when several elements match, the first
//! one in pre-order (document order) traversal wins. Callers that need every
//! match have to walk the tree themselves.

use tracing::trace;

use super::capability::Capabilities;
use super::tree::{UiElementRef, UiNode};

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(UiElementRef),
    NotFound,
    /// The platform cannot perform this kind of lookup at all.
    Unsupported,
}

/// Find the first element whose text or content description contains `text`
/// (case-insensitive). No root means no active window: `NotFound`.
pub fn find_by_text(root: Option<&UiNode>, text: &str) -> Lookup {
    let Some(root) = root else {
        trace!(target: "axbridge::locator", "find_by_text: no active root");
        return Lookup::NotFound;
    };
    let needle = text.to_lowercase();
    let matches = |candidate: &Option<String>| {
        candidate
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
    };

    root.iter()
        .find(|n| matches(&n.text) || matches(&n.content_description))
        .map_or(Lookup::NotFound, |n| Lookup::Found(n.to_element_ref()))
}

/// Find the first element whose view id equals `identifier`.
///
/// Gated on [`Capabilities::find_by_id`]; the gate is checked before the tree
/// is looked at, so an unsupported platform reports `Unsupported` whatever the
/// tree contains.
pub fn find_by_id(caps: &Capabilities, root: Option<&UiNode>, identifier: &str) -> Lookup {
    if !caps.find_by_id {
        return Lookup::Unsupported;
    }
    let Some(root) = root else {
        trace!(target: "axbridge::locator", "find_by_id: no active root");
        return Lookup::NotFound;
    };

    root.iter()
        .find(|n| n.view_id.as_deref() == Some(identifier))
        .map_or(Lookup::NotFound, |n| Lookup::Found(n.to_element_ref()))
}

/// The element holding input focus. When a stale snapshot marks several
/// nodes focused, the first in document order wins.
pub fn find_focused(root: Option<&UiNode>) -> Lookup {
    let Some(root) = root else {
        trace!(target: "axbridge::locator", "find_focused: no active root");
        return Lookup::NotFound;
    };
    root.iter()
        .find(|n| n.focused)
        .map_or(Lookup::NotFound, |n| Lookup::Found(n.to_element_ref()))
}
