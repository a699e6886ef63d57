//! Action requests issued by the decision engine and their results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::tree::{UiElementRef, UiNode};

/// Failure reasons reported through [`ActionResult::Failed`].
pub mod reason {
    pub const NATIVE_UNINITIALIZED: &str = "native-uninitialized";
    pub const DISPATCH_TIMEOUT: &str = "dispatch-timeout";
    pub const DISPATCH_REJECTED: &str = "dispatch-rejected";
    pub const DISPATCH_ABANDONED: &str = "dispatch-abandoned";
    pub const ACTION_REJECTED: &str = "action-rejected";
    pub const BRIDGE_INACTIVE: &str = "bridge-inactive";
    pub const HANDLE_REVOKED: &str = "handle-revoked";
    pub const BRIDGE_GONE: &str = "bridge-gone";
}

/// A request to act on the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    Tap {
        x: i32,
        y: i32,
    },
    Swipe {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        /// Omitted means the configured default swipe duration.
        #[serde(default)]
        duration_ms: Option<i64>,
    },
    LongPress {
        x: i32,
        y: i32,
        #[serde(default)]
        duration_ms: Option<i64>,
    },
    FindByText {
        text: String,
    },
    FindById {
        identifier: String,
    },
    /// Snapshot of the whole active window.
    TraverseUi,
    /// The element holding input focus.
    GetCurrentFocus,
    /// Run a node action on the first element with the given view id.
    PerformAction {
        identifier: String,
        action: NodeAction,
    },
    CaptureScreen,
}

/// Semantic actions performed on a node rather than at coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeAction {
    Click,
    LongClick,
    Focus,
    ScrollForward,
    ScrollBackward,
    /// Replace the text of an editable node.
    SetText { text: String },
}

impl ActionRequest {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tap { .. } => "tap",
            Self::Swipe { .. } => "swipe",
            Self::LongPress { .. } => "long_press",
            Self::FindByText { .. } => "find_by_text",
            Self::FindById { .. } => "find_by_id",
            Self::TraverseUi => "traverse_ui",
            Self::GetCurrentFocus => "get_current_focus",
            Self::PerformAction { .. } => "perform_action",
            Self::CaptureScreen => "capture_screen",
        }
    }
}

/// Screen capture produced by the native side. The bridge never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScreenSnapshot(pub Vec<u8>);

/// Data carried by a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Element(UiElementRef),
    Tree(UiNode),
    Screen(ScreenSnapshot),
}

/// Outcome of an [`ActionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ActionResult {
    Ok(Option<Payload>),
    /// The platform lacks the capability; nothing was attempted.
    Unsupported,
    /// The query ran and matched nothing.
    NotFound,
    /// The caller broke the request contract.
    InvalidParameter(String),
    Failed(String),
}

impl ActionResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The located element, if this is a successful lookup.
    pub fn element(&self) -> Option<&UiElementRef> {
        match self {
            Self::Ok(Some(Payload::Element(el))) => Some(el),
            _ => None,
        }
    }

    /// The window snapshot, if this is a successful traversal.
    pub fn tree(&self) -> Option<&UiNode> {
        match self {
            Self::Ok(Some(Payload::Tree(root))) => Some(root),
            _ => None,
        }
    }
}
