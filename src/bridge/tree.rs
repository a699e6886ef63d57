//! UI tree snapshot types.
//!
//! The host owns the live tree. The bridge only ever sees a snapshot of it
//! ([`UiNode`]) and hands out lookup results ([`UiElementRef`]) that copy the
//! fields a caller needs. A `UiElementRef` is stale after the next tree
//! mutation; callers re-query instead of holding on to it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A rectangle in screen coordinates.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point, useful for tapping a located element. Saturates at the
    /// coordinate range.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }
}

/// One node of a UI tree snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct UiNode {
    #[serde(default)]
    pub bounds: Rect,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_description: Option<String>,
    /// Fully qualified view identifier, e.g. `com.example:id/send`.
    #[serde(default)]
    pub view_id: Option<String>,
    /// Holds input focus.
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

impl UiNode {
    /// Pre-order (document order) traversal, starting with `self`.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    pub(crate) fn to_element_ref(&self) -> UiElementRef {
        UiElementRef {
            bounds: self.bounds,
            text: self.text.clone().or_else(|| self.content_description.clone()),
            identifier: self.view_id.clone(),
        }
    }
}

/// Depth-first pre-order iterator over a [`UiNode`] tree.
pub struct PreOrder<'a> {
    stack: Vec<&'a UiNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a UiNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Lookup result pointing into the current tree snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct UiElementRef {
    pub bounds: Rect,
    pub text: Option<String>,
    pub identifier: Option<String>,
}
