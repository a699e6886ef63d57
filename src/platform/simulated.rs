//! In-memory accessibility host.
//!
//! Holds a replaceable UI tree and answers gesture dispatches according to a
//! [`DispatchPolicy`]. Node actions resolve against the tree by view id;
//! `Focus` and `SetText` change it. Every call is recorded so callers can assert on what
//! reached the "OS".

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{AccessibilityHost, DispatchReply};
use crate::bridge::{GesturePath, NodeAction, ServiceInfo, UiElementRef, UiNode};

/// How the simulated OS answers a gesture dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Report completion immediately.
    #[default]
    Accept,
    /// Report completion after a delay.
    AcceptAfter { delay_ms: u64 },
    /// Accept the submission, then report cancellation.
    Reject,
    /// Refuse the submission outright.
    Refuse,
    /// Accept the submission and never report back.
    Silent,
}

#[derive(Debug, Default)]
pub struct SimulatedHost {
    api_level: AtomicU32,
    root: RwLock<Option<UiNode>>,
    policy: RwLock<DispatchPolicy>,
    service_info: Mutex<Option<ServiceInfo>>,
    dispatched: Mutex<Vec<GesturePath>>,
    performed: Mutex<Vec<(String, NodeAction)>>,
    // Replies held open by `Silent` so the waiting side sees no answer.
    parked: Mutex<Vec<DispatchReply>>,
    tree_queries: AtomicUsize,
}

impl SimulatedHost {
    pub fn new(api_level: u32) -> Self {
        Self {
            api_level: AtomicU32::new(api_level),
            ..Self::default()
        }
    }

    pub fn with_root(self, root: UiNode) -> Self {
        *self.root.write() = Some(root);
        self
    }

    pub fn with_policy(self, policy: DispatchPolicy) -> Self {
        *self.policy.write() = policy;
        self
    }

    /// Change the level reported to the next activation.
    pub fn set_api_level(&self, api_level: u32) {
        self.api_level.store(api_level, Ordering::SeqCst);
    }

    /// Replace (or clear) the active window's tree.
    pub fn set_root(&self, root: Option<UiNode>) {
        *self.root.write() = root;
    }

    pub fn set_policy(&self, policy: DispatchPolicy) {
        *self.policy.write() = policy;
    }

    /// Gestures that reached the host, in submission order.
    pub fn dispatched(&self) -> Vec<GesturePath> {
        self.dispatched.lock().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().len()
    }

    /// Node actions the host performed, as (view id, action).
    pub fn performed(&self) -> Vec<(String, NodeAction)> {
        self.performed.lock().clone()
    }

    pub fn tree_query_count(&self) -> usize {
        self.tree_queries.load(Ordering::SeqCst)
    }

    /// The last declaration received, if any.
    pub fn service_info(&self) -> Option<ServiceInfo> {
        *self.service_info.lock()
    }
}

impl AccessibilityHost for SimulatedHost {
    fn api_level(&self) -> u32 {
        self.api_level.load(Ordering::SeqCst)
    }

    fn set_service_info(&self, info: &ServiceInfo) {
        debug!(target: "axbridge::host", ?info, "service info declared");
        *self.service_info.lock() = Some(*info);
    }

    fn root_in_active_window(&self) -> Option<UiNode> {
        self.tree_queries.fetch_add(1, Ordering::SeqCst);
        self.root.read().clone()
    }

    fn perform_action(&self, target: &UiElementRef, action: &NodeAction) -> bool {
        let Some(id) = target.identifier.as_deref() else {
            return false;
        };
        let mut root = self.root.write();
        let Some(root) = root.as_mut() else {
            debug!(target: "axbridge::host", id, "no active window for node action");
            return false;
        };
        let Some(node) = first_with_id_mut(root, id) else {
            debug!(target: "axbridge::host", id, "node action target not in tree");
            return false;
        };
        match action {
            NodeAction::SetText { text } => node.text = Some(text.clone()),
            NodeAction::Focus => {
                let mut first = true;
                for_each_mut(root, &mut |n| {
                    n.focused = first && n.view_id.as_deref() == Some(id);
                    first &= !n.focused;
                });
            }
            NodeAction::Click
            | NodeAction::LongClick
            | NodeAction::ScrollForward
            | NodeAction::ScrollBackward => {}
        }
        trace!(target: "axbridge::host", id, ?action, "node action performed");
        self.performed.lock().push((id.to_string(), action.clone()));
        true
    }

    fn dispatch_gesture(&self, path: &GesturePath, reply: DispatchReply) -> bool {
        let policy = *self.policy.read();
        trace!(target: "axbridge::host", ?policy, points = path.points().len(), "dispatch_gesture");
        if policy == DispatchPolicy::Refuse {
            return false;
        }
        self.dispatched.lock().push(path.clone());

        match policy {
            DispatchPolicy::Accept => reply.completed(),
            DispatchPolicy::Reject => reply.cancelled(),
            DispatchPolicy::Silent => self.parked.lock().push(reply),
            DispatchPolicy::AcceptAfter { delay_ms } => {
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                            reply.completed();
                        });
                    }
                    Err(_) => {
                        warn!(
                            target: "axbridge::host",
                            "no async runtime for delayed completion; completing now"
                        );
                        reply.completed();
                    }
                }
            }
            DispatchPolicy::Refuse => {}
        }
        true
    }
}

fn first_with_id_mut<'a>(node: &'a mut UiNode, id: &str) -> Option<&'a mut UiNode> {
    if node.view_id.as_deref() == Some(id) {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|child| first_with_id_mut(child, id))
}

fn for_each_mut(node: &mut UiNode, f: &mut impl FnMut(&mut UiNode)) {
    f(node);
    for child in &mut node.children {
        for_each_mut(child, f);
    }
}
