/*!
Boundaries the bridge consumes.

- [`AccessibilityHost`]: the OS accessibility subsystem (tree queries, node
  actions, gesture dispatch, service declaration).
- [`DecisionEngine`]: the native decision engine (initialization, handle
  registration, screen capture, event intake).

Concrete implementations:
- `simulated.rs` -> `SimulatedHost` (in-memory tree and scripted dispatch outcomes)
- `desktop.rs`   -> `DesktopHost`   (replays gestures on the desktop pointer via enigo)
- `engine.rs`    -> `LoggingEngine` (logs and counts events; used by the CLI)
*/

use tokio::sync::oneshot;

use crate::bridge::{
    ActionHandle, GesturePath, NodeAction, ScreenSnapshot, ServiceInfo, UiElementRef, UiEvent,
    UiNode,
};

pub mod desktop;
pub mod engine;
pub mod simulated;

pub use desktop::DesktopHost;
pub use engine::LoggingEngine;
pub use simulated::{DispatchPolicy, SimulatedHost};

/// The OS accessibility subsystem as seen by the bridge.
///
/// The bridge serializes every call it makes here; implementations do not
/// need to handle concurrent calls coming from one bridge.
pub trait AccessibilityHost: Send + Sync {
    /// Platform API level, read once per activation.
    fn api_level(&self) -> u32;

    /// Declare which events, feedback mode and features the service wants.
    fn set_service_info(&self, info: &ServiceInfo);

    /// Snapshot of the active window's tree, or `None` with no active window.
    fn root_in_active_window(&self) -> Option<UiNode>;

    /// Run `action` on the node `target` was located from. Returns whether the
    /// OS performed it.
    fn perform_action(&self, target: &UiElementRef, action: &NodeAction) -> bool;

    /// Submit a gesture for injection.
    ///
    /// Returns `false` if the submission is refused outright. Otherwise the
    /// outcome arrives later, from any thread, through `reply`.
    fn dispatch_gesture(&self, path: &GesturePath, reply: DispatchReply) -> bool;
}

/// The native decision engine.
pub trait DecisionEngine: Send + Sync {
    /// Bring the native side up. `false` leaves the bridge observation-only.
    fn initialize(&self) -> bool;

    /// Hand the engine the handle it drives the UI through.
    fn register_ui_control_handle(&self, handle: ActionHandle);

    /// Capture the screen. The payload is opaque to the bridge.
    fn capture_screen(&self) -> Option<ScreenSnapshot>;

    /// Receive a translated UI event, in delivery order.
    fn on_ui_event(&self, event: &UiEvent);
}

/// Final state of a dispatched gesture as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The OS accepted and performed the gesture.
    Completed,
    /// The OS rejected or aborted the gesture.
    Cancelled,
}

/// One-shot completion callback for a dispatched gesture.
///
/// Dropping it without reporting counts as an abandoned dispatch.
#[derive(Debug)]
pub struct DispatchReply {
    tx: oneshot::Sender<DispatchOutcome>,
}

impl DispatchReply {
    pub fn channel() -> (Self, oneshot::Receiver<DispatchOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn report(self, outcome: DispatchOutcome) {
        // The waiting side may already have timed out.
        let _ = self.tx.send(outcome);
    }

    pub fn completed(self) {
        self.report(DispatchOutcome::Completed);
    }

    pub fn cancelled(self) {
        self.report(DispatchOutcome::Cancelled);
    }
}
