//! Action execution.
//!
//! Each request moves through `Received -> Validated -> Dispatched ->
//! Completed | Failed`. Validation settles everything that can be known
//! without the OS: native readiness, capability gating and request
//! parameters. Only then is the OS touched, and always through the shared
//! access gate, so lookups and gesture dispatches never overlap with each
//! other or with event delivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::action::{ActionRequest, ActionResult, NodeAction, Payload, reason};
use super::capability::Capabilities;
use super::error::GestureError;
use super::gesture::{self, GesturePath};
use super::locator::{self, Lookup};
use crate::config::GestureSettings;
use crate::platform::{AccessibilityHost, DecisionEngine, DispatchOutcome, DispatchReply};

/// Per-request phase, reported in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Validated,
    Dispatched,
    Completed,
    Failed,
}

/// What the executor needs to know about the bridge when a request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecContext {
    pub capabilities: Capabilities,
    pub native_ready: bool,
}

/// A request that passed validation and is ready for the OS.
enum Validated {
    Gesture(GesturePath),
    FindByText(String),
    FindById(String),
    TraverseUi,
    CurrentFocus,
    PerformAction(String, NodeAction),
    CaptureScreen,
}

pub struct ActionExecutor {
    host: Arc<dyn AccessibilityHost>,
    engine: Arc<dyn DecisionEngine>,
    settings: GestureSettings,
    gate: Arc<Mutex<()>>,
}

impl ActionExecutor {
    /// `gate` is the single access point for OS-facing calls; share it with
    /// whatever delivers events.
    pub fn new(
        host: Arc<dyn AccessibilityHost>,
        engine: Arc<dyn DecisionEngine>,
        settings: GestureSettings,
        gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            host,
            engine,
            settings,
            gate,
        }
    }

    pub async fn execute(&self, ctx: ExecContext, request: ActionRequest) -> ActionResult {
        let name = request.name();
        phase(name, Phase::Received);

        let validated = match self.validate(ctx, request) {
            Ok(v) => v,
            Err(result) => {
                debug!(target: "axbridge::executor", action = name, ?result, "rejected before dispatch");
                phase(name, Phase::Failed);
                return result;
            }
        };
        phase(name, Phase::Validated);

        let result = self.dispatch(name, ctx.capabilities, validated).await;
        phase(
            name,
            if matches!(result, ActionResult::Failed(_)) {
                Phase::Failed
            } else {
                Phase::Completed
            },
        );
        result
    }

    fn validate(&self, ctx: ExecContext, request: ActionRequest) -> Result<Validated, ActionResult> {
        if !ctx.native_ready {
            return Err(ActionResult::failed(reason::NATIVE_UNINITIALIZED));
        }
        let caps = ctx.capabilities;
        let gesture_gate = || {
            if caps.gesture_dispatch {
                Ok(())
            } else {
                Err(ActionResult::Unsupported)
            }
        };
        let invalid = |e: GestureError| ActionResult::InvalidParameter(e.to_string());

        match request {
            ActionRequest::Tap { x, y } => {
                gesture_gate()?;
                Ok(Validated::Gesture(gesture::build_press(
                    x,
                    y,
                    self.settings.tap_duration_ms,
                )))
            }
            ActionRequest::Swipe {
                x0,
                y0,
                x1,
                y1,
                duration_ms,
            } => {
                gesture_gate()?;
                let duration = duration_ms.unwrap_or_else(|| to_i64(self.settings.swipe_duration_ms));
                gesture::build_swipe(x0, y0, x1, y1, duration)
                    .map(Validated::Gesture)
                    .map_err(invalid)
            }
            ActionRequest::LongPress { x, y, duration_ms } => {
                gesture_gate()?;
                let duration =
                    duration_ms.unwrap_or_else(|| to_i64(self.settings.long_press_duration_ms));
                gesture::build_long_press(x, y, duration)
                    .map(Validated::Gesture)
                    .map_err(invalid)
            }
            ActionRequest::FindByText { text } => {
                if text.is_empty() {
                    return Err(ActionResult::InvalidParameter("search text is empty".into()));
                }
                Ok(Validated::FindByText(text))
            }
            ActionRequest::FindById { identifier } => {
                if !caps.find_by_id {
                    return Err(ActionResult::Unsupported);
                }
                if identifier.is_empty() {
                    return Err(ActionResult::InvalidParameter("identifier is empty".into()));
                }
                Ok(Validated::FindById(identifier))
            }
            ActionRequest::TraverseUi => Ok(Validated::TraverseUi),
            ActionRequest::GetCurrentFocus => Ok(Validated::CurrentFocus),
            ActionRequest::PerformAction { identifier, action } => {
                if !caps.find_by_id {
                    return Err(ActionResult::Unsupported);
                }
                if matches!(action, NodeAction::SetText { .. }) && !caps.set_text {
                    return Err(ActionResult::Unsupported);
                }
                if identifier.is_empty() {
                    return Err(ActionResult::InvalidParameter("identifier is empty".into()));
                }
                Ok(Validated::PerformAction(identifier, action))
            }
            ActionRequest::CaptureScreen => Ok(Validated::CaptureScreen),
        }
    }

    async fn dispatch(
        &self,
        name: &'static str,
        caps: Capabilities,
        validated: Validated,
    ) -> ActionResult {
        match validated {
            Validated::Gesture(path) => {
                let _os = self.gate.lock().await;
                phase(name, Phase::Dispatched);
                self.dispatch_gesture(&path).await
            }
            Validated::FindByText(text) => {
                let _os = self.gate.lock().await;
                phase(name, Phase::Dispatched);
                let root = self.host.root_in_active_window();
                lookup_result(locator::find_by_text(root.as_ref(), &text))
            }
            Validated::FindById(identifier) => {
                let _os = self.gate.lock().await;
                phase(name, Phase::Dispatched);
                let root = self.host.root_in_active_window();
                lookup_result(locator::find_by_id(&caps, root.as_ref(), &identifier))
            }
            Validated::TraverseUi => {
                let _os = self.gate.lock().await;
                phase(name, Phase::Dispatched);
                match self.host.root_in_active_window() {
                    Some(root) => ActionResult::Ok(Some(Payload::Tree(root))),
                    None => ActionResult::NotFound,
                }
            }
            Validated::CurrentFocus => {
                let _os = self.gate.lock().await;
                phase(name, Phase::Dispatched);
                let root = self.host.root_in_active_window();
                lookup_result(locator::find_focused(root.as_ref()))
            }
            Validated::PerformAction(identifier, action) => {
                let _os = self.gate.lock().await;
                phase(name, Phase::Dispatched);
                let root = self.host.root_in_active_window();
                match locator::find_by_id(&caps, root.as_ref(), &identifier) {
                    Lookup::Found(el) => {
                        if self.host.perform_action(&el, &action) {
                            ActionResult::Ok(Some(Payload::Element(el)))
                        } else {
                            warn!(
                                target: "axbridge::executor",
                                %identifier, ?action,
                                "node action refused"
                            );
                            ActionResult::failed(reason::ACTION_REJECTED)
                        }
                    }
                    other => lookup_result(other),
                }
            }
            Validated::CaptureScreen => {
                phase(name, Phase::Dispatched);
                ActionResult::Ok(self.engine.capture_screen().map(Payload::Screen))
            }
        }
    }

    /// Submit and wait for the OS verdict. Caller holds the gate.
    ///
    /// The host reports once the gesture has played out, so the wait covers
    /// the gesture's own duration plus the dispatch timeout.
    async fn dispatch_gesture(&self, path: &GesturePath) -> ActionResult {
        let wait = Duration::from_millis(path.duration_ms()) + self.settings.dispatch_timeout();
        let (reply, outcome) = DispatchReply::channel();
        if !self.host.dispatch_gesture(path, reply) {
            warn!(target: "axbridge::executor", "gesture submission refused");
            return ActionResult::failed(reason::DISPATCH_REJECTED);
        }

        match timeout(wait, outcome).await {
            Ok(Ok(DispatchOutcome::Completed)) => ActionResult::Ok(None),
            Ok(Ok(DispatchOutcome::Cancelled)) => {
                warn!(target: "axbridge::executor", "gesture cancelled by the OS");
                ActionResult::failed(reason::DISPATCH_REJECTED)
            }
            Ok(Err(_)) => {
                warn!(target: "axbridge::executor", "gesture callback dropped without an outcome");
                ActionResult::failed(reason::DISPATCH_ABANDONED)
            }
            Err(_) => {
                warn!(
                    target: "axbridge::executor",
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "no gesture outcome before timeout"
                );
                ActionResult::failed(reason::DISPATCH_TIMEOUT)
            }
        }
    }
}

fn lookup_result(lookup: Lookup) -> ActionResult {
    match lookup {
        Lookup::Found(el) => ActionResult::Ok(Some(Payload::Element(el))),
        Lookup::NotFound => ActionResult::NotFound,
        Lookup::Unsupported => ActionResult::Unsupported,
    }
}

fn phase(action: &'static str, phase: Phase) {
    trace!(target: "axbridge::executor", action, ?phase, "request phase");
}

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ScreenSnapshot, UiNode};
    use crate::platform::{DispatchPolicy, LoggingEngine, SimulatedHost};

    fn executor(host: Arc<SimulatedHost>) -> ActionExecutor {
        ActionExecutor::new(
            host,
            Arc::new(LoggingEngine::new(true, None)),
            GestureSettings::default(),
            Arc::new(Mutex::new(())),
        )
    }

    fn ready(level: u32) -> ExecContext {
        ExecContext {
            capabilities: Capabilities::for_api_level(level),
            native_ready: true,
        }
    }

    #[tokio::test]
    async fn native_not_ready_fails_everything_without_touching_the_host() {
        let host = Arc::new(SimulatedHost::new(30).with_root(UiNode::default()));
        let exec = executor(host.clone());
        let ctx = ExecContext {
            native_ready: false,
            ..ready(30)
        };
        for req in [
            ActionRequest::Tap { x: 10, y: 10 },
            ActionRequest::FindByText { text: "a".into() },
            ActionRequest::CaptureScreen,
        ] {
            assert_eq!(
                exec.execute(ctx, req).await,
                ActionResult::failed(reason::NATIVE_UNINITIALIZED)
            );
        }
        assert_eq!(host.dispatch_count(), 0);
        assert_eq!(host.tree_query_count(), 0);
    }

    #[tokio::test]
    async fn gestures_below_min_level_are_unsupported() {
        let host = Arc::new(SimulatedHost::new(21));
        let exec = executor(host.clone());
        let res = exec
            .execute(ready(21), ActionRequest::Tap { x: 1, y: 1 })
            .await;
        assert_eq!(res, ActionResult::Unsupported);
        assert_eq!(host.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn swipe_uses_configured_default_duration() {
        let host = Arc::new(SimulatedHost::new(30));
        let exec = executor(host.clone());
        let res = exec
            .execute(
                ready(30),
                ActionRequest::Swipe {
                    x0: 0,
                    y0: 0,
                    x1: 10,
                    y1: 10,
                    duration_ms: None,
                },
            )
            .await;
        assert!(res.is_ok());
        assert_eq!(host.dispatched()[0].duration_ms(), 500);
    }

    #[tokio::test]
    async fn bad_swipe_duration_is_invalid_parameter() {
        let host = Arc::new(SimulatedHost::new(30));
        let exec = executor(host.clone());
        let res = exec
            .execute(
                ready(30),
                ActionRequest::Swipe {
                    x0: 0,
                    y0: 0,
                    x1: 10,
                    y1: 10,
                    duration_ms: Some(0),
                },
            )
            .await;
        assert!(matches!(res, ActionResult::InvalidParameter(_)));
        assert_eq!(host.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_outcomes_map_to_results() {
        let host = Arc::new(SimulatedHost::new(30));
        let exec = executor(host.clone());
        let tap = || ActionRequest::Tap { x: 5, y: 5 };

        assert_eq!(exec.execute(ready(30), tap()).await, ActionResult::Ok(None));

        host.set_policy(DispatchPolicy::Reject);
        assert_eq!(
            exec.execute(ready(30), tap()).await,
            ActionResult::failed(reason::DISPATCH_REJECTED)
        );

        host.set_policy(DispatchPolicy::Refuse);
        assert_eq!(
            exec.execute(ready(30), tap()).await,
            ActionResult::failed(reason::DISPATCH_REJECTED)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_times_out() {
        let host = Arc::new(SimulatedHost::new(30).with_policy(DispatchPolicy::Silent));
        let exec = executor(host.clone());
        let res = exec.execute(ready(30), ActionRequest::Tap { x: 5, y: 5 }).await;
        assert_eq!(res, ActionResult::failed(reason::DISPATCH_TIMEOUT));
    }

    #[tokio::test(start_paused = true)]
    async fn long_gesture_gets_its_duration_on_top_of_the_timeout() {
        let host = Arc::new(
            SimulatedHost::new(30).with_policy(DispatchPolicy::AcceptAfter { delay_ms: 2500 }),
        );
        let exec = executor(host);
        let res = exec
            .execute(
                ready(30),
                ActionRequest::LongPress {
                    x: 5,
                    y: 5,
                    duration_ms: Some(2000),
                },
            )
            .await;
        assert_eq!(res, ActionResult::Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn late_acceptance_within_timeout_is_ok() {
        let host = Arc::new(
            SimulatedHost::new(30).with_policy(DispatchPolicy::AcceptAfter { delay_ms: 900 }),
        );
        let exec = executor(host);
        let res = exec.execute(ready(30), ActionRequest::Tap { x: 5, y: 5 }).await;
        assert_eq!(res, ActionResult::Ok(None));
    }

    #[tokio::test]
    async fn find_by_id_is_gated_and_validated() {
        let host = Arc::new(SimulatedHost::new(17).with_root(UiNode::default()));
        let exec = executor(host.clone());
        let req = || ActionRequest::FindById {
            identifier: "app:id/x".into(),
        };
        assert_eq!(exec.execute(ready(17), req()).await, ActionResult::Unsupported);
        assert_eq!(host.tree_query_count(), 0);
        assert_eq!(exec.execute(ready(30), req()).await, ActionResult::NotFound);
        assert!(matches!(
            exec.execute(
                ready(30),
                ActionRequest::FindById {
                    identifier: String::new()
                }
            )
            .await,
            ActionResult::InvalidParameter(_)
        ));
    }

    fn form() -> UiNode {
        serde_json::from_value(serde_json::json!({
            "children": [
                {"view_id": "app:id/query", "text": "old", "focused": true},
                {"view_id": "app:id/go", "text": "Go"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn traverse_and_focus_read_the_snapshot() {
        let host = Arc::new(SimulatedHost::new(16));
        let exec = executor(host.clone());
        assert_eq!(
            exec.execute(ready(16), ActionRequest::TraverseUi).await,
            ActionResult::NotFound
        );
        assert_eq!(
            exec.execute(ready(16), ActionRequest::GetCurrentFocus).await,
            ActionResult::NotFound
        );

        host.set_root(Some(form()));
        let res = exec.execute(ready(16), ActionRequest::TraverseUi).await;
        assert_eq!(res.tree(), Some(&form()));
        let res = exec.execute(ready(16), ActionRequest::GetCurrentFocus).await;
        assert_eq!(res.element().unwrap().identifier.as_deref(), Some("app:id/query"));
        assert_eq!(host.tree_query_count(), 4);
    }

    #[tokio::test]
    async fn perform_action_is_gated_located_and_reported() {
        let host = Arc::new(SimulatedHost::new(30).with_root(form()));
        let exec = executor(host.clone());
        let act = |identifier: &str, action: NodeAction| ActionRequest::PerformAction {
            identifier: identifier.into(),
            action,
        };
        let set_text = || NodeAction::SetText { text: "new".into() };

        assert_eq!(
            exec.execute(ready(17), act("app:id/go", NodeAction::Click)).await,
            ActionResult::Unsupported
        );
        assert_eq!(
            exec.execute(ready(19), act("app:id/query", set_text())).await,
            ActionResult::Unsupported
        );
        assert_eq!(host.tree_query_count(), 0);

        let res = exec.execute(ready(30), act("app:id/query", set_text())).await;
        assert_eq!(res.element().unwrap().identifier.as_deref(), Some("app:id/query"));
        assert_eq!(
            host.root_in_active_window().unwrap().children[0].text.as_deref(),
            Some("new")
        );

        assert_eq!(
            exec.execute(ready(30), act("app:id/nope", NodeAction::Click)).await,
            ActionResult::NotFound
        );
        assert!(matches!(
            exec.execute(ready(30), act("", NodeAction::Click)).await,
            ActionResult::InvalidParameter(_)
        ));
        assert_eq!(host.performed().len(), 1);
    }

    /// A window whose nodes ignore every action.
    struct ReadOnlyHost(UiNode);

    impl AccessibilityHost for ReadOnlyHost {
        fn api_level(&self) -> u32 {
            30
        }
        fn set_service_info(&self, _: &crate::bridge::ServiceInfo) {}
        fn root_in_active_window(&self) -> Option<UiNode> {
            Some(self.0.clone())
        }
        fn perform_action(&self, _: &crate::bridge::UiElementRef, _: &NodeAction) -> bool {
            false
        }
        fn dispatch_gesture(&self, _: &GesturePath, _: DispatchReply) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn refused_node_action_fails() {
        let exec = ActionExecutor::new(
            Arc::new(ReadOnlyHost(form())),
            Arc::new(LoggingEngine::new(true, None)),
            GestureSettings::default(),
            Arc::new(Mutex::new(())),
        );
        let res = exec
            .execute(
                ready(30),
                ActionRequest::PerformAction {
                    identifier: "app:id/go".into(),
                    action: NodeAction::Click,
                },
            )
            .await;
        assert_eq!(res, ActionResult::failed(reason::ACTION_REJECTED));
    }

    #[tokio::test]
    async fn capture_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.bin");
        std::fs::write(&path, b"opaque").unwrap();
        let exec = ActionExecutor::new(
            Arc::new(SimulatedHost::new(30)),
            Arc::new(LoggingEngine::new(true, Some(path))),
            GestureSettings::default(),
            Arc::new(Mutex::new(())),
        );
        let res = exec.execute(ready(30), ActionRequest::CaptureScreen).await;
        assert_eq!(
            res,
            ActionResult::Ok(Some(Payload::Screen(ScreenSnapshot(b"opaque".to_vec()))))
        );
    }
}
