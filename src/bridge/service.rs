//! Bridge service: lifecycle, event pump and the handle given to the
//! decision engine.
//!
//! Lifecycle:
//!
//! ```text
//! Unregistered -> Connected -> Active <-> Interrupted
//!                                 \          /
//!                                Disconnected -> (next activation) Connected
//! ```
//!
//! Only the lifecycle signals below write [`BridgeState`]. Action handling
//! takes a read lock, copies what it needs and releases it before touching
//! the OS.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex as SyncMutex, RwLock, const_mutex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::action::{ActionRequest, ActionResult, NodeAction, reason};
use super::capability::{Capabilities, ServiceInfo};
use super::error::BridgeError;
use super::event::{RawEvent, UiEvent, translate};
use super::executor::{ActionExecutor, ExecContext};
use crate::config::{Config, GestureSettings};
use crate::platform::{AccessibilityHost, DecisionEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unregistered,
    Connected,
    Active,
    Interrupted,
    Disconnected,
}

/// Process-wide bridge state. Written only by lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeState {
    pub lifecycle: LifecycleState,
    pub capabilities: Capabilities,
    /// Recorded once per activation; never retried per call.
    pub native_ready: bool,
    /// Incremented on every activation; handles carry the value they were issued with.
    pub generation: u64,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleState::Unregistered,
            capabilities: Capabilities::none(),
            native_ready: false,
            generation: 0,
        }
    }
}

/// Serializable status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct BridgeStatus {
    pub lifecycle: LifecycleState,
    pub native_ready: bool,
    pub capabilities: Capabilities,
    pub generation: u64,
    pub events_forwarded: u64,
}

struct Shared {
    host: Arc<dyn AccessibilityHost>,
    engine: Arc<dyn DecisionEngine>,
    service_info: ServiceInfo,
    executor: ActionExecutor,
    gate: Arc<Mutex<()>>,
    state: RwLock<BridgeState>,
    events_forwarded: AtomicU64,
}

/// The bridge between the accessibility host and the decision engine.
///
/// Cloning is cheap and yields another reference to the same bridge.
#[derive(Clone)]
pub struct BridgeService {
    shared: Arc<Shared>,
}

impl BridgeService {
    pub fn new(
        host: Arc<dyn AccessibilityHost>,
        engine: Arc<dyn DecisionEngine>,
        service_info: ServiceInfo,
        gestures: GestureSettings,
    ) -> Self {
        let gate = Arc::new(Mutex::new(()));
        let executor = ActionExecutor::new(host.clone(), engine.clone(), gestures, gate.clone());
        Self {
            shared: Arc::new(Shared {
                host,
                engine,
                service_info,
                executor,
                gate,
                state: RwLock::new(BridgeState::default()),
                events_forwarded: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(
        host: Arc<dyn AccessibilityHost>,
        engine: Arc<dyn DecisionEngine>,
        cfg: &Config,
    ) -> Self {
        Self::new(host, engine, cfg.service, cfg.gestures)
    }

    /// OS-triggered activation.
    ///
    /// In order: initialize the native engine and record the outcome, register
    /// the UI-control handle with it, then declare the service to the OS. A
    /// failed native init leaves the bridge active but degraded: events still
    /// flow, actions fail with `native-uninitialized`.
    pub async fn on_service_connected(&self) -> Result<(), BridgeError> {
        let shared = &self.shared;
        let capabilities = Capabilities::for_api_level(shared.host.api_level());
        let generation = {
            let mut st = shared.state.write();
            match st.lifecycle {
                LifecycleState::Unregistered | LifecycleState::Disconnected => {}
                from => {
                    return Err(BridgeError::InvalidTransition {
                        from,
                        signal: "connect",
                    });
                }
            }
            st.generation += 1;
            *st = BridgeState {
                lifecycle: LifecycleState::Connected,
                capabilities,
                native_ready: false,
                generation: st.generation,
            };
            st.generation
        };
        info!(
            target: "axbridge::service",
            generation, api_level = capabilities.api_level,
            "service connected"
        );

        let native_ready = shared.engine.initialize();
        if native_ready {
            info!(target: "axbridge::service", "native engine initialized");
        } else {
            warn!(
                target: "axbridge::service",
                "native engine failed to initialize; actions disabled, events still forwarded"
            );
        }
        {
            let mut st = shared.state.write();
            if st.generation == generation && st.lifecycle == LifecycleState::Connected {
                st.native_ready = native_ready;
            }
        }

        shared.engine.register_ui_control_handle(ActionHandle {
            shared: Arc::downgrade(shared),
            generation,
        });

        if capabilities.service_info {
            let _os = shared.gate.lock().await;
            shared.host.set_service_info(&shared.service_info);
        } else {
            warn!(
                target: "axbridge::service",
                api_level = capabilities.api_level,
                "platform cannot take a service declaration; keeping OS defaults"
            );
        }

        {
            let mut st = shared.state.write();
            if st.generation != generation || st.lifecycle != LifecycleState::Connected {
                warn!(
                    target: "axbridge::service",
                    generation, lifecycle = ?st.lifecycle,
                    "activation superseded before it completed"
                );
                return Ok(());
            }
            st.lifecycle = LifecycleState::Active;
        }
        info!(target: "axbridge::service", generation, native_ready, "service active");
        Ok(())
    }

    /// OS asked the service to pause. Registration is kept.
    pub fn on_interrupt(&self) -> Result<(), BridgeError> {
        let mut st = self.shared.state.write();
        match st.lifecycle {
            LifecycleState::Active => {
                st.lifecycle = LifecycleState::Interrupted;
                info!(target: "axbridge::service", "service interrupted");
                Ok(())
            }
            LifecycleState::Interrupted => Ok(()),
            from => Err(BridgeError::InvalidTransition {
                from,
                signal: "interrupt",
            }),
        }
    }

    /// Back from an interruption, without re-registration.
    pub fn on_resume(&self) -> Result<(), BridgeError> {
        let mut st = self.shared.state.write();
        match st.lifecycle {
            LifecycleState::Interrupted => {
                st.lifecycle = LifecycleState::Active;
                info!(target: "axbridge::service", "service resumed");
                Ok(())
            }
            LifecycleState::Active => Ok(()),
            from => Err(BridgeError::InvalidTransition {
                from,
                signal: "resume",
            }),
        }
    }

    /// OS tore the service down. Outstanding handles are revoked; the next
    /// activation registers from scratch.
    pub fn on_disconnect(&self) {
        let mut st = self.shared.state.write();
        if matches!(
            st.lifecycle,
            LifecycleState::Unregistered | LifecycleState::Disconnected
        ) {
            debug!(target: "axbridge::service", lifecycle = ?st.lifecycle, "disconnect ignored");
            return;
        }
        *st = BridgeState {
            lifecycle: LifecycleState::Disconnected,
            generation: st.generation,
            ..BridgeState::default()
        };
        info!(target: "axbridge::service", generation = st.generation, "service disconnected");
    }

    /// Translate one OS event and hand it to the decision engine.
    ///
    /// Callers deliver events one at a time in OS order; the shared gate keeps
    /// them from interleaving with OS-facing action calls. Events are
    /// forwarded in every lifecycle state, degraded or not.
    pub async fn on_accessibility_event(&self, raw: &RawEvent) -> UiEvent {
        let shared = &self.shared;
        let _os = shared.gate.lock().await;
        let event = translate(raw);

        let lifecycle = shared.state.read().lifecycle;
        if matches!(
            lifecycle,
            LifecycleState::Unregistered | LifecycleState::Disconnected
        ) {
            warn!(
                target: "axbridge::events",
                ?lifecycle,
                "event outside an activation; forwarding anyway"
            );
        }
        debug!(
            target: "axbridge::events",
            kind = ?event.kind,
            text = event.text.as_deref().unwrap_or(""),
            "forwarding event"
        );
        shared.engine.on_ui_event(&event);
        shared.events_forwarded.fetch_add(1, Ordering::SeqCst);
        event
    }

    /// A handle bound to the current activation.
    pub fn handle(&self) -> ActionHandle {
        ActionHandle {
            shared: Arc::downgrade(&self.shared),
            generation: self.shared.state.read().generation,
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.shared.state.read()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.shared.state.read().lifecycle
    }

    pub fn status(&self) -> BridgeStatus {
        let st = self.state();
        BridgeStatus {
            lifecycle: st.lifecycle,
            native_ready: st.native_ready,
            capabilities: st.capabilities,
            generation: st.generation,
            events_forwarded: self.shared.events_forwarded.load(Ordering::SeqCst),
        }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeService")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// The action API handed to the decision engine.
///
/// Holds the bridge weakly and remembers the activation it was issued for:
/// after a disconnect every call reports `handle-revoked`, and once the bridge
/// is dropped, `bridge-gone`.
#[derive(Clone)]
pub struct ActionHandle {
    shared: Weak<Shared>,
    generation: u64,
}

impl ActionHandle {
    pub async fn execute(&self, request: ActionRequest) -> ActionResult {
        let Some(shared) = self.shared.upgrade() else {
            return ActionResult::failed(reason::BRIDGE_GONE);
        };
        let ctx = {
            let st = shared.state.read();
            if st.generation != self.generation
                || matches!(
                    st.lifecycle,
                    LifecycleState::Unregistered | LifecycleState::Disconnected
                )
            {
                return ActionResult::failed(reason::HANDLE_REVOKED);
            }
            if st.lifecycle != LifecycleState::Active {
                return ActionResult::failed(reason::BRIDGE_INACTIVE);
            }
            ExecContext {
                capabilities: st.capabilities,
                native_ready: st.native_ready,
            }
        };
        shared.executor.execute(ctx, request).await
    }

    pub async fn tap(&self, x: i32, y: i32) -> ActionResult {
        self.execute(ActionRequest::Tap { x, y }).await
    }

    /// Swipe with the configured default duration.
    pub async fn swipe(&self, x0: i32, y0: i32, x1: i32, y1: i32) -> ActionResult {
        self.execute(ActionRequest::Swipe {
            x0,
            y0,
            x1,
            y1,
            duration_ms: None,
        })
        .await
    }

    pub async fn swipe_with_duration(
        &self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        duration_ms: i64,
    ) -> ActionResult {
        self.execute(ActionRequest::Swipe {
            x0,
            y0,
            x1,
            y1,
            duration_ms: Some(duration_ms),
        })
        .await
    }

    pub async fn long_press(&self, x: i32, y: i32, duration_ms: i64) -> ActionResult {
        self.execute(ActionRequest::LongPress {
            x,
            y,
            duration_ms: Some(duration_ms),
        })
        .await
    }

    /// First element (document order) whose text contains `text`.
    pub async fn find_by_text(&self, text: &str) -> ActionResult {
        self.execute(ActionRequest::FindByText {
            text: text.to_string(),
        })
        .await
    }

    /// First element (document order) with the given view id.
    pub async fn find_by_id(&self, identifier: &str) -> ActionResult {
        self.execute(ActionRequest::FindById {
            identifier: identifier.to_string(),
        })
        .await
    }

    /// Snapshot of the active window's whole tree.
    pub async fn traverse_ui(&self) -> ActionResult {
        self.execute(ActionRequest::TraverseUi).await
    }

    pub async fn current_focus(&self) -> ActionResult {
        self.execute(ActionRequest::GetCurrentFocus).await
    }

    /// Run `action` on the first element (document order) with the given view id.
    pub async fn perform_action(&self, identifier: &str, action: NodeAction) -> ActionResult {
        self.execute(ActionRequest::PerformAction {
            identifier: identifier.to_string(),
            action,
        })
        .await
    }

    pub async fn capture_screen(&self) -> ActionResult {
        self.execute(ActionRequest::CaptureScreen).await
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle")
            .field("generation", &self.generation)
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

static ACTIVE: SyncMutex<Option<BridgeService>> = const_mutex(None);

/// Make `service` the process-wide bridge. Fails if another one is installed.
pub fn install(service: &BridgeService) -> Result<(), BridgeError> {
    let mut slot = ACTIVE.lock();
    match slot.as_ref() {
        Some(current) if current.ptr_eq(service) => Ok(()),
        Some(_) => Err(BridgeError::AlreadyActive),
        None => {
            *slot = Some(service.clone());
            Ok(())
        }
    }
}

/// The process-wide bridge, if one is installed.
pub fn active() -> Option<BridgeService> {
    ACTIVE.lock().clone()
}

/// Remove the process-wide bridge and return it.
pub fn uninstall() -> Option<BridgeService> {
    ACTIVE.lock().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::event::TYPE_WINDOW_CONTENT_CHANGED;
    use crate::platform::{LoggingEngine, SimulatedHost};

    fn service(level: u32, init_ok: bool) -> (BridgeService, Arc<SimulatedHost>, Arc<LoggingEngine>) {
        let host = Arc::new(SimulatedHost::new(level));
        let engine = Arc::new(LoggingEngine::new(init_ok, None));
        let svc = BridgeService::new(
            host.clone(),
            engine.clone(),
            ServiceInfo::default(),
            GestureSettings::default(),
        );
        (svc, host, engine)
    }

    #[tokio::test]
    async fn activation_initializes_registers_and_declares() {
        let (svc, host, engine) = service(30, true);
        assert_eq!(svc.lifecycle(), LifecycleState::Unregistered);
        svc.on_service_connected().await.unwrap();

        assert_eq!(svc.lifecycle(), LifecycleState::Active);
        assert!(svc.state().native_ready);
        assert_eq!(engine.registrations(), 1);
        assert_eq!(host.service_info(), Some(ServiceInfo::default()));
        assert_eq!(engine.handle().unwrap().generation(), 1);
    }

    #[tokio::test]
    async fn old_platform_skips_declaration() {
        let (svc, host, _engine) = service(16, true);
        svc.on_service_connected().await.unwrap();
        assert_eq!(svc.lifecycle(), LifecycleState::Active);
        assert!(host.service_info().is_none());
    }

    #[tokio::test]
    async fn interrupt_and_resume_keep_registration() {
        let (svc, _host, engine) = service(30, true);
        svc.on_service_connected().await.unwrap();
        let handle = engine.handle().unwrap();

        svc.on_interrupt().unwrap();
        assert_eq!(svc.lifecycle(), LifecycleState::Interrupted);
        assert_eq!(handle.tap(1, 1).await, ActionResult::failed(reason::BRIDGE_INACTIVE));

        svc.on_resume().unwrap();
        assert_eq!(svc.lifecycle(), LifecycleState::Active);
        assert_eq!(engine.registrations(), 1);
        assert!(handle.tap(1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_revokes_handles_and_reconnect_re_registers() {
        let (svc, _host, engine) = service(30, true);
        svc.on_service_connected().await.unwrap();
        let old = engine.handle().unwrap();

        svc.on_disconnect();
        assert_eq!(svc.lifecycle(), LifecycleState::Disconnected);
        assert!(!svc.state().native_ready);
        assert_eq!(old.tap(1, 1).await, ActionResult::failed(reason::HANDLE_REVOKED));

        svc.on_service_connected().await.unwrap();
        assert_eq!(engine.registrations(), 2);
        assert_eq!(old.tap(1, 1).await, ActionResult::failed(reason::HANDLE_REVOKED));
        assert!(engine.handle().unwrap().tap(1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_during_activation_is_not_overwritten() {
        let (svc, host, engine) = service(30, true);
        let held = svc.shared.gate.clone().lock_owned().await;

        let connecting = tokio::spawn({
            let svc = svc.clone();
            async move { svc.on_service_connected().await }
        });
        // The activation runs up to the declaration, which waits on the gate.
        while svc.lifecycle() != LifecycleState::Connected {
            tokio::task::yield_now().await;
        }

        svc.on_disconnect();
        drop(held);
        connecting.await.unwrap().unwrap();

        assert_eq!(svc.lifecycle(), LifecycleState::Disconnected);
        assert!(!svc.state().native_ready);
        let stale = engine.handle().unwrap();
        assert_eq!(stale.tap(1, 1).await, ActionResult::failed(reason::HANDLE_REVOKED));
        assert_eq!(host.dispatch_count(), 0);

        svc.on_service_connected().await.unwrap();
        assert_eq!(svc.lifecycle(), LifecycleState::Active);
        assert!(engine.handle().unwrap().tap(1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn handle_reads_tree_and_acts_on_nodes() {
        let (svc, host, engine) = service(30, true);
        svc.on_service_connected().await.unwrap();
        let handle = engine.handle().unwrap();
        assert_eq!(handle.traverse_ui().await, ActionResult::NotFound);

        host.set_root(Some(crate::bridge::UiNode {
            children: vec![crate::bridge::UiNode {
                view_id: Some("app:id/field".into()),
                ..Default::default()
            }],
            ..Default::default()
        }));
        assert_eq!(handle.current_focus().await, ActionResult::NotFound);
        assert!(handle.perform_action("app:id/field", NodeAction::Focus).await.is_ok());
        let focused = handle.current_focus().await;
        assert_eq!(focused.element().unwrap().identifier.as_deref(), Some("app:id/field"));
        assert!(handle.traverse_ui().await.tree().unwrap().children[0].focused);
    }

    #[tokio::test]
    async fn invalid_transitions_are_reported() {
        let (svc, _host, _engine) = service(30, true);
        assert!(matches!(
            svc.on_interrupt(),
            Err(BridgeError::InvalidTransition { from: LifecycleState::Unregistered, .. })
        ));
        assert!(svc.on_resume().is_err());
        svc.on_service_connected().await.unwrap();
        assert!(matches!(
            svc.on_service_connected().await,
            Err(BridgeError::InvalidTransition { from: LifecycleState::Active, .. })
        ));
    }

    #[tokio::test]
    async fn dropped_bridge_reports_gone() {
        let (svc, _host, engine) = service(30, true);
        svc.on_service_connected().await.unwrap();
        let handle = engine.handle().unwrap();
        drop(svc);
        assert_eq!(handle.tap(1, 1).await, ActionResult::failed(reason::BRIDGE_GONE));
    }

    #[tokio::test]
    async fn events_are_counted_and_forwarded_even_when_degraded() {
        let (svc, _host, engine) = service(30, false);
        svc.on_service_connected().await.unwrap();
        svc.on_accessibility_event(&RawEvent::new(TYPE_WINDOW_CONTENT_CHANGED, vec![]))
            .await;
        assert_eq!(svc.status().events_forwarded, 1);
        assert_eq!(engine.events().len(), 1);
        assert!(!svc.status().native_ready);
    }

    #[test]
    fn only_one_bridge_can_be_installed() {
        let (a, _, _) = service(30, true);
        let (b, _, _) = service(30, true);
        install(&a).unwrap();
        install(&a).unwrap();
        assert_eq!(install(&b), Err(BridgeError::AlreadyActive));
        assert!(active().is_some_and(|s| s.ptr_eq(&a)));
        assert!(uninstall().is_some());
        install(&b).unwrap();
        assert!(uninstall().is_some_and(|s| s.ptr_eq(&b)));
        assert!(active().is_none());
    }
}
