//! Headless host session.
//!
//! Plays the role of the OS host runtime: takes host messages (lifecycle
//! signals, raw accessibility events, tree updates, action requests), applies
//! them to one [`BridgeService`] strictly in arrival order, and reports
//! action results as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use crate::bridge::event::now_ms;
use crate::bridge::{ActionHandle, ActionRequest, BridgeService, RawEvent, UiNode};
use crate::config::Config;
use crate::platform::{AccessibilityHost, DesktopHost, LoggingEngine, SimulatedHost};

/// One message from the host runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Connect,
    Interrupt,
    Resume,
    Disconnect,
    Event {
        event_type: i32,
        #[serde(default)]
        text: Vec<String>,
        /// Omitted means "now".
        #[serde(default)]
        event_time_ms: Option<u64>,
    },
    /// Replace the active window's tree (simulated host only).
    SetTree {
        #[serde(default)]
        root: Option<UiNode>,
    },
    /// Change the level reported at the next activation (simulated host only).
    SetApiLevel { api_level: u32 },
    Action { action: ActionRequest },
    Status,
}

/// Which host the session runs against.
pub enum HostKind {
    Simulated(Arc<SimulatedHost>),
    Desktop(Arc<DesktopHost>),
}

impl HostKind {
    fn as_host(&self) -> Arc<dyn AccessibilityHost> {
        match self {
            Self::Simulated(h) => h.clone(),
            Self::Desktop(h) => h.clone(),
        }
    }

    fn simulated(&self) -> Option<&SimulatedHost> {
        match self {
            Self::Simulated(h) => Some(h.as_ref()),
            Self::Desktop(_) => None,
        }
    }
}

pub struct Session {
    service: BridgeService,
    engine: Arc<LoggingEngine>,
    host: HostKind,
}

impl Session {
    /// Build a session on the simulated host described by `cfg.host`.
    pub fn simulated(cfg: &Config) -> Self {
        let mut host = SimulatedHost::new(cfg.host.api_level).with_policy(cfg.host.dispatch);
        if let Some(root) = cfg.host.root.clone() {
            host = host.with_root(root);
        }
        Self::with_host(cfg, HostKind::Simulated(Arc::new(host)))
    }

    /// Build a session that replays gestures on the desktop pointer.
    pub fn desktop(cfg: &Config, dry_run: bool) -> Result<Self> {
        let host = DesktopHost::new(cfg.host.api_level, dry_run)
            .context("Failed to start desktop host")?;
        Ok(Self::with_host(cfg, HostKind::Desktop(Arc::new(host))))
    }

    fn with_host(cfg: &Config, host: HostKind) -> Self {
        let engine = Arc::new(LoggingEngine::new(
            cfg.host.native_init,
            cfg.host.capture_file.as_ref().map(PathBuf::from),
        ));
        let service = BridgeService::from_config(host.as_host(), engine.clone(), cfg);
        Self {
            service,
            engine,
            host,
        }
    }

    pub fn service(&self) -> &BridgeService {
        &self.service
    }

    pub fn engine(&self) -> &LoggingEngine {
        &self.engine
    }

    /// Apply one raw JSON message. Returns the JSON line to report, if any.
    pub async fn run_message(&mut self, value: &Value) -> Result<Option<Value>> {
        let msg: HostMessage = serde_json::from_value(value.clone())
            .with_context(|| format!("Invalid host message: {value}"))?;
        self.apply(msg).await
    }

    pub async fn apply(&mut self, msg: HostMessage) -> Result<Option<Value>> {
        trace!(target: "axbridge::session", ?msg, "host message");
        match msg {
            HostMessage::Connect => {
                self.service.on_service_connected().await?;
                Ok(None)
            }
            HostMessage::Interrupt => {
                self.service.on_interrupt()?;
                Ok(None)
            }
            HostMessage::Resume => {
                self.service.on_resume()?;
                Ok(None)
            }
            HostMessage::Disconnect => {
                self.service.on_disconnect();
                Ok(None)
            }
            HostMessage::Event {
                event_type,
                text,
                event_time_ms,
            } => {
                let raw = RawEvent {
                    event_type,
                    text,
                    event_time_ms: event_time_ms.unwrap_or_else(now_ms),
                };
                let event = self.service.on_accessibility_event(&raw).await;
                debug!(target: "axbridge::session", kind = ?event.kind, "event delivered");
                Ok(None)
            }
            HostMessage::SetTree { root } => {
                let Some(host) = self.host.simulated() else {
                    bail!("set_tree is only available on the simulated host");
                };
                host.set_root(root);
                Ok(None)
            }
            HostMessage::SetApiLevel { api_level } => {
                let Some(host) = self.host.simulated() else {
                    bail!("set_api_level is only available on the simulated host");
                };
                host.set_api_level(api_level);
                info!(target: "axbridge::session", api_level, "api level changed; applies at next connect");
                Ok(None)
            }
            HostMessage::Action { action } => {
                let name = action.name();
                let result = self.action_handle().execute(action).await;
                Ok(Some(json!({ "action": name, "result": result })))
            }
            HostMessage::Status => Ok(Some(json!({ "status": self.service.status() }))),
        }
    }

    /// The handle the engine registered, or a fresh one if it never got one.
    fn action_handle(&self) -> ActionHandle {
        self.engine.handle().unwrap_or_else(|| {
            warn!(target: "axbridge::session", "no registered handle; using an unregistered one");
            self.service.handle()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ActionResult, EventKind, LifecycleState, reason};

    async fn run(session: &mut Session, v: Value) -> Option<Value> {
        session.run_message(&v).await.unwrap()
    }

    fn result_of(out: Option<Value>) -> ActionResult {
        serde_json::from_value(out.unwrap()["result"].clone()).unwrap()
    }

    #[tokio::test]
    async fn drives_lifecycle_events_and_actions() {
        let cfg = crate::config::load_from_str(
            r#"{"host": {"root": {"children": [{"text": "Login", "view_id": "app:id/login"}]}}}"#,
        )
        .unwrap();
        let mut s = Session::simulated(&cfg);

        run(&mut s, json!({"type": "connect"})).await;
        assert_eq!(s.service().lifecycle(), LifecycleState::Active);

        run(&mut s, json!({"type": "event", "event_type": 1, "text": ["Login"]})).await;
        assert_eq!(s.engine().events()[0].kind, EventKind::Clicked);

        let out = run(
            &mut s,
            json!({"type": "action", "action": {"type": "find_by_id", "identifier": "app:id/login"}}),
        )
        .await;
        let res = result_of(out);
        assert_eq!(res.element().unwrap().text.as_deref(), Some("Login"));

        let out = run(
            &mut s,
            json!({"type": "action", "action": {
                "type": "perform_action",
                "identifier": "app:id/login",
                "action": {"kind": "focus"}
            }}),
        )
        .await;
        assert!(result_of(out).is_ok());
        let out = run(&mut s, json!({"type": "action", "action": {"type": "get_current_focus"}})).await;
        assert_eq!(result_of(out).element().unwrap().identifier.as_deref(), Some("app:id/login"));

        run(&mut s, json!({"type": "set_tree"})).await;
        let out = run(
            &mut s,
            json!({"type": "action", "action": {"type": "find_by_text", "text": "Login"}}),
        )
        .await;
        assert_eq!(result_of(out), ActionResult::NotFound);

        let status = run(&mut s, json!({"type": "status"})).await.unwrap();
        assert_eq!(status["status"]["events_forwarded"], 1);
    }

    #[tokio::test]
    async fn actions_before_connect_are_refused() {
        let mut s = Session::simulated(&Config::default());
        let out = run(
            &mut s,
            json!({"type": "action", "action": {"type": "tap", "x": 1, "y": 1}}),
        )
        .await;
        assert_eq!(result_of(out), ActionResult::failed(reason::HANDLE_REVOKED));
    }

    #[tokio::test]
    async fn malformed_messages_and_bad_transitions_are_errors() {
        let mut s = Session::simulated(&Config::default());
        assert!(s.run_message(&json!({"type": "warp"})).await.is_err());
        assert!(s.run_message(&json!({"type": "resume"})).await.is_err());
    }
}
