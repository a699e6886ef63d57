//! A decision engine that only observes.
//!
//! Logs every event it receives, keeps the registered handle so a host can
//! drive actions through it, and serves screen captures from a file when one
//! is configured.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::DecisionEngine;
use crate::bridge::{ActionHandle, ScreenSnapshot, UiEvent};

#[derive(Debug)]
pub struct LoggingEngine {
    init_ok: bool,
    capture_file: Option<PathBuf>,
    handle: Mutex<Option<ActionHandle>>,
    events: Mutex<Vec<UiEvent>>,
    registrations: AtomicU64,
}

impl LoggingEngine {
    /// - `init_ok`: what `initialize` reports.
    /// - `capture_file`: bytes returned by `capture_screen`, read on every call.
    pub fn new(init_ok: bool, capture_file: Option<PathBuf>) -> Self {
        Self {
            init_ok,
            capture_file,
            handle: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            registrations: AtomicU64::new(0),
        }
    }

    /// The most recently registered handle.
    pub fn handle(&self) -> Option<ActionHandle> {
        self.handle.lock().clone()
    }

    /// Events received so far, in arrival order.
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl DecisionEngine for LoggingEngine {
    fn initialize(&self) -> bool {
        info!(target: "axbridge::engine", ok = self.init_ok, "native initialize");
        self.init_ok
    }

    fn register_ui_control_handle(&self, handle: ActionHandle) {
        let n = self.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(target: "axbridge::engine", registrations = n, "ui control handle registered");
        *self.handle.lock() = Some(handle);
    }

    fn capture_screen(&self) -> Option<ScreenSnapshot> {
        let path = self.capture_file.as_ref()?;
        match std::fs::read(path) {
            Ok(bytes) => Some(ScreenSnapshot(bytes)),
            Err(err) => {
                warn!(
                    target: "axbridge::engine",
                    path = %path.display(), error = %err,
                    "capture file unreadable"
                );
                None
            }
        }
    }

    fn on_ui_event(&self, event: &UiEvent) {
        info!(
            target: "axbridge::engine",
            kind = ?event.kind,
            text = event.text.as_deref().unwrap_or(""),
            "ui event"
        );
        self.events.lock().push(event.clone());
    }
}
