//! Desktop host: replays gestures on the real pointer through enigo.
//!
//! There is no accessibility tree on this host, so lookups always come back
//! empty. Gestures run on a dedicated worker thread that owns the `Enigo`
//! instance; the worker reports each outcome through the dispatch reply, which
//! gives the bridge the same out-of-band completion it gets from a mobile OS.
//! In dry-run mode gestures are only logged.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use enigo::Mouse as _;
use enigo::{Button, Coordinate, Direction, Enigo, Settings};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, trace, warn};

use super::{AccessibilityHost, DispatchReply};
use crate::bridge::{
    GesturePath, GesturePoint, MAX_GESTURE_DURATION_MS, NodeAction, ServiceInfo, UiElementRef,
    UiNode,
};

/// Pointer moves per second while replaying a swipe.
const MOVES_PER_SECOND: u64 = 60;
/// Step budget for the longest gesture the bridge accepts.
const MAX_REPLAY_STEPS: u64 = MAX_GESTURE_DURATION_MS * MOVES_PER_SECOND / 1000;

struct Job {
    path: GesturePath,
    reply: DispatchReply,
}

pub struct DesktopHost {
    api_level: u32,
    jobs: UnboundedSender<Job>,
}

impl DesktopHost {
    /// Spawn the gesture worker.
    /// - `api_level`: level reported to the bridge (drives capability gating).
    /// - `dry_run`: when true, only log gestures instead of moving the pointer.
    pub fn new(api_level: u32, dry_run: bool) -> Result<Self> {
        let (jobs, rx) = unbounded_channel();
        thread::Builder::new()
            .name("axbridge-gestures".into())
            .spawn(move || GestureWorker::new(dry_run).run(rx))
            .context("Failed to spawn gesture worker thread")?;
        Ok(Self { api_level, jobs })
    }
}

impl AccessibilityHost for DesktopHost {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn set_service_info(&self, info: &ServiceInfo) {
        debug!(
            target: "axbridge::desktop",
            event_types = info.event_types,
            "desktop host has no event filter; declaration noted"
        );
    }

    fn root_in_active_window(&self) -> Option<UiNode> {
        trace!(target: "axbridge::desktop", "no accessibility tree on desktop host");
        None
    }

    fn perform_action(&self, target: &UiElementRef, action: &NodeAction) -> bool {
        debug!(
            target: "axbridge::desktop",
            id = target.identifier.as_deref().unwrap_or(""), ?action,
            "no accessibility nodes on desktop host; node action refused"
        );
        false
    }

    fn dispatch_gesture(&self, path: &GesturePath, reply: DispatchReply) -> bool {
        let job = Job {
            path: path.clone(),
            reply,
        };
        if self.jobs.send(job).is_err() {
            warn!(target: "axbridge::desktop", "gesture worker is gone; refusing dispatch");
            return false;
        }
        true
    }
}

struct GestureWorker {
    dry_run: bool,
    enigo: Option<Enigo>,
}

impl GestureWorker {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            enigo: None,
        }
    }

    fn run(mut self, mut rx: UnboundedReceiver<Job>) {
        info!(target: "axbridge::desktop", dry_run = self.dry_run, "gesture worker started");
        while let Some(Job { path, reply }) = rx.blocking_recv() {
            match self.perform(&path) {
                Ok(()) => reply.completed(),
                Err(err) => {
                    warn!(target: "axbridge::desktop", error = %err, "gesture failed");
                    reply.cancelled();
                }
            }
        }
        info!(target: "axbridge::desktop", "gesture worker stopped");
    }

    fn perform(&mut self, path: &GesturePath) -> Result<()> {
        let start = path.start();
        let duration = path.duration_ms();
        if self.dry_run {
            let end = path.end();
            info!(
                target: "axbridge::desktop",
                x0 = start.x, y0 = start.y, x1 = end.x, y1 = end.y, duration,
                "DRY-RUN gesture"
            );
            return Ok(());
        }

        let enigo = self.ensure_enigo()?;
        enigo.move_mouse(start.x, start.y, Coordinate::Abs)?;
        enigo.button(Button::Left, Direction::Press)?;

        if path.is_stationary() {
            thread::sleep(Duration::from_millis(duration));
        } else {
            for (x, y, pause) in replay_steps(path.points(), duration) {
                thread::sleep(pause);
                enigo.move_mouse(x, y, Coordinate::Abs)?;
            }
        }

        enigo.button(Button::Left, Direction::Release)?;
        Ok(())
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            trace!(target: "axbridge::desktop", "Initializing Enigo");
            self.enigo =
                Some(Enigo::new(&Settings::default()).context("Failed to initialize Enigo")?);
        }
        self.enigo.as_mut().context("Enigo must be initialized")
    }
}

/// Intermediate pointer positions for a moving path, each paired with the
/// pause to take before moving there. The last step lands on the final point.
fn replay_steps(points: &[GesturePoint], duration_ms: u64) -> Vec<(i32, i32, Duration)> {
    let steps = (duration_ms.saturating_mul(MOVES_PER_SECOND) / 1000).clamp(1, MAX_REPLAY_STEPS);
    let mut out = Vec::with_capacity(usize::try_from(steps).unwrap_or(1));
    let mut last_t = 0;
    for i in 1..=steps {
        let t = offset_at_step(duration_ms, i, steps);
        let (x, y) = position_at(points, t);
        out.push((x, y, Duration::from_millis(t - last_t)));
        last_t = t;
    }
    out
}

/// `duration_ms * step / steps` without intermediate overflow.
fn offset_at_step(duration_ms: u64, step: u64, steps: u64) -> u64 {
    let t = u128::from(duration_ms) * u128::from(step) / u128::from(steps);
    u64::try_from(t).unwrap_or(duration_ms)
}

/// Linear interpolation along the path at offset `t`.
fn position_at(points: &[GesturePoint], t: u64) -> (i32, i32) {
    let Some(first) = points.first() else {
        return (0, 0);
    };
    let mut prev = *first;
    for p in points {
        if p.offset_ms >= t {
            let span = p.offset_ms - prev.offset_ms;
            if span == 0 {
                return (p.x, p.y);
            }
            let frac = (t - prev.offset_ms) as f64 / span as f64;
            let lerp = |a: i32, b: i32| {
                let (a, b) = (f64::from(a), f64::from(b));
                (a + (b - a) * frac).round() as i32
            };
            return (lerp(prev.x, p.x), lerp(prev.y, p.y));
        }
        prev = *p;
    }
    (prev.x, prev.y)
}
