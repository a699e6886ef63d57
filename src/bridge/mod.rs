/*!
The bridge core.

Leaves first:
- `event`: raw OS event -> normalized `UiEvent` (total, order preserving)
- `tree`: UI tree snapshot and lookup result types
- `locator`: single-result lookups by text, view id or focus
- `gesture`: tap / long press / swipe paths with timing
- `capability`: platform feature gating and the service declaration
- `action`: requests and results exchanged with the decision engine
- `executor`: validates, gates and dispatches requests
- `service`: lifecycle state machine, event pump and `ActionHandle`

Typical usage:
```no_run
use std::sync::Arc;
use axbridge::bridge::{BridgeService, RawEvent, TYPE_VIEW_CLICKED};
use axbridge::config::Config;
use axbridge::platform::{LoggingEngine, SimulatedHost};

# async fn demo() {
let engine = Arc::new(LoggingEngine::new(true, None));
let bridge = BridgeService::from_config(
    Arc::new(SimulatedHost::new(30)),
    engine.clone(),
    &Config::default(),
);
bridge.on_service_connected().await.unwrap();
bridge
    .on_accessibility_event(&RawEvent::new(TYPE_VIEW_CLICKED, vec!["OK".into()]))
    .await;
let result = engine.handle().unwrap().tap(10, 10).await;
# }
```
*/

pub mod action;
pub mod capability;
pub mod error;
pub mod event;
pub mod executor;
pub mod gesture;
pub mod locator;
pub mod service;
pub mod tree;

pub use action::{ActionRequest, ActionResult, NodeAction, Payload, ScreenSnapshot, reason};
pub use capability::{Capabilities, FeedbackMode, ServiceFlags, ServiceInfo, TYPES_ALL_MASK};
pub use error::{BridgeError, GestureError};
pub use event::{
    EventKind, RawEvent, TYPE_VIEW_CLICKED, TYPE_VIEW_FOCUSED, TYPE_WINDOW_CONTENT_CHANGED,
    UiEvent, translate,
};
pub use executor::{ActionExecutor, ExecContext, Phase};
pub use gesture::{
    GesturePath, GesturePoint, MAX_GESTURE_DURATION_MS, build_long_press, build_swipe, build_tap,
};
pub use locator::{Lookup, find_by_id, find_by_text, find_focused};
pub use service::{ActionHandle, BridgeService, BridgeState, BridgeStatus, LifecycleState};
pub use tree::{Rect, UiElementRef, UiNode};
