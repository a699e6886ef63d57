//! Gesture construction: taps, long presses and straight-line swipes as timed
//! point paths ready for dispatch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::GestureError;

/// Shortest duration a gesture may have; zero-length touches are not accepted
/// by every platform.
pub const MIN_GESTURE_DURATION_MS: u64 = 1;
/// Tap duration used by [`build_tap`].
pub const DEFAULT_TAP_DURATION_MS: u64 = 50;
/// Longest gesture accepted. Dispatch holds the OS gate for the whole
/// gesture, so events wait at most this long behind one.
pub const MAX_GESTURE_DURATION_MS: u64 = 60_000;

/// One point of a gesture, relative to the gesture start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GesturePoint {
    pub x: i32,
    pub y: i32,
    pub offset_ms: u64,
}

/// A validated gesture path.
///
/// Always holds at least one point, offsets never decrease, no offset exceeds
/// the duration, and the duration is positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct GesturePath {
    points: Vec<GesturePoint>,
    duration_ms: u64,
}

impl GesturePath {
    pub fn new(points: Vec<GesturePoint>, duration_ms: u64) -> Result<Self, GestureError> {
        if points.is_empty() {
            return Err(GestureError::InvalidParameter(
                "gesture path needs at least one point".into(),
            ));
        }
        if duration_ms == 0 {
            return Err(GestureError::InvalidParameter(
                "gesture duration must be positive".into(),
            ));
        }
        if duration_ms > MAX_GESTURE_DURATION_MS {
            return Err(GestureError::InvalidParameter(format!(
                "gesture duration {duration_ms}ms exceeds {MAX_GESTURE_DURATION_MS}ms"
            )));
        }
        if points.windows(2).any(|w| w[1].offset_ms < w[0].offset_ms) {
            return Err(GestureError::InvalidParameter(
                "gesture point offsets must not decrease".into(),
            ));
        }
        if points.iter().any(|p| p.offset_ms > duration_ms) {
            return Err(GestureError::InvalidParameter(
                "gesture point offset exceeds duration".into(),
            ));
        }
        Ok(Self {
            points,
            duration_ms,
        })
    }

    pub fn points(&self) -> &[GesturePoint] {
        &self.points
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn start(&self) -> GesturePoint {
        self.points[0]
    }

    pub fn end(&self) -> GesturePoint {
        self.points[self.points.len() - 1]
    }

    /// Whether the path stays on one spot (tap / long press).
    pub fn is_stationary(&self) -> bool {
        self.points
            .iter()
            .all(|p| p.x == self.points[0].x && p.y == self.points[0].y)
    }
}

/// Single-point tap with the default tap duration.
pub fn build_tap(x: i32, y: i32) -> GesturePath {
    build_press(x, y, DEFAULT_TAP_DURATION_MS)
}

/// Single-point press held for `duration_ms`, clamped to
/// `MIN_GESTURE_DURATION_MS..=MAX_GESTURE_DURATION_MS`.
pub fn build_press(x: i32, y: i32, duration_ms: u64) -> GesturePath {
    GesturePath {
        points: vec![GesturePoint { x, y, offset_ms: 0 }],
        duration_ms: duration_ms.clamp(MIN_GESTURE_DURATION_MS, MAX_GESTURE_DURATION_MS),
    }
}

/// Long press: like [`build_press`] but the caller must supply a positive duration.
pub fn build_long_press(x: i32, y: i32, duration_ms: i64) -> Result<GesturePath, GestureError> {
    let duration_ms = positive_duration(duration_ms)?;
    Ok(build_press(x, y, duration_ms))
}

/// Two-point straight-line swipe spanning `duration_ms`.
pub fn build_swipe(
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    duration_ms: i64,
) -> Result<GesturePath, GestureError> {
    let duration_ms = positive_duration(duration_ms)?;
    GesturePath::new(
        vec![
            GesturePoint {
                x: x0,
                y: y0,
                offset_ms: 0,
            },
            GesturePoint {
                x: x1,
                y: y1,
                offset_ms: duration_ms,
            },
        ],
        duration_ms,
    )
}

fn positive_duration(duration_ms: i64) -> Result<u64, GestureError> {
    let duration = u64::try_from(duration_ms)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            GestureError::InvalidParameter(format!(
                "duration must be positive, got {duration_ms}ms"
            ))
        })?;
    if duration > MAX_GESTURE_DURATION_MS {
        return Err(GestureError::InvalidParameter(format!(
            "duration must be at most {MAX_GESTURE_DURATION_MS}ms, got {duration_ms}ms"
        )));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_is_one_point_with_positive_duration() {
        for (x, y) in [(0, 0), (-5, 7), (i32::MAX, i32::MIN), (1080, 2400)] {
            let path = build_tap(x, y);
            assert_eq!(path.points().len(), 1);
            assert!(path.duration_ms() > 0);
            assert_eq!((path.start().x, path.start().y), (x, y));
            assert!(path.is_stationary());
        }
    }

    #[test]
    fn zero_press_is_normalized() {
        assert_eq!(build_press(1, 1, 0).duration_ms(), MIN_GESTURE_DURATION_MS);
    }

    #[test]
    fn swipe_rejects_non_positive_duration() {
        for d in [0, -1, -500, i64::MIN] {
            assert!(matches!(
                build_swipe(0, 0, 100, 100, d),
                Err(GestureError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn swipe_spans_requested_duration() {
        let path = build_swipe(0, 0, 100, 200, 500).unwrap();
        assert_eq!(path.points().len(), 2);
        assert_eq!(path.duration_ms(), 500);
        assert_eq!(path.end(), GesturePoint { x: 100, y: 200, offset_ms: 500 });
        assert!(!path.is_stationary());
    }

    #[test]
    fn long_press_requires_positive_duration() {
        assert_eq!(build_long_press(3, 4, 1000).unwrap().duration_ms(), 1000);
        assert!(build_long_press(3, 4, 0).is_err());
    }

    #[test]
    fn durations_beyond_the_cap_are_rejected() {
        let max = i64::try_from(MAX_GESTURE_DURATION_MS).unwrap();
        assert_eq!(
            build_swipe(0, 0, 10, 10, max).unwrap().duration_ms(),
            MAX_GESTURE_DURATION_MS
        );
        for d in [max + 1, 3_600_000, i64::MAX] {
            assert!(matches!(
                build_swipe(0, 0, 10, 10, d),
                Err(GestureError::InvalidParameter(_))
            ));
            assert!(build_long_press(0, 0, d).is_err());
        }
        assert_eq!(build_press(0, 0, u64::MAX).duration_ms(), MAX_GESTURE_DURATION_MS);
        let origin = vec![GesturePoint { x: 0, y: 0, offset_ms: 0 }];
        assert!(GesturePath::new(origin, MAX_GESTURE_DURATION_MS + 1).is_err());
    }

    #[test]
    fn path_rejects_decreasing_offsets() {
        let pts = vec![
            GesturePoint { x: 0, y: 0, offset_ms: 10 },
            GesturePoint { x: 1, y: 1, offset_ms: 5 },
        ];
        assert!(GesturePath::new(pts, 20).is_err());
        assert!(GesturePath::new(vec![], 20).is_err());
    }
}
