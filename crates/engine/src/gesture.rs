//! Pointer-drag state machine translating pixel positions on the track into
//! timeline edits.

use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::projection::{pixels_to_percent, time_at_pixel};
use crate::timeline::{ClipId, Placement, Timeline};

/// Which part of a clip the pointer grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DragKind {
    Move,
    TrimLeft,
    TrimRight,
}

/// Move/up listeners registered on the track surface for one drag session.
///
/// Dropping the guard unregisters them, so every way out of a drag releases
/// the listeners exactly once.
pub struct ListenerGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Guard for surfaces that have nothing to unregister.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Debug for ListenerGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

/// Surface hosting the track, which owns the global pointer listeners.
pub trait PointerSurface {
    /// Registers pointer move/up listeners for the duration of one drag.
    fn register_drag_listeners(&self) -> ListenerGuard;
}

/// Surface without listeners, used by headless drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSurface;

impl PointerSurface for DetachedSurface {
    fn register_drag_listeners(&self) -> ListenerGuard {
        ListenerGuard::noop()
    }
}

#[derive(Debug)]
struct DragSession {
    clip_id: ClipId,
    kind: DragKind,
    start_px: f64,
    track_width_px: f64,
    baseline: Placement,
    committed: bool,
    _listeners: ListenerGuard,
}

#[derive(Debug, Default)]
enum GestureState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// One timeline edit derived from the current pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragEdit {
    pub clip_id: ClipId,
    pub kind: DragKind,
    /// Placement captured when the drag started.
    pub baseline: Placement,
    /// Total pointer displacement since the drag started, in percent.
    pub delta_pct: f64,
    /// `true` until one edit of this session has been committed.
    pub first_commit: bool,
}

impl DragEdit {
    /// Applies the edit relative to the drag baseline.
    pub fn apply(&self, timeline: &mut Timeline) -> Result<()> {
        match self.kind {
            DragKind::Move => timeline.move_clip_from(self.clip_id, self.baseline, self.delta_pct),
            DragKind::TrimLeft => {
                timeline.trim_left_from(self.clip_id, self.baseline, self.delta_pct)
            }
            DragKind::TrimRight => {
                timeline.trim_right_from(self.clip_id, self.baseline, self.delta_pct)
            }
        }
    }
}

/// Identifies the session that just ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndedDrag {
    pub clip_id: ClipId,
    pub kind: DragKind,
}

/// Idle/Dragging state machine for pointer gestures on the track.
///
/// Only one drag exists at a time. A pointer-down received while dragging is
/// ignored. The track width is read once at pointer-down and reused for the
/// whole session.
#[derive(Debug, Default)]
pub struct GestureController {
    state: GestureState,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    /// Clip being dragged, if any.
    pub fn active_clip(&self) -> Option<ClipId> {
        match &self.state {
            GestureState::Dragging(session) => Some(session.clip_id),
            GestureState::Idle => None,
        }
    }

    /// Starts a drag on `clip_id`, capturing its current placement as baseline.
    pub fn pointer_down(
        &mut self,
        timeline: &Timeline,
        surface: &dyn PointerSurface,
        clip_id: ClipId,
        kind: DragKind,
        pixel_x: f64,
        track_width_px: f64,
    ) -> Result<()> {
        if self.is_dragging() {
            debug!(clip_id, "pointer down ignored: drag already active");
            return Err(EngineError::GestureInProgress);
        }
        let baseline = timeline.placement_of(clip_id)?;

        debug!(
            clip_id,
            ?kind,
            pixel_x,
            track_width_px,
            left = baseline.left,
            width = baseline.width,
            "drag started"
        );
        self.state = GestureState::Dragging(DragSession {
            clip_id,
            kind,
            start_px: pixel_x,
            track_width_px,
            baseline,
            committed: false,
            _listeners: surface.register_drag_listeners(),
        });
        Ok(())
    }

    /// Computes the edit for the pointer now at `pixel_x`.
    ///
    /// The delta is always the total displacement from the pointer-down
    /// position, applied to the baseline placement.
    pub fn pointer_move(&self, pixel_x: f64) -> Result<DragEdit> {
        let GestureState::Dragging(session) = &self.state else {
            return Err(EngineError::NoActiveGesture);
        };
        Ok(DragEdit {
            clip_id: session.clip_id,
            kind: session.kind,
            baseline: session.baseline,
            delta_pct: pixels_to_percent(pixel_x - session.start_px, session.track_width_px),
            first_commit: !session.committed,
        })
    }

    /// Records that an edit of the current session reached the timeline.
    pub fn mark_committed(&mut self) {
        if let GestureState::Dragging(session) = &mut self.state {
            session.committed = true;
        }
    }

    /// Ends the drag on pointer-up, pointer-leave or escape.
    ///
    /// The timeline keeps the last committed position; listeners are released.
    pub fn pointer_up(&mut self) -> Result<EndedDrag> {
        match std::mem::take(&mut self.state) {
            GestureState::Dragging(session) => {
                debug!(clip_id = session.clip_id, "drag ended");
                Ok(EndedDrag {
                    clip_id: session.clip_id,
                    kind: session.kind,
                })
            }
            GestureState::Idle => Err(EngineError::NoActiveGesture),
        }
    }

    /// Abandons any active drag; used before the whole timeline is replaced.
    pub fn abort(&mut self) -> Option<EndedDrag> {
        self.pointer_up().ok()
    }

    /// Maps a click on the track to a seek time. Ignored while dragging.
    pub fn timeline_click(
        &self,
        pixel_x: f64,
        track_width_px: f64,
        total_duration: f64,
    ) -> Result<f64> {
        if self.is_dragging() {
            return Err(EngineError::GestureInProgress);
        }
        Ok(time_at_pixel(pixel_x, track_width_px, total_duration))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{DragKind, GestureController, ListenerGuard, PointerSurface};
    use crate::error::EngineError;
    use crate::timeline::Timeline;

    #[derive(Debug, Default)]
    struct RecordingSurface {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl RecordingSurface {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("lock surface calls").clone()
        }
    }

    impl PointerSurface for RecordingSurface {
        fn register_drag_listeners(&self) -> ListenerGuard {
            self.calls.lock().expect("lock surface calls").push("register");
            let calls = Arc::clone(&self.calls);
            ListenerGuard::new(move || {
                calls.lock().expect("lock surface calls").push("release");
            })
        }
    }

    fn timeline() -> Timeline {
        let mut timeline = Timeline::new(120.0, 1).expect("valid duration");
        timeline.split_at(60.0, 2).expect("split should succeed");
        timeline
    }

    #[test]
    fn drag_deltas_are_measured_from_pointer_down() {
        let mut timeline = timeline();
        let surface = RecordingSurface::default();
        let mut gesture = GestureController::new();
        gesture
            .pointer_down(&timeline, &surface, 2, DragKind::TrimLeft, 500.0, 1_000.0)
            .expect("pointer down");

        for pixel_x in [520.0, 580.0, 560.0, 600.0] {
            let edit = gesture.pointer_move(pixel_x).expect("dragging");
            edit.apply(&mut timeline).expect("apply edit");
            gesture.mark_committed();
        }

        let clip = timeline.clip(2).expect("clip exists");
        assert_eq!(clip.left(), 60.0);
        assert_eq!(clip.width(), 40.0);
    }

    #[test]
    fn first_commit_flag_is_cleared_after_mark() {
        let timeline = timeline();
        let mut gesture = GestureController::new();
        gesture
            .pointer_down(&timeline, &super::DetachedSurface, 1, DragKind::Move, 0.0, 100.0)
            .expect("pointer down");

        assert!(gesture.pointer_move(5.0).expect("dragging").first_commit);
        gesture.mark_committed();
        assert!(!gesture.pointer_move(6.0).expect("dragging").first_commit);
    }

    #[test]
    fn listeners_are_registered_once_and_released_on_pointer_up() {
        let timeline = timeline();
        let surface = RecordingSurface::default();
        let mut gesture = GestureController::new();

        gesture
            .pointer_down(&timeline, &surface, 1, DragKind::Move, 10.0, 200.0)
            .expect("pointer down");
        assert_eq!(surface.calls(), vec!["register"]);

        let ended = gesture.pointer_up().expect("drag active");
        assert_eq!(ended.clip_id, 1);
        assert_eq!(surface.calls(), vec!["register", "release"]);
        assert!(!gesture.is_dragging());
    }

    #[test]
    fn abort_releases_listeners() {
        let timeline = timeline();
        let surface = RecordingSurface::default();
        let mut gesture = GestureController::new();
        gesture
            .pointer_down(&timeline, &surface, 2, DragKind::TrimRight, 10.0, 200.0)
            .expect("pointer down");

        assert!(gesture.abort().is_some());
        assert!(gesture.abort().is_none());
        assert_eq!(surface.calls(), vec!["register", "release"]);
    }

    #[test]
    fn second_pointer_down_is_ignored_while_dragging() {
        let timeline = timeline();
        let surface = RecordingSurface::default();
        let mut gesture = GestureController::new();
        gesture
            .pointer_down(&timeline, &surface, 1, DragKind::Move, 10.0, 200.0)
            .expect("pointer down");

        let second = gesture.pointer_down(&timeline, &surface, 2, DragKind::TrimLeft, 50.0, 200.0);

        assert!(matches!(second, Err(EngineError::GestureInProgress)));
        assert_eq!(gesture.active_clip(), Some(1));
        assert_eq!(surface.calls(), vec!["register"]);
    }

    #[test]
    fn pointer_down_on_unknown_clip_stays_idle() {
        let timeline = timeline();
        let surface = RecordingSurface::default();
        let mut gesture = GestureController::new();

        let result = gesture.pointer_down(&timeline, &surface, 42, DragKind::Move, 0.0, 100.0);

        assert!(matches!(result, Err(EngineError::ClipNotFound { clip_id: 42 })));
        assert!(!gesture.is_dragging());
        assert!(surface.calls().is_empty());
    }

    #[test]
    fn move_and_up_without_drag_are_rejected() {
        let mut gesture = GestureController::new();

        assert!(matches!(
            gesture.pointer_move(10.0),
            Err(EngineError::NoActiveGesture)
        ));
        assert!(matches!(
            gesture.pointer_up(),
            Err(EngineError::NoActiveGesture)
        ));
    }

    #[test]
    fn click_maps_pixels_to_time_only_when_idle() {
        let timeline = timeline();
        let mut gesture = GestureController::new();

        assert_eq!(gesture.timeline_click(250.0, 1_000.0, 120.0).expect("idle"), 30.0);

        gesture
            .pointer_down(&timeline, &super::DetachedSurface, 1, DragKind::Move, 0.0, 100.0)
            .expect("pointer down");
        assert!(matches!(
            gesture.timeline_click(250.0, 1_000.0, 120.0),
            Err(EngineError::GestureInProgress)
        ));
    }

    #[test]
    fn stale_track_width_is_kept_for_the_whole_drag() {
        let mut timeline = timeline();
        let mut gesture = GestureController::new();
        gesture
            .pointer_down(&timeline, &super::DetachedSurface, 1, DragKind::TrimRight, 0.0, 500.0)
            .expect("pointer down");

        let edit = gesture.pointer_move(-50.0).expect("dragging");
        edit.apply(&mut timeline).expect("apply edit");

        assert_eq!(edit.delta_pct, -10.0);
        assert_eq!(timeline.clip(1).expect("clip exists").width(), 40.0);
    }
}
