use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use crate::config::EditorConfig;
use crate::detection::{DetectedSegment, DetectionResult, timeline_from_detection, transcript_at};
use crate::error::{EngineError, Result};
use crate::export::{ExportBackend, build_export_request};
use crate::gesture::{DragKind, GestureController, PointerSurface};
use crate::history::HistoryHook;
use crate::timeline::{Clip, ClipId, DurationChange, Timeline};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// A new source finished loading; resets to one full-span clip.
    LoadSource {
        total_duration: f64,
        #[serde(default)]
        source: Option<String>,
    },
    /// The player reported the source duration.
    SetDuration {
        total_duration: f64,
    },
    /// Replaces every clip with the detector's segments.
    ApplyDetection(DetectionResult),
    SetPlayhead {
        time: f64,
    },
    PointerDown {
        clip_id: ClipId,
        kind: DragKind,
        pixel_x: f64,
        track_width_px: f64,
    },
    PointerMove {
        pixel_x: f64,
    },
    PointerUp,
    /// Pointer left the track or escape was pressed; keeps the last position.
    PointerCancel,
    TimelineClick {
        pixel_x: f64,
        track_width_px: f64,
    },
    /// Splits the clip containing `at` seconds.
    ///
    /// # Example
    /// ```
    /// use trim_engine::{Command, DetachedSurface, Engine, Event};
    /// # use trim_engine::export::{ExportBackend, ExportRequest};
    /// # struct NoExport;
    /// # impl ExportBackend for NoExport {
    /// #     fn export(
    /// #         &self,
    /// #         _: &ExportRequest,
    /// #         _: &mut dyn FnMut(u8),
    /// #     ) -> trim_engine::Result<std::path::PathBuf> {
    /// #         Ok("out.mp4".into())
    /// #     }
    /// # }
    ///
    /// let mut engine = Engine::new(DetachedSurface, NoExport);
    /// engine.handle_command(Command::LoadSource { total_duration: 120.0, source: None }).unwrap();
    /// let events = engine.handle_command(Command::Split { at: 60.0 }).unwrap();
    /// assert!(matches!(&events[0], Event::ClipsChanged(snapshot) if snapshot.clips.len() == 2));
    /// ```
    Split {
        at: f64,
    },
    SplitAtPlayhead,
    RemoveClip {
        clip_id: ClipId,
    },
    /// Shifts a clip by a percentage of the track.
    MoveClip {
        clip_id: ClipId,
        delta_pct: f64,
    },
    TrimLeft {
        clip_id: ClipId,
        delta_pct: f64,
    },
    TrimRight {
        clip_id: ClipId,
        delta_pct: f64,
    },
    Undo,
    Redo,
    Export,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Fired after every successful clip mutation.
    ClipsChanged(TimelineSnapshot),
    PlayheadChanged {
        time: f64,
    },
    SubtitleChanged {
        text: Option<String>,
    },
    /// The player should seek; the timeline itself is unchanged.
    SeekRequested {
        time: f64,
    },
    DragStarted {
        clip_id: ClipId,
        kind: DragKind,
    },
    DragEnded {
        clip_id: ClipId,
        kind: DragKind,
    },
    ExportProgress {
        progress: u8,
    },
    ExportFinished {
        output: PathBuf,
    },
    ExportFailed {
        message: String,
    },
    Error(EngineErrorEvent),
}

/// Coarse classification of errors reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    NoSourceLoaded,
    InvalidInput,
    Export,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::NoSourceLoaded => Self::NoSourceLoaded,
            EngineError::InvalidDuration { .. }
            | EngineError::InvalidClipSet { .. }
            | EngineError::InvalidConfig { .. }
            | EngineError::ConfigParse { .. } => Self::InvalidInput,
            EngineError::ExportFailed { .. } | EngineError::NothingToExport => Self::Export,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Immutable timeline snapshot consumed by renderers and the exporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    pub total_duration: f64,
    pub playhead_time: f64,
    pub clips: Vec<ClipSummary>,
}

/// Snapshot representation of one clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipSummary {
    pub id: ClipId,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub left: f64,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl From<&Clip> for ClipSummary {
    fn from(clip: &Clip) -> Self {
        Self {
            id: clip.id(),
            start: clip.start(),
            end: clip.end(),
            duration: clip.duration(),
            left: clip.left(),
            width: clip.width(),
            transcript: clip.transcript().map(str::to_owned),
        }
    }
}

/// Single owner of the timeline; every mutation goes through [`Engine::handle_command`].
pub struct Engine<S, X> {
    surface: S,
    exporter: X,
    config: EditorConfig,
    timeline: Option<Timeline>,
    source: Option<String>,
    playhead_time: f64,
    segments: Vec<DetectedSegment>,
    subtitle: Option<String>,
    gesture: GestureController,
    history: Option<Box<dyn HistoryHook>>,
    next_clip_id: ClipId,
}

impl<S, X> Debug for Engine<S, X> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("timeline", &self.timeline)
            .field("playhead_time", &self.playhead_time)
            .field("gesture", &self.gesture)
            .field("has_history", &self.history.is_some())
            .field("next_clip_id", &self.next_clip_id)
            .finish_non_exhaustive()
    }
}

impl<S, X> Engine<S, X>
where
    S: PointerSurface,
    X: ExportBackend,
{
    /// Creates an engine with no source loaded.
    pub fn new(surface: S, exporter: X) -> Self {
        Self {
            surface,
            exporter,
            config: EditorConfig::default(),
            timeline: None,
            source: None,
            playhead_time: 0.0,
            segments: Vec::new(),
            subtitle: None,
            gesture: GestureController::new(),
            history: None,
            next_clip_id: 1,
        }
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs undo/redo hooks.
    pub fn with_history(mut self, history: Box<dyn HistoryHook>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn playhead_time(&self) -> f64 {
        self.playhead_time
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.is_dragging()
    }

    pub fn snapshot(&self) -> Option<TimelineSnapshot> {
        self.timeline
            .as_ref()
            .map(|timeline| snapshot_of(timeline, self.playhead_time))
    }

    /// Applies one command and returns emitted events.
    ///
    /// Edits that target a missing clip, split outside every clip, remove the
    /// last clip or misuse the gesture state machine leave the state untouched
    /// and return no events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        let result = match command {
            Command::LoadSource {
                total_duration,
                source,
            } => self.load_source(total_duration, source),
            Command::SetDuration { total_duration } => self.set_duration(total_duration),
            Command::ApplyDetection(result) => self.apply_detection(result),
            Command::SetPlayhead { time } => self.set_playhead(time),
            Command::PointerDown {
                clip_id,
                kind,
                pixel_x,
                track_width_px,
            } => self.pointer_down(clip_id, kind, pixel_x, track_width_px),
            Command::PointerMove { pixel_x } => self.pointer_move(pixel_x),
            Command::PointerUp | Command::PointerCancel => self.pointer_up(),
            Command::TimelineClick {
                pixel_x,
                track_width_px,
            } => self.timeline_click(pixel_x, track_width_px),
            Command::Split { at } => self.split(at),
            Command::SplitAtPlayhead => self.split(self.playhead_time),
            Command::RemoveClip { clip_id } => self.remove_clip(clip_id),
            Command::MoveClip { clip_id, delta_pct } => {
                self.edit_clip(clip_id, |timeline| timeline.move_clip(clip_id, delta_pct))
            }
            Command::TrimLeft { clip_id, delta_pct } => {
                self.edit_clip(clip_id, |timeline| timeline.trim_left(clip_id, delta_pct))
            }
            Command::TrimRight { clip_id, delta_pct } => {
                self.edit_clip(clip_id, |timeline| timeline.trim_right(clip_id, delta_pct))
            }
            Command::Undo => self.restore(HistoryStep::Undo),
            Command::Redo => self.restore(HistoryStep::Redo),
            Command::Export => self.export(),
        };

        match result {
            Err(error) if error.is_edit_rejection() => {
                warn!(%error, "edit rejected");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn load_source(&mut self, total_duration: f64, source: Option<String>) -> Result<Vec<Event>> {
        let timeline = Timeline::new(total_duration, self.next_clip_id)?
            .with_min_width_pct(self.config.min_width_pct);
        self.allocate_clip_id();

        let mut events = self.abort_drag();
        self.timeline = Some(timeline);
        self.source = source;
        self.segments.clear();
        self.playhead_time = 0.0;

        info!(total_duration, source = ?self.source, "source loaded");
        events.push(self.clips_changed());
        events.push(Event::PlayheadChanged { time: 0.0 });
        self.push_subtitle_change(&mut events);
        Ok(events)
    }

    fn set_duration(&mut self, total_duration: f64) -> Result<Vec<Event>> {
        let fallback_id = self.next_clip_id;
        let change = match self.timeline.as_mut() {
            Some(timeline) => timeline.set_duration(total_duration, fallback_id)?,
            None => {
                let timeline = Timeline::new(total_duration, fallback_id)?
                    .with_min_width_pct(self.config.min_width_pct);
                self.timeline = Some(timeline);
                DurationChange::Reset
            }
        };

        if change == DurationChange::Unchanged {
            return Ok(Vec::new());
        }
        if change == DurationChange::Reset {
            self.allocate_clip_id();
        }

        info!(total_duration, ?change, "duration changed");
        let mut events = self.abort_drag();
        events.push(self.clips_changed());
        self.clamp_playhead(&mut events);
        self.push_subtitle_change(&mut events);
        Ok(events)
    }

    fn apply_detection(&mut self, result: DetectionResult) -> Result<Vec<Event>> {
        let mut next_clip_id = self.next_clip_id;
        let timeline = timeline_from_detection(&result, self.config.min_width_pct, || {
            let id = next_clip_id;
            next_clip_id += 1;
            id
        })?;
        self.next_clip_id = next_clip_id;

        let mut events = self.abort_drag();
        if let (Some(history), Some(before)) = (self.history.as_mut(), self.timeline.as_ref()) {
            history.record(before);
        }

        info!(
            segment_count = result.segments.len(),
            clip_count = timeline.clips().len(),
            total_duration = result.total_duration,
            "detection result applied"
        );
        self.timeline = Some(timeline);
        self.segments = result.segments;
        events.push(self.clips_changed());
        self.clamp_playhead(&mut events);
        self.push_subtitle_change(&mut events);
        Ok(events)
    }

    fn set_playhead(&mut self, time: f64) -> Result<Vec<Event>> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::NoSourceLoaded)?;
        if time.is_nan() {
            debug!("playhead update ignored: NaN");
            return Ok(Vec::new());
        }
        self.playhead_time = time.clamp(0.0, timeline.total_duration());

        let mut events = vec![Event::PlayheadChanged {
            time: self.playhead_time,
        }];
        self.push_subtitle_change(&mut events);
        Ok(events)
    }

    fn pointer_down(
        &mut self,
        clip_id: ClipId,
        kind: DragKind,
        pixel_x: f64,
        track_width_px: f64,
    ) -> Result<Vec<Event>> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::NoSourceLoaded)?;
        self.gesture.pointer_down(
            timeline,
            &self.surface,
            clip_id,
            kind,
            pixel_x,
            track_width_px,
        )?;
        Ok(vec![Event::DragStarted { clip_id, kind }])
    }

    fn pointer_move(&mut self, pixel_x: f64) -> Result<Vec<Event>> {
        let edit = self.gesture.pointer_move(pixel_x)?;
        self.commit(edit.first_commit, |timeline| edit.apply(timeline))?;
        self.gesture.mark_committed();
        Ok(vec![self.clips_changed()])
    }

    fn pointer_up(&mut self) -> Result<Vec<Event>> {
        let ended = self.gesture.pointer_up()?;
        Ok(vec![Event::DragEnded {
            clip_id: ended.clip_id,
            kind: ended.kind,
        }])
    }

    fn timeline_click(&mut self, pixel_x: f64, track_width_px: f64) -> Result<Vec<Event>> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::NoSourceLoaded)?;
        let time = self
            .gesture
            .timeline_click(pixel_x, track_width_px, timeline.total_duration())?;
        debug!(pixel_x, track_width_px, time, "seek requested");
        Ok(vec![Event::SeekRequested { time }])
    }

    fn split(&mut self, at: f64) -> Result<Vec<Event>> {
        if self.gesture.is_dragging() && !self.config.split_while_dragging {
            return Err(EngineError::GestureInProgress);
        }
        let split_clip = self
            .timeline
            .as_ref()
            .and_then(|timeline| timeline.clip_at(at))
            .map(Clip::id);
        let next_clip_id = self.next_clip_id;
        self.commit(true, |timeline| timeline.split_at(at, next_clip_id))?;
        let allocated = self.allocate_clip_id();
        debug_assert_eq!(
            allocated, next_clip_id,
            "allocated clip id diverged from the split request id"
        );

        info!(
            at,
            next_clip_id,
            clip_count = self.timeline.as_ref().map_or(0, |t| t.clips().len()),
            "split applied"
        );
        let mut events = vec![self.clips_changed()];
        if let Some(clip_id) = split_clip {
            events.extend(self.end_drag_on(clip_id));
        }
        Ok(events)
    }

    fn remove_clip(&mut self, clip_id: ClipId) -> Result<Vec<Event>> {
        self.commit(true, |timeline| timeline.remove_clip(clip_id))?;
        info!(clip_id, "clip removed");
        Ok(vec![self.clips_changed()])
    }

    fn edit_clip(
        &mut self,
        clip_id: ClipId,
        edit: impl FnOnce(&mut Timeline) -> Result<()>,
    ) -> Result<Vec<Event>> {
        self.commit(true, edit)?;
        let mut events = vec![self.clips_changed()];
        events.extend(self.end_drag_on(clip_id));
        Ok(events)
    }

    fn restore(&mut self, step: HistoryStep) -> Result<Vec<Event>> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::NoSourceLoaded)?;
        let Some(history) = self.history.as_mut() else {
            debug!("history step ignored: no hook installed");
            return Ok(Vec::new());
        };
        let restored = match step {
            HistoryStep::Undo => history.undo(timeline),
            HistoryStep::Redo => history.redo(timeline),
        };
        let Some(restored) = restored else {
            return Ok(Vec::new());
        };
        let fits_source = restored.total_duration() == timeline.total_duration();
        if !fits_source || !restored.satisfies_invariants() {
            warn!("history step rejected: state does not fit the loaded source");
            return Ok(Vec::new());
        }

        let max_id = restored.clips().iter().map(Clip::id).max().unwrap_or(0);
        self.next_clip_id = self.next_clip_id.max(max_id + 1);
        let mut events = self.abort_drag();
        self.timeline = Some(restored);
        events.push(self.clips_changed());
        Ok(events)
    }

    fn export(&mut self) -> Result<Vec<Event>> {
        let timeline = self.timeline.as_ref().ok_or(EngineError::NoSourceLoaded)?;
        let request = build_export_request(
            timeline,
            self.source.clone(),
            self.config.export_first_clip_only,
        )?;

        let mut events = Vec::new();
        let outcome = self.exporter.export(&request, &mut |progress| {
            events.push(Event::ExportProgress {
                progress: progress.min(100),
            });
        });

        match outcome {
            Ok(output) => {
                info!(
                    output = %output.display(),
                    clip_count = request.clips.len(),
                    "export finished"
                );
                events.push(Event::ExportFinished { output });
            }
            Err(error) => {
                warn!(%error, "export failed");
                events.push(Event::ExportFailed {
                    message: error.to_string(),
                });
            }
        }
        Ok(events)
    }

    /// Runs one edit against the timeline, recording the prior state in the
    /// history hook only when the edit succeeds.
    fn commit<T>(
        &mut self,
        record: bool,
        edit: impl FnOnce(&mut Timeline) -> Result<T>,
    ) -> Result<T> {
        let timeline = self.timeline.as_mut().ok_or(EngineError::NoSourceLoaded)?;
        let before = (record && self.history.is_some()).then(|| timeline.clone());
        let value = edit(timeline)?;
        if let (Some(history), Some(before)) = (self.history.as_mut(), before) {
            history.record(&before);
        }
        Ok(value)
    }

    fn abort_drag(&mut self) -> Vec<Event> {
        self.gesture
            .abort()
            .map(|ended| Event::DragEnded {
                clip_id: ended.clip_id,
                kind: ended.kind,
            })
            .into_iter()
            .collect()
    }

    /// Ends the active drag when another edit changed the dragged clip; its
    /// pointer-down baseline no longer describes the clip.
    fn end_drag_on(&mut self, clip_id: ClipId) -> Vec<Event> {
        if self.gesture.active_clip() != Some(clip_id) {
            return Vec::new();
        }
        debug!(clip_id, "drag ended: clip edited outside the gesture");
        self.abort_drag()
    }

    fn clamp_playhead(&mut self, events: &mut Vec<Event>) {
        let Some(timeline) = self.timeline.as_ref() else {
            return;
        };
        let clamped = self.playhead_time.min(timeline.total_duration());
        if clamped != self.playhead_time {
            self.playhead_time = clamped;
            events.push(Event::PlayheadChanged { time: clamped });
        }
    }

    fn push_subtitle_change(&mut self, events: &mut Vec<Event>) {
        let text = transcript_at(&self.segments, self.playhead_time).map(str::to_owned);
        if text != self.subtitle {
            self.subtitle = text.clone();
            events.push(Event::SubtitleChanged { text });
        }
    }

    fn clips_changed(&self) -> Event {
        match self.snapshot() {
            Some(snapshot) => Event::ClipsChanged(snapshot),
            None => Event::ClipsChanged(TimelineSnapshot {
                total_duration: 0.0,
                playhead_time: 0.0,
                clips: Vec::new(),
            }),
        }
    }

    fn allocate_clip_id(&mut self) -> ClipId {
        let id = self.next_clip_id;
        self.next_clip_id += 1;
        id
    }
}

#[derive(Debug, Clone, Copy)]
enum HistoryStep {
    Undo,
    Redo,
}

fn snapshot_of(timeline: &Timeline, playhead_time: f64) -> TimelineSnapshot {
    TimelineSnapshot {
        total_duration: timeline.total_duration(),
        playhead_time,
        clips: timeline.clips().iter().map(ClipSummary::from).collect(),
    }
}
