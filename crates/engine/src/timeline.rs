use crate::error::{EngineError, Result};
use crate::projection::{FULL_WIDTH_PCT, MIN_WIDTH_PCT, is_valid_duration, percent_of, seconds_at};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Opaque identifier for timeline clips.
pub type ClipId = u64;

/// Track-space position of a clip, in percent of the total duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub left: f64,
    pub width: f64,
}

impl Placement {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// A contiguous sub-interval of the loaded source.
///
/// Seconds and track percentages are only ever set together, so `left` and
/// `width` always project `start` and `end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clip {
    id: ClipId,
    start: f64,
    end: f64,
    left: f64,
    width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_id: Option<String>,
}

impl Clip {
    /// Builds a clip from exact time bounds; the projection is derived.
    pub(crate) fn from_seconds(id: ClipId, start: f64, end: f64, total_duration: f64) -> Self {
        Self {
            id,
            start,
            end,
            left: percent_of(start, total_duration),
            width: percent_of(end - start, total_duration),
            transcript: None,
            source_id: None,
        }
    }

    /// Builds a clip from an exact placement; the time bounds are derived.
    pub(crate) fn from_placement(id: ClipId, placement: Placement, total_duration: f64) -> Self {
        let start = seconds_at(placement.left, total_duration);
        let end = seconds_at(placement.right(), total_duration).min(total_duration);
        Self {
            id,
            start,
            end,
            left: placement.left,
            width: placement.width,
            transcript: None,
            source_id: None,
        }
    }

    pub(crate) fn with_transcript(mut self, transcript: Option<String>) -> Self {
        self.transcript = transcript;
        self
    }

    pub(crate) fn with_source_id(mut self, source_id: Option<String>) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    /// Inclusive start in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End in seconds.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Always `end - start`.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn placement(&self) -> Placement {
        Placement {
            left: self.left,
            width: self.width,
        }
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    /// Identifier assigned by the detection collaborator, if the clip came from one.
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Returns `true` when `t` lies in `[start, end]`.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    fn is_boundary(&self, t: f64) -> bool {
        t == self.start || t == self.end
    }
}

/// Ordered clip collection over one loaded source.
///
/// Always holds at least one clip. Clips may overlap one another; each clip
/// individually stays inside `[0, total_duration]` and at least
/// `min_width_pct` wide.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    total_duration: f64,
    min_width_pct: f64,
    clips: Vec<Clip>,
}

/// Outcome of [`Timeline::set_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationChange {
    Unchanged,
    Reprojected,
    Reset,
}

impl Timeline {
    /// Creates a timeline holding one clip spanning the whole source.
    ///
    /// # Example
    /// ```
    /// use trim_engine::timeline::Timeline;
    ///
    /// let timeline = Timeline::new(120.0, 1).unwrap();
    /// assert_eq!(timeline.clips().len(), 1);
    /// assert_eq!(timeline.clips()[0].width(), 100.0);
    /// ```
    pub fn new(total_duration: f64, clip_id: ClipId) -> Result<Self> {
        ensure_valid_duration(total_duration)?;
        Ok(Self {
            total_duration,
            min_width_pct: MIN_WIDTH_PCT,
            clips: vec![full_span_clip(clip_id, total_duration)],
        })
    }

    /// Builds a timeline from an externally produced clip list.
    ///
    /// Fails when `clips` is empty or any clip breaks the bounds or the
    /// minimum width.
    pub(crate) fn from_clips(
        total_duration: f64,
        min_width_pct: f64,
        clips: Vec<Clip>,
    ) -> Result<Self> {
        ensure_valid_duration(total_duration)?;
        let timeline = Self {
            total_duration,
            min_width_pct,
            clips,
        };
        if timeline.clips.is_empty() {
            return Err(EngineError::InvalidClipSet { reason: "no clips" });
        }
        if !timeline.satisfies_invariants() {
            return Err(EngineError::InvalidClipSet {
                reason: "clip outside bounds or below minimum width",
            });
        }
        Ok(timeline)
    }

    /// Overrides the minimum clip width; values outside `(0, 100]` are ignored.
    pub fn with_min_width_pct(mut self, min_width_pct: f64) -> Self {
        if min_width_pct > 0.0 && min_width_pct <= FULL_WIDTH_PCT {
            self.min_width_pct = min_width_pct;
        }
        self
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn min_width_pct(&self) -> f64 {
        self.min_width_pct
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, clip_id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == clip_id)
    }

    /// Returns the first clip, in collection order, containing `t`.
    pub fn clip_at(&self, t: f64) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.contains(t))
    }

    /// Checks bounds, minimum width and projection consistency of every clip.
    pub fn satisfies_invariants(&self) -> bool {
        use crate::projection::approx_eq;

        !self.clips.is_empty()
            && self.clips.iter().all(|clip| {
                0.0 <= clip.start
                    && clip.start < clip.end
                    && clip.end <= self.total_duration
                    && clip.width >= self.min_width_pct
                    && approx_eq(clip.left, percent_of(clip.start, self.total_duration))
                    && approx_eq(clip.width, percent_of(clip.duration(), self.total_duration))
            })
    }

    /// Shifts a clip by `delta_pct`, measured from its current placement.
    pub fn move_clip(&mut self, clip_id: ClipId, delta_pct: f64) -> Result<()> {
        let from = self.placement_of(clip_id)?;
        self.move_clip_from(clip_id, from, delta_pct)
    }

    /// Moves a clip to `from.left + delta_pct`, clamped so it stays on the track.
    ///
    /// Width and duration are unchanged. Drag sessions pass the placement
    /// captured at pointer-down so repeated moves never accumulate error.
    pub fn move_clip_from(
        &mut self,
        clip_id: ClipId,
        from: Placement,
        delta_pct: f64,
    ) -> Result<()> {
        let index = self.index_of(clip_id)?;
        let total = self.total_duration;
        let clip = &mut self.clips[index];

        let width = clip.width;
        let duration = clip.duration();
        let left = clamp_pct(from.left + sanitize(delta_pct), 0.0, FULL_WIDTH_PCT - width);
        let start = seconds_at(left, total);

        clip.left = left;
        clip.start = start;
        clip.end = (start + duration).min(total);

        debug!(clip_id, left, width, start, end = clip.end, "move accepted");
        Ok(())
    }

    /// Moves the left edge of a clip by `delta_pct` from its current placement.
    pub fn trim_left(&mut self, clip_id: ClipId, delta_pct: f64) -> Result<()> {
        let from = self.placement_of(clip_id)?;
        self.trim_left_from(clip_id, from, delta_pct)
    }

    /// Moves the left edge to `from.left + delta_pct`; `end` never changes.
    ///
    /// The edge is clamped to the track start and to the minimum width. The
    /// width is measured against the clip's current right edge, so a baseline
    /// taken before another edit of the same clip cannot desync the projection.
    pub fn trim_left_from(
        &mut self,
        clip_id: ClipId,
        from: Placement,
        delta_pct: f64,
    ) -> Result<()> {
        let index = self.index_of(clip_id)?;
        let total = self.total_duration;
        let min_width = self.min_width_pct;
        let clip = &mut self.clips[index];

        let right = clip.left + clip.width;
        let left = clamp_pct(from.left + sanitize(delta_pct), 0.0, right - min_width);
        let width = (right - left).max(min_width);

        clip.left = left;
        clip.width = width;
        clip.start = seconds_at(left, total);

        debug!(
            clip_id,
            left,
            width,
            start = clip.start,
            end = clip.end,
            "trim left accepted"
        );
        Ok(())
    }

    /// Moves the right edge of a clip by `delta_pct` from its current placement.
    pub fn trim_right(&mut self, clip_id: ClipId, delta_pct: f64) -> Result<()> {
        let from = self.placement_of(clip_id)?;
        self.trim_right_from(clip_id, from, delta_pct)
    }

    /// Sets the width to `from.width + delta_pct`; `left` and `start` never change.
    ///
    /// The width is clamped to the minimum width and to the track end.
    pub fn trim_right_from(
        &mut self,
        clip_id: ClipId,
        from: Placement,
        delta_pct: f64,
    ) -> Result<()> {
        let index = self.index_of(clip_id)?;
        let total = self.total_duration;
        let min_width = self.min_width_pct;
        let clip = &mut self.clips[index];

        let width = clamp_pct(
            from.width + sanitize(delta_pct),
            min_width,
            FULL_WIDTH_PCT - clip.left,
        );

        clip.width = width;
        clip.end = seconds_at(clip.left + width, total).min(total);

        debug!(
            clip_id,
            left = clip.left,
            width,
            start = clip.start,
            end = clip.end,
            "trim right accepted"
        );
        Ok(())
    }

    /// Splits the clip containing `at` into two pieces.
    ///
    /// The first piece keeps the original id; the second receives
    /// `next_clip_id` and is appended to the end of the collection. Fails when
    /// `at` is outside `(0, total_duration)`, lies on any clip boundary, is not
    /// inside any clip, or would leave a piece below the minimum width.
    ///
    /// # Example
    /// ```
    /// use trim_engine::timeline::Timeline;
    ///
    /// let mut timeline = Timeline::new(120.0, 1).unwrap();
    /// timeline.split_at(60.0, 2).unwrap();
    /// assert_eq!(timeline.clips()[0].end(), 60.0);
    /// assert_eq!(timeline.clips()[1].start(), 60.0);
    /// ```
    pub fn split_at(&mut self, at: f64, next_clip_id: ClipId) -> Result<ClipId> {
        if !at.is_finite() || at <= 0.0 || at >= self.total_duration {
            warn!(at, "split rejected: outside timeline");
            return Err(EngineError::SplitOutOfRange { at });
        }
        if self.clips.iter().any(|clip| clip.is_boundary(at)) {
            warn!(at, "split rejected: boundary point");
            return Err(EngineError::SplitPointAtBoundary { at });
        }
        let Some(index) = self.clips.iter().position(|clip| clip.contains(at)) else {
            warn!(at, "split rejected: no clip contains split point");
            return Err(EngineError::SplitOutOfRange { at });
        };

        let total = self.total_duration;
        let current = &self.clips[index];
        let left = Clip::from_seconds(current.id, current.start, at, total)
            .with_transcript(current.transcript.clone())
            .with_source_id(current.source_id.clone());
        let right = Clip::from_seconds(next_clip_id, at, current.end, total)
            .with_transcript(current.transcript.clone());

        if left.width < self.min_width_pct || right.width < self.min_width_pct {
            warn!(at, clip_id = current.id, "split rejected: piece below minimum width");
            return Err(EngineError::SplitBelowMinWidth { at });
        }

        debug!(
            at,
            clip_id = current.id,
            next_clip_id,
            left_width = left.width,
            right_width = right.width,
            "split accepted"
        );

        self.clips[index] = left;
        self.clips.push(right);
        Ok(next_clip_id)
    }

    /// Removes a clip unless it is the only one left.
    pub fn remove_clip(&mut self, clip_id: ClipId) -> Result<Clip> {
        let index = self.index_of(clip_id)?;
        if self.clips.len() <= 1 {
            warn!(clip_id, "remove rejected: last clip");
            return Err(EngineError::LastClip { clip_id });
        }
        let removed = self.clips.remove(index);
        debug!(clip_id, clip_count = self.clips.len(), "remove accepted");
        Ok(removed)
    }

    /// Replaces every clip with one spanning `[0, total_duration]`.
    pub fn reset_to_full_span(&mut self, total_duration: f64, clip_id: ClipId) -> Result<()> {
        ensure_valid_duration(total_duration)?;
        self.total_duration = total_duration;
        self.clips = vec![full_span_clip(clip_id, total_duration)];
        Ok(())
    }

    /// Changes the total duration, re-projecting existing clips onto it.
    ///
    /// Clips are cut back to the new end; clips that end up narrower than the
    /// minimum width are dropped. When nothing survives the timeline resets to
    /// one full-span clip with id `fallback_clip_id`.
    pub fn set_duration(
        &mut self,
        total_duration: f64,
        fallback_clip_id: ClipId,
    ) -> Result<DurationChange> {
        ensure_valid_duration(total_duration)?;
        if total_duration == self.total_duration {
            return Ok(DurationChange::Unchanged);
        }

        let min_width = self.min_width_pct;
        let clips: Vec<Clip> = self
            .clips
            .iter()
            .filter_map(|clip| {
                let start = clip.start.min(total_duration);
                let end = clip.end.min(total_duration);
                let reprojected = Clip::from_seconds(clip.id, start, end, total_duration)
                    .with_transcript(clip.transcript.clone())
                    .with_source_id(clip.source_id.clone());
                (start < end && reprojected.width >= min_width).then_some(reprojected)
            })
            .collect();

        if clips.is_empty() {
            self.reset_to_full_span(total_duration, fallback_clip_id)?;
            debug!(total_duration, "duration change reset timeline");
            return Ok(DurationChange::Reset);
        }

        debug!(
            total_duration,
            kept = clips.len(),
            dropped = self.clips.len() - clips.len(),
            "duration change re-projected clips"
        );
        self.total_duration = total_duration;
        self.clips = clips;
        Ok(DurationChange::Reprojected)
    }

    pub(crate) fn placement_of(&self, clip_id: ClipId) -> Result<Placement> {
        self.clip(clip_id)
            .map(Clip::placement)
            .ok_or(EngineError::ClipNotFound { clip_id })
    }

    fn index_of(&self, clip_id: ClipId) -> Result<usize> {
        self.clips
            .iter()
            .position(|clip| clip.id == clip_id)
            .ok_or_else(|| {
                warn!(clip_id, "edit rejected: clip not found");
                EngineError::ClipNotFound { clip_id }
            })
    }
}

fn full_span_clip(clip_id: ClipId, total_duration: f64) -> Clip {
    Clip {
        id: clip_id,
        start: 0.0,
        end: total_duration,
        left: 0.0,
        width: FULL_WIDTH_PCT,
        transcript: None,
        source_id: None,
    }
}

fn ensure_valid_duration(total_duration: f64) -> Result<()> {
    if is_valid_duration(total_duration) {
        Ok(())
    } else {
        Err(EngineError::InvalidDuration {
            value: total_duration,
        })
    }
}

// Lower bound wins when the range is empty.
fn clamp_pct(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}

fn sanitize(delta_pct: f64) -> f64 {
    if delta_pct.is_nan() { 0.0 } else { delta_pct }
}
