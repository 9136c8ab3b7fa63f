//! Results delivered by the external "interesting segment" detector and their
//! mapping onto timeline clips.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::projection::{FULL_WIDTH_PCT, is_valid_duration, percent_of};
use crate::timeline::{Clip, ClipId, Placement, Timeline};

/// One interval reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSegment {
    /// Opaque upstream identifier.
    #[serde(default)]
    pub id: Option<String>,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub transcript: String,
}

/// Complete detector output for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub segments: Vec<DetectedSegment>,
    pub total_duration: f64,
}

/// Maps detected segments 1:1 onto clips, preserving order and transcripts.
///
/// Bounds are clamped into `[0, total_duration]`, empty or inverted segments
/// are dropped, and segments narrower than `min_width_pct` are widened to it.
/// When nothing is left the result is one full-span clip.
///
/// # Example
/// ```
/// use trim_engine::detection::segments_to_clips;
///
/// let mut next_id = 0;
/// let clips = segments_to_clips(&[], 90.0, 5.0, || {
///     next_id += 1;
///     next_id
/// });
/// assert_eq!(clips.len(), 1);
/// assert_eq!((clips[0].start(), clips[0].end(), clips[0].width()), (0.0, 90.0, 100.0));
/// ```
pub fn segments_to_clips(
    segments: &[DetectedSegment],
    total_duration: f64,
    min_width_pct: f64,
    mut allocate_id: impl FnMut() -> ClipId,
) -> Vec<Clip> {
    let mut clips = Vec::with_capacity(segments.len().max(1));

    for segment in segments {
        if !segment.start.is_finite() || !segment.end.is_finite() {
            debug!(start = segment.start, end = segment.end, "segment dropped: not finite");
            continue;
        }
        let start = segment.start.max(0.0);
        let end = segment.end.min(total_duration);
        if start >= end {
            debug!(start, end, "segment dropped: empty after clamping");
            continue;
        }

        let id = allocate_id();
        let clip = if percent_of(end - start, total_duration) < min_width_pct {
            let left = percent_of(start, total_duration).min(FULL_WIDTH_PCT - min_width_pct);
            debug!(start, end, left, "segment widened to minimum width");
            Clip::from_placement(
                id,
                Placement {
                    left,
                    width: min_width_pct,
                },
                total_duration,
            )
        } else {
            Clip::from_seconds(id, start, end, total_duration)
        };

        let transcript = (!segment.transcript.is_empty()).then(|| segment.transcript.clone());
        clips.push(
            clip.with_transcript(transcript)
                .with_source_id(segment.id.clone()),
        );
    }

    if clips.is_empty() {
        clips.push(Clip::from_seconds(allocate_id(), 0.0, total_duration, total_duration));
    }
    clips
}

/// Builds the timeline that replaces the current one when a detection result arrives.
pub fn timeline_from_detection(
    result: &DetectionResult,
    min_width_pct: f64,
    allocate_id: impl FnMut() -> ClipId,
) -> Result<Timeline> {
    if !is_valid_duration(result.total_duration) {
        return Err(EngineError::InvalidDuration {
            value: result.total_duration,
        });
    }
    let clips = segments_to_clips(
        &result.segments,
        result.total_duration,
        min_width_pct,
        allocate_id,
    );
    Timeline::from_clips(result.total_duration, min_width_pct, clips)
}

/// Returns the transcript of the first segment covering `t`, if any.
pub fn transcript_at(segments: &[DetectedSegment], t: f64) -> Option<&str> {
    segments
        .iter()
        .find(|segment| segment.start <= t && t <= segment.end)
        .map(|segment| segment.transcript.as_str())
        .filter(|text| !text.is_empty())
}
