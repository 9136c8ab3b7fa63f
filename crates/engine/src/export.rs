use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timeline::{ClipId, Timeline};

/// Request handed to the export collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Source label given at load time, if any.
    pub source: Option<String>,
    pub clips: Vec<ExportClip>,
}

/// One finalized clip in export order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportClip {
    pub clip_id: ClipId,
    pub start: f64,
    pub end: f64,
}

/// External export job.
pub trait ExportBackend {
    /// Runs the export, reporting integer progress in `[0, 100]`.
    ///
    /// Returns the produced output on success.
    fn export(&self, request: &ExportRequest, on_progress: &mut dyn FnMut(u8)) -> Result<PathBuf>;
}

/// Builds an export request from the current clips in collection order.
///
/// With `first_clip_only` only the first clip is exported, matching the
/// historic single-clip behaviour.
pub fn build_export_request(
    timeline: &Timeline,
    source: Option<String>,
    first_clip_only: bool,
) -> Result<ExportRequest> {
    let take = if first_clip_only { 1 } else { usize::MAX };
    let clips: Vec<ExportClip> = timeline
        .clips()
        .iter()
        .take(take)
        .map(|clip| ExportClip {
            clip_id: clip.id(),
            start: clip.start(),
            end: clip.end(),
        })
        .collect();

    if clips.is_empty() {
        return Err(EngineError::NothingToExport);
    }

    Ok(ExportRequest { source, clips })
}

#[cfg(test)]
mod tests {
    use super::build_export_request;
    use crate::timeline::Timeline;

    fn three_clips() -> Timeline {
        let mut timeline = Timeline::new(90.0, 1).expect("valid duration");
        timeline.split_at(60.0, 2).expect("split should succeed");
        timeline.split_at(30.0, 3).expect("split should succeed");
        timeline
    }

    #[test]
    fn export_request_carries_every_clip_in_collection_order() {
        let request =
            build_export_request(&three_clips(), Some("demo.mp4".into()), false).expect("request");

        let spans: Vec<_> = request
            .clips
            .iter()
            .map(|clip| (clip.clip_id, clip.start, clip.end))
            .collect();
        assert_eq!(spans, vec![(1, 0.0, 30.0), (2, 60.0, 90.0), (3, 30.0, 60.0)]);
        assert_eq!(request.source.as_deref(), Some("demo.mp4"));
    }

    #[test]
    fn compatibility_mode_exports_only_the_first_clip() {
        let request = build_export_request(&three_clips(), None, true).expect("request");

        assert_eq!(request.clips.len(), 1);
        assert_eq!(request.clips[0].clip_id, 1);
        assert_eq!(request.clips[0].end, 30.0);
    }
}
