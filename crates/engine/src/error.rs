use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::timeline::ClipId;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine commands and timeline operations.
#[derive(Debug)]
pub enum EngineError {
    NoSourceLoaded,
    InvalidDuration {
        value: f64,
    },
    ClipNotFound {
        clip_id: ClipId,
    },
    SplitOutOfRange {
        at: f64,
    },
    SplitPointAtBoundary {
        at: f64,
    },
    SplitBelowMinWidth {
        at: f64,
    },
    LastClip {
        clip_id: ClipId,
    },
    GestureInProgress,
    NoActiveGesture,
    NothingToExport,
    InvalidClipSet {
        reason: &'static str,
    },
    InvalidConfig {
        reason: String,
    },
    ExportFailed {
        reason: String,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Returns `true` for rejections that leave the timeline untouched and are
    /// not reported to the user: stale clip ids, out-of-range splits, the last
    /// clip guard and gesture misuse.
    pub fn is_edit_rejection(&self) -> bool {
        matches!(
            self,
            Self::ClipNotFound { .. }
                | Self::SplitOutOfRange { .. }
                | Self::SplitPointAtBoundary { .. }
                | Self::SplitBelowMinWidth { .. }
                | Self::LastClip { .. }
                | Self::GestureInProgress
                | Self::NoActiveGesture
        )
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSourceLoaded => write!(f, "no source is loaded"),
            Self::InvalidDuration { value } => write!(f, "invalid total duration: {value}"),
            Self::ClipNotFound { clip_id } => write!(f, "clip not found: {clip_id}"),
            Self::SplitOutOfRange { at } => {
                write!(f, "split point {at}s is outside every clip")
            }
            Self::SplitPointAtBoundary { at } => {
                write!(f, "cannot split at clip boundary: {at}s")
            }
            Self::SplitBelowMinWidth { at } => {
                write!(f, "split at {at}s would create a clip below the minimum width")
            }
            Self::LastClip { clip_id } => {
                write!(f, "clip {clip_id} is the last clip and cannot be removed")
            }
            Self::GestureInProgress => write!(f, "a drag gesture is already in progress"),
            Self::NoActiveGesture => write!(f, "no drag gesture is in progress"),
            Self::NothingToExport => write!(f, "timeline has no clips to export"),
            Self::InvalidClipSet { reason } => write!(f, "invalid clip set: {reason}"),
            Self::InvalidConfig { reason } => write!(f, "invalid editor config: {reason}"),
            Self::ExportFailed { reason } => write!(f, "export failed: {reason}"),
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config: {} ({source})", path.display())
            }
            Self::ConfigParse { path, source } => match path {
                Some(path) => write!(f, "invalid config file {} ({source})", path.display()),
                None => write!(f, "invalid config ({source})"),
            },
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            _ => None,
        }
    }
}
