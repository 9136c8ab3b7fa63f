//! UI-agnostic clip timeline engine for trimming a single video source.
//!
//! Clips live on a 0-100% track and carry both their percentage placement and
//! their time bounds in seconds. Pointer gestures are translated into edits by
//! [`gesture::GestureController`]; the [`Engine`] owns all state and applies
//! [`Command`]s one at a time.

pub mod api;
pub mod bridge;
pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod gesture;
pub mod history;
pub mod projection;
pub mod timeline;

pub use api::{
    ClipSummary, Command, Engine, EngineErrorEvent, EngineErrorKind, Event, TimelineSnapshot,
};
pub use bridge::{EngineCommandSender, EngineEventReceiver, spawn_engine_bridge};
pub use config::EditorConfig;
pub use detection::{DetectedSegment, DetectionResult};
pub use error::{EngineError, Result};
pub use export::{ExportBackend, ExportClip, ExportRequest};
pub use gesture::{DetachedSurface, DragKind, ListenerGuard, PointerSurface};
pub use history::HistoryHook;
pub use timeline::{Clip, ClipId, Placement, Timeline};
