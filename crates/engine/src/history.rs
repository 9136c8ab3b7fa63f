use crate::timeline::Timeline;

/// Optional undo/redo capability installed on the engine.
///
/// The engine only calls the hook; it keeps no history of its own. Without a
/// hook, undo and redo commands do nothing.
pub trait HistoryHook: Send {
    /// Called with the state about to be replaced, once per committed edit
    /// and once per drag session.
    fn record(&mut self, before: &Timeline);

    /// Returns the state to restore, if any.
    fn undo(&mut self, current: &Timeline) -> Option<Timeline>;

    /// Returns the state to re-apply, if any.
    fn redo(&mut self, current: &Timeline) -> Option<Timeline>;
}
