/// Notifications published by the core to its consumers (status display,
/// text injection). One unbounded channel carries both kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Fired exactly once per Idle <-> Recording transition, never on a no-op.
    RecordingChanged(bool),
    /// Fired once per successfully transcribed, non-empty clip.
    TextReady(String),
}
