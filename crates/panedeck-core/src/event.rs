use crate::layout::{LayoutKind, PaneId};

/// Change notifications emitted by the pane manager, drained by the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEvent {
    PaneCreated(PaneId),
    PaneRemoved(PaneId),
    FocusChanged {
        from: Option<PaneId>,
        to: PaneId,
    },
    /// Layout kind changed (or the pane set was replaced wholesale)
    LayoutChanged(LayoutKind),
    RatioChanged(f32),
}
