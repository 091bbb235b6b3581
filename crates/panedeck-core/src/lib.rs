pub mod config;
pub mod event;
pub mod store;
pub mod history;
pub mod layout;
pub mod persist;
pub mod links;
pub mod session;
pub mod keys;

pub use config::Config;
pub use event::LayoutEvent;
pub use store::{FileStore, KvStore, MemoryStore, StoreError};
pub use history::{HistoryEntry, HistoryKind, HistoryStore};
pub use layout::{
    Direction, Layout, LayoutKind, Pane, PaneId, PaneManager, PaneOptions, PanePosition,
    PaneRect, Preset, Size, SplitDirection,
};
pub use persist::LayoutSnapshot;
pub use links::{LinkAction, LinkDetector, LinkSpan};
pub use session::{
    InboundEvent, OutboundEvent, SessionChannel, SessionError, SessionObserver, SessionState,
    TerminalSessionViewModel, TerminalWidget,
};
pub use keys::{KeyEvent, KeySource, ShortcutRouter};
