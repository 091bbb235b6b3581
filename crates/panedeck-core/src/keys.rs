//! Global shortcut handling for pane operations.
//!
//! Chords are matched exactly: modifiers must be identical and letters are
//! case-sensitive (`ctrl+shift+D` does not match `ctrl+shift+d`).

use std::collections::HashMap;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::config::default_keybindings;
use crate::layout::{Direction, PaneManager, Preset, SplitDirection};
use crate::session::SubscriptionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };
    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };
    pub const CTRL_SHIFT: Modifiers = Modifiers {
        ctrl: true,
        shift: true,
        ..Modifiers::NONE
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Char(char),
    Named(String),
}

impl Key {
    fn parse(name: &str) -> Option<Key> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => return Some(Key::Char(c)),
            (None, _) => return None,
            _ => {}
        }
        Some(match name {
            "ArrowUp" | "up" => Key::ArrowUp,
            "ArrowDown" | "down" => Key::ArrowDown,
            "ArrowLeft" | "left" => Key::ArrowLeft,
            "ArrowRight" | "right" => Key::ArrowRight,
            other => Key::Named(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl FromStr for KeyChord {
    type Err = String;

    /// Parses `"ctrl+shift+D"`, `"alt+ArrowLeft"`, ...; the last segment is the key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').collect();
        let Some((key, mods)) = parts.split_last() else {
            return Err(format!("empty chord: {s:?}"));
        };
        let mut modifiers = Modifiers::NONE;
        for m in mods {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "meta" | "cmd" | "super" => modifiers.meta = true,
                other => return Err(format!("unknown modifier {other:?} in {s:?}")),
            }
        }
        let key = Key::parse(key).ok_or_else(|| format!("missing key in {s:?}"))?;
        Ok(KeyChord { key, modifiers })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Focus(Direction),
    FocusNext,
    FocusPrev,
    SplitVertical,
    SplitHorizontal,
    ClosePane,
    Preset(Preset),
}

impl FromStr for ShortcutAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "focus-up" => ShortcutAction::Focus(Direction::Up),
            "focus-down" => ShortcutAction::Focus(Direction::Down),
            "focus-left" => ShortcutAction::Focus(Direction::Left),
            "focus-right" => ShortcutAction::Focus(Direction::Right),
            "focus-next" => ShortcutAction::FocusNext,
            "focus-prev" => ShortcutAction::FocusPrev,
            "split-vertical" => ShortcutAction::SplitVertical,
            "split-horizontal" => ShortcutAction::SplitHorizontal,
            "close-pane" => ShortcutAction::ClosePane,
            other => match other.strip_prefix("preset-") {
                Some(name) => ShortcutAction::Preset(name.parse()?),
                None => return Err(format!("unknown action: {other}")),
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The shortcut ran; the event's default action should be suppressed.
    Handled,
    Ignored,
}

/// Global key-event source (the window-level keydown stream).
pub trait KeySource {
    fn subscribe(&mut self) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
}

#[derive(Debug)]
pub struct ShortcutRouter {
    bindings: HashMap<KeyChord, ShortcutAction>,
    subscription: Option<SubscriptionId>,
}

impl ShortcutRouter {
    pub fn new() -> Self {
        Self::from_bindings(&default_keybindings())
    }

    /// Builds the dispatch table from `chord -> action` strings, skipping
    /// entries that do not parse.
    pub fn from_bindings(bindings: &HashMap<String, String>) -> Self {
        let mut table = HashMap::new();
        for (chord, action) in bindings {
            match (chord.parse::<KeyChord>(), action.parse::<ShortcutAction>()) {
                (Ok(chord), Ok(action)) => {
                    table.insert(chord, action);
                }
                (Err(e), _) | (_, Err(e)) => warn!("ignoring keybinding {chord} = {action}: {e}"),
            }
        }
        Self {
            bindings: table,
            subscription: None,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribes to `source`. Installing again is a no-op.
    pub fn install(&mut self, source: &mut dyn KeySource) -> SubscriptionId {
        if let Some(id) = self.subscription {
            return id;
        }
        let id = source.subscribe();
        debug!(subscription = id, "shortcut router installed");
        self.subscription = Some(id);
        id
    }

    pub fn uninstall(&mut self, source: &mut dyn KeySource) {
        if let Some(id) = self.subscription.take() {
            source.unsubscribe(id);
            debug!(subscription = id, "shortcut router uninstalled");
        }
    }

    pub fn action_for(&self, event: &KeyEvent) -> Option<ShortcutAction> {
        let chord = KeyChord {
            key: event.key.clone(),
            modifiers: event.modifiers,
        };
        self.bindings.get(&chord).copied()
    }

    /// Dispatches a key event delivered on `subscription`.
    pub fn handle_key(
        &self,
        subscription: SubscriptionId,
        event: &KeyEvent,
        panes: &mut PaneManager,
    ) -> KeyOutcome {
        if self.subscription != Some(subscription) {
            return KeyOutcome::Ignored;
        }
        let Some(action) = self.action_for(event) else {
            return KeyOutcome::Ignored;
        };
        debug!(?action, "shortcut");
        match action {
            ShortcutAction::Focus(direction) => panes.navigate_pane(direction),
            ShortcutAction::FocusNext => panes.focus_next(),
            ShortcutAction::FocusPrev => panes.focus_prev(),
            ShortcutAction::SplitVertical => split_focused(panes, SplitDirection::Vertical),
            ShortcutAction::SplitHorizontal => split_focused(panes, SplitDirection::Horizontal),
            ShortcutAction::ClosePane => panes.close_focused_pane(),
            ShortcutAction::Preset(preset) => panes.apply_preset(preset),
        }
        KeyOutcome::Handled
    }
}

impl Default for ShortcutRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn split_focused(panes: &mut PaneManager, direction: SplitDirection) {
    if let Some(id) = panes.focused_pane_id() {
        panes.split_pane(id, direction);
    }
}

/// Key source driven by hand; counts live subscriptions.
#[derive(Debug, Default)]
pub struct ManualKeySource {
    live: Vec<SubscriptionId>,
    next: SubscriptionId,
}

impl ManualKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_subscriptions(&self) -> &[SubscriptionId] {
        &self.live
    }
}

impl KeySource for ManualKeySource {
    fn subscribe(&mut self) -> SubscriptionId {
        self.next += 1;
        self.live.push(self.next);
        self.next
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.live.retain(|s| *s != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutKind, PaneOptions};

    fn alt(key: Key) -> KeyEvent {
        KeyEvent::new(key, Modifiers::ALT)
    }

    fn ctrl_shift(c: char) -> KeyEvent {
        KeyEvent::new(Key::Char(c), Modifiers::CTRL_SHIFT)
    }

    fn setup() -> (ShortcutRouter, ManualKeySource, SubscriptionId, PaneManager) {
        let mut router = ShortcutRouter::new();
        let mut source = ManualKeySource::new();
        let sub = router.install(&mut source);
        let mut panes = PaneManager::default();
        panes.create_pane(PaneOptions::default());
        (router, source, sub, panes)
    }

    #[test]
    fn chords_parse_with_case_sensitive_letters() {
        let chord: KeyChord = "ctrl+shift+D".parse().unwrap();
        assert_eq!(chord.key, Key::Char('D'));
        assert_eq!(chord.modifiers, Modifiers::CTRL_SHIFT);
        let chord: KeyChord = "alt+ArrowLeft".parse().unwrap();
        assert_eq!(chord.key, Key::ArrowLeft);
        assert!("hyper+x".parse::<KeyChord>().is_err());
        assert!("ctrl+".parse::<KeyChord>().is_err());
    }

    #[test]
    fn split_and_close_shortcuts() {
        let (router, _source, sub, mut panes) = setup();
        assert_eq!(router.handle_key(sub, &ctrl_shift('D'), &mut panes), KeyOutcome::Handled);
        assert_eq!(panes.pane_count(), 2);
        assert_eq!(panes.layout().direction, SplitDirection::Vertical);

        assert_eq!(router.handle_key(sub, &ctrl_shift('W'), &mut panes), KeyOutcome::Handled);
        assert_eq!(panes.pane_count(), 1);

        router.handle_key(sub, &ctrl_shift('E'), &mut panes);
        assert_eq!(panes.layout().kind, LayoutKind::Split);
        assert_eq!(panes.layout().direction, SplitDirection::Horizontal);
    }

    #[test]
    fn lowercase_letter_does_not_match() {
        let (router, _source, sub, mut panes) = setup();
        assert_eq!(router.handle_key(sub, &ctrl_shift('d'), &mut panes), KeyOutcome::Ignored);
        assert_eq!(panes.pane_count(), 1);
    }

    #[test]
    fn arrows_need_alt() {
        let (router, _source, sub, mut panes) = setup();
        router.handle_key(sub, &ctrl_shift('D'), &mut panes);
        let first = panes.focused_pane_id();

        let plain = KeyEvent::new(Key::ArrowRight, Modifiers::NONE);
        assert_eq!(router.handle_key(sub, &plain, &mut panes), KeyOutcome::Ignored);
        assert_eq!(panes.focused_pane_id(), first);

        assert_eq!(router.handle_key(sub, &alt(Key::ArrowRight), &mut panes), KeyOutcome::Handled);
        assert_ne!(panes.focused_pane_id(), first);
        router.handle_key(sub, &alt(Key::ArrowLeft), &mut panes);
        assert_eq!(panes.focused_pane_id(), first);
    }

    #[test]
    fn navigation_at_edge_is_handled_noop() {
        let (router, _source, sub, mut panes) = setup();
        let only = panes.focused_pane_id();
        assert_eq!(router.handle_key(sub, &alt(Key::ArrowUp), &mut panes), KeyOutcome::Handled);
        assert_eq!(panes.focused_pane_id(), only);
    }

    #[test]
    fn install_is_idempotent() {
        let mut router = ShortcutRouter::new();
        let mut source = ManualKeySource::new();
        let first = router.install(&mut source);
        let second = router.install(&mut source);
        assert_eq!(first, second);
        assert_eq!(source.live_subscriptions().len(), 1);

        router.uninstall(&mut source);
        router.uninstall(&mut source);
        assert!(source.live_subscriptions().is_empty());
        assert!(!router.is_installed());

        let mut panes = PaneManager::default();
        panes.create_pane(PaneOptions::default());
        assert_eq!(router.handle_key(first, &ctrl_shift('D'), &mut panes), KeyOutcome::Ignored);
        assert_eq!(panes.pane_count(), 1);
    }

    #[test]
    fn custom_bindings_and_presets() {
        let mut bindings = HashMap::new();
        bindings.insert("ctrl+alt+q".to_string(), "preset-quad".to_string());
        bindings.insert("ctrl+alt+z".to_string(), "explode".to_string());
        let mut router = ShortcutRouter::from_bindings(&bindings);
        let mut source = ManualKeySource::new();
        let sub = router.install(&mut source);
        let mut panes = PaneManager::default();
        panes.create_pane(PaneOptions::default());

        let chord = KeyEvent::new(
            Key::Char('q'),
            Modifiers {
                ctrl: true,
                alt: true,
                ..Modifiers::NONE
            },
        );
        assert_eq!(router.handle_key(sub, &chord, &mut panes), KeyOutcome::Handled);
        assert_eq!(panes.pane_count(), 4);
        assert_eq!(router.handle_key(sub, &ctrl_shift('D'), &mut panes), KeyOutcome::Ignored);
    }
}
