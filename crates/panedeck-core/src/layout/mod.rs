mod geometry;

use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LayoutConfig;
use crate::event::LayoutEvent;

pub use geometry::{PaneRect, Size};

pub type PaneId = u64;

/// Orientation of the divider between two split panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// left | right
    #[default]
    Vertical,
    /// top / bottom
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Single,
    Split,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(rename = "type")]
    pub kind: LayoutKind,
    pub direction: SplitDirection,
    /// Percent of the split axis given to the first pane.
    pub ratio: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            kind: LayoutKind::Single,
            direction: SplitDirection::Vertical,
            ratio: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PanePosition {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pane {
    pub id: PaneId,
    pub title: String,
    #[serde(default)]
    pub position: PanePosition,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaneOptions {
    pub title: Option<String>,
    pub session_id: Option<String>,
}

impl PaneOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Single,
    Vertical,
    Horizontal,
    Quad,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Preset::Single),
            "vertical" => Ok(Preset::Vertical),
            "horizontal" => Ok(Preset::Horizontal),
            "quad" => Ok(Preset::Quad),
            other => Err(format!("unknown layout preset: {other}")),
        }
    }
}

/// Owns every pane and its arrangement.
///
/// Panes live in creation order; that order drives grid placement (row-major),
/// focus fallback on removal and tie-breaking during navigation. The layout
/// kind always follows the pane count: one pane is `single`, two are a
/// `split`, three or more are a `grid`.
#[derive(Debug)]
pub struct PaneManager {
    panes: Vec<Pane>,
    layout: Layout,
    next_id: PaneId,
    container: Size,
    config: LayoutConfig,
    events: Vec<LayoutEvent>,
}

impl PaneManager {
    pub fn new(config: LayoutConfig) -> Self {
        let layout = Layout {
            ratio: config.default_ratio,
            ..Layout::default()
        };
        Self {
            panes: Vec::new(),
            layout,
            next_id: 1,
            container: Size::default(),
            config,
            events: Vec::new(),
        }
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        self.panes.iter().find(|p| p.id == id)
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.panes.iter().map(|p| p.id).collect()
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn contains(&self, id: PaneId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn focused_pane_id(&self) -> Option<PaneId> {
        self.panes.iter().find(|p| p.focused).map(|p| p.id)
    }

    pub fn container_size(&self) -> Size {
        self.container
    }

    /// Drain pending change notifications.
    pub fn take_events(&mut self) -> Vec<LayoutEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn create_pane(&mut self, opts: PaneOptions) -> Pane {
        let id = self.alloc_id();
        self.panes.push(new_pane(id, opts));
        self.events.push(LayoutEvent::PaneCreated(id));
        if self.panes.len() == 1 {
            self.set_focus(id);
        }
        self.reflow();
        debug!(pane = id, count = self.panes.len(), "pane created");
        self.snapshot_pane(id)
    }

    /// Splits `pane_id`, placing the new pane right after it. Refused once the
    /// layout already holds more than `max_split_panes` panes; splitting a
    /// two-pane split promotes the layout to a grid.
    pub fn split_pane(&mut self, pane_id: PaneId, direction: SplitDirection) -> Option<Pane> {
        let idx = self.index_of(pane_id)?;
        if self.panes.len() > self.config.max_split_panes {
            debug!(pane = pane_id, count = self.panes.len(), "split refused at capacity");
            return None;
        }
        let id = self.alloc_id();
        self.panes.insert(idx + 1, new_pane(id, PaneOptions::default()));
        self.events.push(LayoutEvent::PaneCreated(id));
        if self.panes.len() == 2 {
            self.layout.direction = direction;
            self.layout.ratio = self.clamp_ratio(self.config.default_ratio);
        }
        self.reflow();
        debug!(pane = pane_id, new_pane = id, ?direction, "pane split");
        Some(self.snapshot_pane(id))
    }

    /// Removes a pane. The last remaining pane is never removed. When the
    /// focused pane goes away focus moves to the previous pane in creation
    /// order (or the new first pane).
    pub fn remove_pane(&mut self, pane_id: PaneId) {
        if self.panes.len() <= 1 {
            return;
        }
        let Some(idx) = self.index_of(pane_id) else {
            return;
        };
        let removed = self.panes.remove(idx);
        self.events.push(LayoutEvent::PaneRemoved(removed.id));
        if removed.focused {
            let target = self.panes[idx.saturating_sub(1)].id;
            self.panes.iter_mut().for_each(|p| p.focused = p.id == target);
            self.events.push(LayoutEvent::FocusChanged {
                from: Some(removed.id),
                to: target,
            });
        }
        self.reflow();
        debug!(pane = pane_id, count = self.panes.len(), "pane removed");
    }

    pub fn close_pane(&mut self, pane_id: PaneId) {
        self.remove_pane(pane_id);
    }

    pub fn close_focused_pane(&mut self) {
        if let Some(id) = self.focused_pane_id() {
            self.remove_pane(id);
        }
    }

    pub fn focus_pane(&mut self, pane_id: PaneId) {
        if !self.contains(pane_id) || self.focused_pane_id() == Some(pane_id) {
            return;
        }
        self.set_focus(pane_id);
    }

    /// Moves focus to the adjacent pane in `direction`; unchanged at an edge.
    pub fn navigate_pane(&mut self, direction: Direction) {
        let Some(current) = self.focused_pane_id() else {
            return;
        };
        let rects = self.tile(Size::unit());
        if let Some(target) = geometry::neighbor(&rects, current, direction) {
            self.focus_pane(target);
        }
    }

    pub fn next_pane(&self, current: PaneId) -> Option<PaneId> {
        let pos = self.index_of(current)?;
        Some(self.panes[(pos + 1) % self.panes.len()].id)
    }

    pub fn prev_pane(&self, current: PaneId) -> Option<PaneId> {
        let pos = self.index_of(current)?;
        Some(self.panes[(pos + self.panes.len() - 1) % self.panes.len()].id)
    }

    pub fn focus_next(&mut self) {
        if let Some(id) = self.focused_pane_id().and_then(|c| self.next_pane(c)) {
            self.focus_pane(id);
        }
    }

    pub fn focus_prev(&mut self) {
        if let Some(id) = self.focused_pane_id().and_then(|c| self.prev_pane(c)) {
            self.focus_pane(id);
        }
    }

    /// Pixel rectangle of every pane inside a `width` x `height` container.
    /// Panes never shrink below `min_pane_size`; a container too small to hold
    /// them yields overlapping rectangles rather than empty ones.
    pub fn calculate_pane_dimensions(
        &self,
        container_width: f32,
        container_height: f32,
    ) -> IndexMap<PaneId, PaneRect> {
        let container = Size::new(container_width.max(0.0), container_height.max(0.0));
        let min = self.config.min_pane_size.max(1.0);
        self.tile(container)
            .into_iter()
            .map(|(id, mut rect)| {
                rect.width = rect.width.max(min);
                rect.height = rect.height.max(min);
                (id, rect)
            })
            .collect()
    }

    pub fn set_container_size(&mut self, size: Size) {
        self.container = size;
        let clamped = self.clamp_ratio(self.layout.ratio);
        self.store_ratio(clamped);
    }

    /// Valid split ratio range (percent) for the current container.
    pub fn ratio_bounds(&self) -> (f32, f32) {
        let axis = match self.layout.direction {
            SplitDirection::Vertical => self.container.width,
            SplitDirection::Horizontal => self.container.height,
        };
        if axis <= 0.0 {
            return (10.0, 90.0);
        }
        let min = (self.config.min_pane_size / axis * 100.0).clamp(0.0, 50.0);
        (min, 100.0 - min)
    }

    pub fn update_split_ratio(&mut self, new_ratio: f32) {
        if !new_ratio.is_finite() {
            debug!(new_ratio, "ignoring non-finite split ratio");
            return;
        }
        let clamped = self.clamp_ratio(new_ratio);
        self.store_ratio(clamped);
    }

    pub fn adjust_split_ratio(&mut self, delta: f32) {
        self.update_split_ratio(self.layout.ratio + delta);
    }

    /// Resets to a canonical arrangement. Existing panes are kept in creation
    /// order up to the preset's pane count; extra panes are dropped and missing
    /// ones created. Focus stays put if its pane survives.
    pub fn apply_preset(&mut self, preset: Preset) {
        let (count, direction) = match preset {
            Preset::Single => (1, None),
            Preset::Vertical => (2, Some(SplitDirection::Vertical)),
            Preset::Horizontal => (2, Some(SplitDirection::Horizontal)),
            Preset::Quad => (4, None),
        };
        let focused = self.focused_pane_id();
        if self.panes.len() > count {
            let removed: Vec<PaneId> = self.panes.drain(count..).map(|p| p.id).collect();
            self.events
                .extend(removed.into_iter().map(LayoutEvent::PaneRemoved));
        }
        while self.panes.len() < count {
            let id = self.alloc_id();
            self.panes.push(new_pane(id, PaneOptions::default()));
            self.events.push(LayoutEvent::PaneCreated(id));
        }
        if let Some(direction) = direction {
            self.layout.direction = direction;
        }
        let ratio = self.clamp_ratio(self.config.default_ratio);
        self.store_ratio(ratio);

        match focused {
            Some(id) if self.contains(id) => {}
            _ => {
                let first = self.panes[0].id;
                self.set_focus(first);
            }
        }
        let kind = self.layout.kind;
        self.reflow();
        if self.layout.kind == kind {
            self.events.push(LayoutEvent::LayoutChanged(kind));
        }
        debug!(?preset, count = self.panes.len(), "layout preset applied");
    }

    pub fn bind_session(&mut self, pane_id: PaneId, session_id: impl Into<String>) {
        if let Some(idx) = self.index_of(pane_id) {
            self.panes[idx].session_id = Some(session_id.into());
        }
    }

    /// Replaces the whole pane set from an already validated snapshot.
    pub(crate) fn restore(&mut self, layout: Layout, panes: Vec<Pane>, active: PaneId) {
        let max_id = panes.iter().map(|p| p.id).max().unwrap_or(0);
        self.panes = panes;
        self.panes.iter_mut().for_each(|p| p.focused = p.id == active);
        self.layout = layout;
        self.layout.ratio = self.clamp_ratio(layout.ratio);
        self.next_id = self.next_id.max(max_id + 1);
        self.reflow();
        self.events.push(LayoutEvent::LayoutChanged(self.layout.kind));
    }

    fn tile(&self, container: Size) -> Vec<(PaneId, PaneRect)> {
        geometry::tile(
            &self.pane_ids(),
            self.layout.kind,
            self.layout.direction,
            self.layout.ratio,
            container,
        )
    }

    /// Recomputes layout kind and grid positions from the pane list.
    fn reflow(&mut self) {
        let kind = match self.panes.len() {
            0 | 1 => LayoutKind::Single,
            2 => LayoutKind::Split,
            _ => LayoutKind::Grid,
        };
        if kind != self.layout.kind {
            self.layout.kind = kind;
            self.events.push(LayoutEvent::LayoutChanged(kind));
        }
        let cols = match kind {
            LayoutKind::Single => 1,
            LayoutKind::Split => match self.layout.direction {
                SplitDirection::Vertical => 2,
                SplitDirection::Horizontal => 1,
            },
            LayoutKind::Grid => geometry::grid_columns(self.panes.len()),
        };
        for (i, pane) in self.panes.iter_mut().enumerate() {
            pane.position = PanePosition {
                row: i / cols,
                col: i % cols,
            };
        }
    }

    fn set_focus(&mut self, id: PaneId) {
        let from = self.focused_pane_id();
        self.panes.iter_mut().for_each(|p| p.focused = p.id == id);
        self.events.push(LayoutEvent::FocusChanged { from, to: id });
    }

    fn clamp_ratio(&self, ratio: f32) -> f32 {
        let (min, max) = self.ratio_bounds();
        ratio.clamp(min, max)
    }

    fn store_ratio(&mut self, ratio: f32) {
        if (ratio - self.layout.ratio).abs() > f32::EPSILON {
            self.layout.ratio = ratio;
            self.events.push(LayoutEvent::RatioChanged(ratio));
        }
    }

    fn alloc_id(&mut self) -> PaneId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: PaneId) -> Option<usize> {
        self.panes.iter().position(|p| p.id == id)
    }

    fn snapshot_pane(&self, id: PaneId) -> Pane {
        self.pane(id)
            .cloned()
            .unwrap_or_else(|| new_pane(id, PaneOptions::default()))
    }
}

impl Default for PaneManager {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

fn new_pane(id: PaneId, opts: PaneOptions) -> Pane {
    Pane {
        id,
        title: opts.title.unwrap_or_else(|| format!("Terminal {id}")),
        position: PanePosition::default(),
        focused: false,
        session_id: opts.session_id,
    }
}
