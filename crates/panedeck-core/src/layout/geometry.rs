use serde::Serialize;

use super::{Direction, LayoutKind, PaneId, SplitDirection};

const EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaneRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PaneRect {
    fn right(&self) -> f32 {
        self.x + self.width
    }

    fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub(crate) fn unit() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Smallest column count whose square holds `count` cells.
pub(crate) fn grid_columns(count: usize) -> usize {
    let mut cols = 1;
    while cols * cols < count {
        cols += 1;
    }
    cols
}

/// Tiles `container` for the panes in `ids` (creation order). The last piece
/// along each axis takes the remainder so the tiling has no gaps.
pub(crate) fn tile(
    ids: &[PaneId],
    kind: LayoutKind,
    direction: SplitDirection,
    ratio: f32,
    container: Size,
) -> Vec<(PaneId, PaneRect)> {
    let full = PaneRect {
        x: 0.0,
        y: 0.0,
        width: container.width,
        height: container.height,
    };
    match (kind, ids) {
        (_, []) => Vec::new(),
        (LayoutKind::Single, [id, ..]) => vec![(*id, full)],
        (LayoutKind::Split, [first, second]) => {
            let (a, b) = split_rect(&full, direction, ratio / 100.0);
            vec![(*first, a), (*second, b)]
        }
        _ => tile_grid(ids, &full),
    }
}

fn split_rect(rect: &PaneRect, direction: SplitDirection, fraction: f32) -> (PaneRect, PaneRect) {
    match direction {
        // side by side
        SplitDirection::Vertical => {
            let first_w = rect.width * fraction;
            (
                PaneRect {
                    width: first_w,
                    ..*rect
                },
                PaneRect {
                    x: rect.x + first_w,
                    width: rect.width - first_w,
                    ..*rect
                },
            )
        }
        // stacked
        SplitDirection::Horizontal => {
            let first_h = rect.height * fraction;
            (
                PaneRect {
                    height: first_h,
                    ..*rect
                },
                PaneRect {
                    y: rect.y + first_h,
                    height: rect.height - first_h,
                    ..*rect
                },
            )
        }
    }
}

fn tile_grid(ids: &[PaneId], full: &PaneRect) -> Vec<(PaneId, PaneRect)> {
    let cols = grid_columns(ids.len());
    let rows = ids.len().div_ceil(cols);
    let cell_h = full.height / rows as f32;
    let mut out = Vec::with_capacity(ids.len());
    for (row, chunk) in ids.chunks(cols).enumerate() {
        let y = full.y + cell_h * row as f32;
        let height = if row + 1 == rows {
            full.bottom() - y
        } else {
            cell_h
        };
        // A short last row stretches its panes across the full width.
        let cell_w = full.width / chunk.len() as f32;
        for (col, id) in chunk.iter().enumerate() {
            let x = full.x + cell_w * col as f32;
            let width = if col + 1 == chunk.len() {
                full.right() - x
            } else {
                cell_w
            };
            out.push((
                *id,
                PaneRect {
                    x,
                    y,
                    width,
                    height,
                },
            ));
        }
    }
    out
}

/// Nearest rect in `direction` from `from` that overlaps it on the
/// perpendicular axis. Ties go to the earliest pane in `rects`.
pub(crate) fn neighbor(
    rects: &[(PaneId, PaneRect)],
    from: PaneId,
    direction: Direction,
) -> Option<PaneId> {
    let current = rects.iter().find(|(id, _)| *id == from).map(|(_, r)| *r)?;
    let mut best: Option<(f32, PaneId)> = None;
    for (id, rect) in rects {
        if *id == from {
            continue;
        }
        let distance = match direction {
            Direction::Right if rect.x >= current.right() - EPSILON => rect.x - current.right(),
            Direction::Left if rect.right() <= current.x + EPSILON => current.x - rect.right(),
            Direction::Down if rect.y >= current.bottom() - EPSILON => rect.y - current.bottom(),
            Direction::Up if rect.bottom() <= current.y + EPSILON => current.y - rect.bottom(),
            _ => continue,
        };
        let overlaps = match direction {
            Direction::Left | Direction::Right => {
                rect.y < current.bottom() - EPSILON && rect.bottom() > current.y + EPSILON
            }
            Direction::Up | Direction::Down => {
                rect.x < current.right() - EPSILON && rect.right() > current.x + EPSILON
            }
        };
        if !overlaps {
            continue;
        }
        match best {
            Some((d, _)) if d <= distance + EPSILON => {}
            _ => best = Some((distance, *id)),
        }
    }
    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_columns_is_ceil_sqrt() {
        let cols: Vec<_> = (1..=10).map(grid_columns).collect();
        assert_eq!(cols, vec![1, 2, 2, 2, 3, 3, 3, 3, 3, 4]);
    }

    #[test]
    fn short_grid_row_fills_width() {
        let rects = tile(
            &[1, 2, 3],
            LayoutKind::Grid,
            SplitDirection::Vertical,
            50.0,
            Size::new(800.0, 600.0),
        );
        assert_eq!(rects.len(), 3);
        let last = rects[2].1;
        assert!((last.x - 0.0).abs() < f32::EPSILON);
        assert!((last.width - 800.0).abs() < f32::EPSILON);
        assert!((last.y - 300.0).abs() < f32::EPSILON);
        let total: f32 = rects.iter().map(|(_, r)| r.area()).sum();
        assert!((total - 800.0 * 600.0).abs() < 1.0);
    }

    #[test]
    fn horizontal_split_stacks() {
        let rects = tile(
            &[1, 2],
            LayoutKind::Split,
            SplitDirection::Horizontal,
            25.0,
            Size::new(400.0, 400.0),
        );
        assert!((rects[0].1.height - 100.0).abs() < f32::EPSILON);
        assert!((rects[1].1.y - 100.0).abs() < f32::EPSILON);
        assert!((rects[1].1.height - 300.0).abs() < f32::EPSILON);
        assert!((rects[1].1.width - 400.0).abs() < f32::EPSILON);
    }

    #[test]
    fn neighbor_requires_perpendicular_overlap() {
        let rects = tile(
            &[1, 2, 3, 4],
            LayoutKind::Grid,
            SplitDirection::Vertical,
            50.0,
            Size::unit(),
        );
        assert_eq!(neighbor(&rects, 4, Direction::Up), Some(2));
        assert_eq!(neighbor(&rects, 4, Direction::Left), Some(3));
        assert_eq!(neighbor(&rects, 1, Direction::Up), None);
        assert_eq!(neighbor(&rects, 1, Direction::Left), None);
        assert_eq!(neighbor(&rects, 9, Direction::Left), None);
    }
}
