//! Geometry and placement value types
//!
//! Everything here serializes in the same shape the on-disk document uses:
//! rects as `[left, top, right, bottom]` arrays and placements as the
//! 5-element `[flags, show_cmd, [x, y], [x, y], rect]` tuple that mirrors
//! the OS window-placement record.

use serde::{Deserialize, Serialize};

use crate::constants::positioning::BASE_DPI;

/// (width, height) in pixels
pub type Size = (i32, i32);

/// (x, y) in desktop-space coordinates
pub type Point = (i32, i32);

/// Native window handle. Only meaningful for the lifetime of the owning
/// process; never stable across reboots.
pub type WindowId = i64;

/// Screen-space rectangle. `right`/`bottom` are exclusive edges, so a
/// window covering a 1080p display at the origin is `(0, 0, 1920, 1080)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Size {
        (self.width(), self.height())
    }

    pub fn top_left(&self) -> Point {
        (self.left, self.top)
    }

    pub fn center(&self) -> Point {
        (self.left + self.width() / 2, self.top + self.height() / 2)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.0 >= self.left && point.0 < self.right && point.1 >= self.top && point.1 < self.bottom
    }

    /// Rect with the same top-left corner and the given size
    pub fn with_size(&self, size: Size) -> Self {
        Self::new(self.left, self.top, self.left + size.0, self.top + size.1)
    }

    pub fn from_point_and_size(point: Point, size: Size) -> Self {
        Self::new(point.0, point.1, point.0 + size.0, point.1 + size.1)
    }

    /// Degenerate rects are reported by windows that are not really on
    /// screen (destroyed mid-enumeration, special shell windows)
    pub fn is_degenerate(&self) -> bool {
        *self == Rect::new(0, 0, 0, 0)
    }
}

impl From<[i32; 4]> for Rect {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.left, r.top, r.right, r.bottom]
    }
}

/// Window show state, stored as the raw OS `show_cmd` value so unknown
/// states round-trip untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum ShowState {
    Normal,
    Minimized,
    Maximized,
    Other(u32),
}

impl From<u32> for ShowState {
    fn from(raw: u32) -> Self {
        match raw {
            1 => ShowState::Normal,
            2 => ShowState::Minimized,
            3 => ShowState::Maximized,
            other => ShowState::Other(other),
        }
    }
}

impl From<ShowState> for u32 {
    fn from(state: ShowState) -> Self {
        match state {
            ShowState::Normal => 1,
            ShowState::Minimized => 2,
            ShowState::Maximized => 3,
            ShowState::Other(other) => other,
        }
    }
}

/// OS window-placement snapshot. A minimized or maximized window's live
/// rect is degenerate or display-sized; `normal_position` is where the
/// window goes back to when restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlacementRepr", into = "PlacementRepr")]
pub struct Placement {
    pub flags: u32,
    pub show_cmd: ShowState,
    pub min_position: Point,
    pub max_position: Point,
    pub normal_position: Rect,
}

type PlacementRepr = (u32, u32, Point, Point, [i32; 4]);

impl Placement {
    /// Placement for a plain visible window at `rect`
    pub fn normal(rect: Rect) -> Self {
        Self {
            flags: 0,
            show_cmd: ShowState::Normal,
            min_position: (-1, -1),
            max_position: (-1, -1),
            normal_position: rect,
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.show_cmd == ShowState::Minimized
    }

    pub fn is_maximized(&self) -> bool {
        self.show_cmd == ShowState::Maximized
    }

    /// Same placement with a different restored rect
    pub fn with_normal_position(&self, rect: Rect) -> Self {
        Self { normal_position: rect, ..*self }
    }
}

impl From<PlacementRepr> for Placement {
    fn from((flags, show_cmd, min_position, max_position, normal_position): PlacementRepr) -> Self {
        Self {
            flags,
            show_cmd: show_cmd.into(),
            min_position,
            max_position,
            normal_position: normal_position.into(),
        }
    }
}

impl From<Placement> for PlacementRepr {
    fn from(p: Placement) -> Self {
        (
            p.flags,
            p.show_cmd.into(),
            p.min_position,
            p.max_position,
            p.normal_position.into(),
        )
    }
}

/// Scale a pixel measure for a monitor's DPI.
/// DPI / baseline = scaling factor, eg: 144 / 96 = 1.5 = 150% in display
/// settings.
pub fn dpi_scale(x: i32, dpi: u32) -> i32 {
    (x as f64 / (dpi as f64 / BASE_DPI as f64)) as i32
}
