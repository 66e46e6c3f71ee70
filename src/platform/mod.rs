//! OS window-system seam
//!
//! Everything the engine needs from the OS goes through `WinSystem`, so
//! the core stays testable against an in-memory fake and the Win32 code
//! stays in one place.

use std::sync::Arc;

use anyhow::Result;

use crate::geometry::{Placement, Point, Rect, Size, WindowId};
use crate::model::{Display, Window};

#[cfg(test)]
pub mod mock;
#[cfg(windows)]
pub mod win;

pub trait WinSystem: Send + Sync {
    /// Visible, titled, non-degenerate, non-cloaked top-level windows
    fn windows(&self) -> Result<Vec<Window>>;

    /// Connected physical displays
    fn displays(&self) -> Result<Vec<Display>>;

    /// Whether a native handle still refers to a live window
    fn is_window(&self, id: WindowId) -> bool;

    fn window_rect(&self, id: WindowId) -> Result<Rect>;

    fn move_window(&self, id: WindowId, pos: Point, size: Size, repaint: bool) -> Result<()>;

    fn set_placement(&self, id: WindowId, placement: &Placement) -> Result<()>;

    /// Raise a window to the top of the Z order
    fn focus_window(&self, id: WindowId) -> Result<()>;

    fn cursor_pos(&self) -> Result<Point>;

    /// Effective DPI of the display closest to `point`
    fn dpi_for_point(&self, point: Point) -> u32;

    /// Work area (excludes the taskbar) of the display closest to `point`
    fn work_area_at(&self, point: Point) -> Rect;

    /// Border + drop-shadow thickness of a live window, from its actual
    /// extended frame bounds
    fn frame_thickness(&self, id: WindowId) -> i32;

    /// System-metrics estimate of border + drop-shadow thickness, for
    /// archived windows and rules that have no live handle
    fn default_frame_thickness(&self) -> i32;
}

/// The real window system for this build target
pub fn native() -> Result<Arc<dyn WinSystem>> {
    #[cfg(windows)]
    return Ok(Arc::new(win::Win32System::new()));
    #[cfg(not(windows))]
    anyhow::bail!("window capture and restore require Windows")
}
