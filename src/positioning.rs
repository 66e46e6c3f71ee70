//! Window positioning
//!
//! Applies a target rect and placement to a live window. Failures from
//! the underlying OS calls are logged and swallowed: positioning one
//! window must never abort the batch it is part of.

use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::constants::positioning::{CHURN_DELAY_MS, MOVE_ATTEMPTS};
use crate::geometry::{dpi_scale, Placement, Point, Rect, Size};
use crate::model::{Window, WindowMetrics};
use crate::platform::WinSystem;

/// Clamp `rect` to keep the window on-screen within `bounds`.
///
/// The bottom-right corner is constrained first, then the top-left, so a
/// window larger than the display is pulled fully into view rather than
/// just nudged. The returned rect also has its bottom-right clamped, so
/// oversized windows shrink to the display.
pub fn rebound(rect: Rect, bounds: Rect, offset: i32) -> Rect {
    let (w, h) = rect.size();
    let mut left = rect.left.min(bounds.right - w + offset);
    let mut top = rect.top.min(bounds.bottom - h + offset);
    left = left.max(bounds.left - offset);
    top = top.max(bounds.top - offset);
    Rect {
        left,
        top,
        right: rect.right.min(bounds.right + offset),
        bottom: rect.bottom.min(bounds.bottom + offset),
    }
}

fn current_size(sys: &dyn WinSystem, window: &Window) -> Size {
    sys.window_rect(window.id).map(|r| r.size()).unwrap_or(window.size)
}

/// Move `window` to `coords`, keeping its current size unless `size` is
/// given. Placement is not touched.
///
/// Multi-monitor setups with mixed scaling often ignore the first resize
/// request, so the move is retried up to `MOVE_ATTEMPTS` times with
/// repaints forced from the third attempt. If the window still reports
/// the wrong rect, one "churn" pass (move to a deliberately wrong
/// geometry, wait, move back) clears the stuck state where a window
/// reports restored but displays minimized.
pub fn move_window(sys: &dyn WinSystem, window: &Window, coords: Point, size: Option<Size>) {
    let size = size.unwrap_or_else(|| current_size(sys, window));
    let target = Rect::from_point_and_size(coords, size);
    let frame = sys.frame_thickness(window.id);

    let mut tries = 0;
    let mut fitted = false;
    while tries < MOVE_ATTEMPTS {
        if let Err(err) = sys.move_window(window.id, coords, size, tries > 1) {
            error!(window = window.id, %err, "move failed");
        }
        match sys.window_rect(window.id) {
            Ok(rect) => {
                let mut probe = window.clone();
                probe.rect = rect;
                if probe.fits_rect(target, None, frame) {
                    fitted = true;
                    break;
                }
            }
            Err(err) => {
                error!(window = window.id, %err, "window vanished while moving");
                return;
            }
        }
        tries += 1;
    }

    if !fitted {
        if let Err(err) = sys.move_window(window.id, (size.0, size.1), size, tries > 1) {
            error!(window = window.id, %err, "churn move failed");
        }
        thread::sleep(Duration::from_millis(CHURN_DELAY_MS));
        if let Err(err) = sys.move_window(window.id, coords, size, tries > 1) {
            error!(window = window.id, %err, "churn move failed");
        }
    }

    debug!(window = window.id, ?target, tries, "moved window");
}

/// Set the position, size and placement of a window, correcting for the
/// destination display's DPI and bounds
pub fn set_pos(sys: &dyn WinSystem, window: &Window, rect: Rect, placement: Option<&Placement>) {
    // the window may be moving to a monitor with a different DPI, so the
    // frame offset is scaled for the destination
    let dpi = sys.dpi_for_point(rect.top_left());
    let offset = dpi_scale(sys.frame_thickness(window.id), dpi);

    // pick the destination display from the center point: the top-left
    // may sit out of bounds because of the drop shadow, which would make
    // a nearest-display lookup land on the wrong monitor
    let display_rect = sys.work_area_at(rect.center());
    let rect = rebound(rect, display_rect, offset);

    // preserve width and height of non-resizable windows so dialogs and
    // reminder popups don't get resized as a side effect
    let (w, h) = if window.resizable { rect.size() } else { current_size(sys, window) };
    let rect = rect.with_size((w, h));

    let placement = placement.map(|p| {
        if !window.resizable {
            // keep the unminimised size right for non-resizable windows
            p.with_normal_position(rect)
        } else if p.is_maximized() {
            // rebound the stashed restore rect so dragging the window
            // out of maximised doesn't expand it to a stale size, and
            // DPI-scale it for the destination monitor
            let np = rebound(p.normal_position, display_rect, offset);
            p.with_normal_position(Rect {
                left: dpi_scale(np.left, dpi),
                top: dpi_scale(np.top, dpi),
                right: dpi_scale(np.right, dpi),
                bottom: dpi_scale(np.bottom, dpi),
            })
        } else {
            *p
        }
    });

    if let Some(p) = placement {
        if let Err(err) = sys.set_placement(window.id, &p) {
            error!(window = window.id, name = %window.name, %err, "failed to set placement");
        }
    }
    move_window(sys, window, rect.top_left(), Some((w, h)));
}

/// Center a window around a point, keeping it on screen
pub fn center_on(sys: &dyn WinSystem, window: &Window, coords: Point) {
    let size = current_size(sys, window);
    let top_left = (coords.0 - size.0 / 2, coords.1 - size.1 / 2);
    let bounds = sys.work_area_at(top_left);
    let pos = rebound(Rect::from_point_and_size(top_left, size), bounds, 0).top_left();
    move_window(sys, window, pos, None);
}
