//! In-memory window system for tests
//!
//! Holds a mutable desktop of windows and displays. Moves apply
//! immediately unless a "stubborn" budget is set, which swallows that
//! many move calls first — the same observable behavior as a driver
//! ignoring resize requests on mixed-DPI setups.

use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::geometry::{Placement, Point, Rect, ShowState, Size, WindowId};
use crate::model::{Display, Window};

use super::WinSystem;

#[derive(Debug, Clone, PartialEq)]
pub struct MoveCall {
    pub id: WindowId,
    pub pos: Point,
    pub size: Size,
    pub repaint: bool,
}

#[derive(Default)]
struct MockState {
    windows: Vec<Window>,
    displays: Vec<Display>,
    dpi: u32,
    frame: i32,
    cursor: Point,
    stubborn_moves: u32,
    moves: Vec<MoveCall>,
    placements: Vec<(WindowId, Placement)>,
}

pub struct MockSystem {
    state: Mutex<MockState>,
}

impl MockSystem {
    pub fn new(displays: Vec<Display>, windows: Vec<Window>) -> Self {
        Self {
            state: Mutex::new(MockState {
                windows,
                displays,
                dpi: 96,
                frame: 8,
                ..MockState::default()
            }),
        }
    }

    pub fn set_dpi(&self, dpi: u32) {
        self.state.lock().unwrap().dpi = dpi;
    }

    pub fn set_frame(&self, frame: i32) {
        self.state.lock().unwrap().frame = frame;
    }

    /// Swallow the next `count` move calls without applying them
    pub fn set_stubborn_moves(&self, count: u32) {
        self.state.lock().unwrap().stubborn_moves = count;
    }

    pub fn set_displays(&self, displays: Vec<Display>) {
        self.state.lock().unwrap().displays = displays;
    }

    pub fn add_window(&self, window: Window) {
        self.state.lock().unwrap().windows.push(window);
    }

    pub fn remove_window(&self, id: WindowId) {
        self.state.lock().unwrap().windows.retain(|w| w.id != id);
    }

    pub fn window(&self, id: WindowId) -> Option<Window> {
        self.state.lock().unwrap().windows.iter().find(|w| w.id == id).cloned()
    }

    pub fn moves(&self) -> Vec<MoveCall> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn placements(&self) -> Vec<(WindowId, Placement)> {
        self.state.lock().unwrap().placements.clone()
    }
}

impl WinSystem for MockSystem {
    fn windows(&self) -> Result<Vec<Window>> {
        Ok(self.state.lock().unwrap().windows.clone())
    }

    fn displays(&self) -> Result<Vec<Display>> {
        Ok(self.state.lock().unwrap().displays.clone())
    }

    fn is_window(&self, id: WindowId) -> bool {
        self.state.lock().unwrap().windows.iter().any(|w| w.id == id)
    }

    fn window_rect(&self, id: WindowId) -> Result<Rect> {
        self.state
            .lock()
            .unwrap()
            .windows
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.rect)
            .ok_or_else(|| anyhow!("no such window: {id}"))
    }

    fn move_window(&self, id: WindowId, pos: Point, size: Size, repaint: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.moves.push(MoveCall { id, pos, size, repaint });
        if state.stubborn_moves > 0 {
            state.stubborn_moves -= 1;
            return Ok(());
        }
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| anyhow!("no such window: {id}"))?;
        window.rect = Rect::from_point_and_size(pos, size);
        window.size = size;
        Ok(())
    }

    fn set_placement(&self, id: WindowId, placement: &Placement) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.placements.push((id, *placement));
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| anyhow!("no such window: {id}"))?;
        window.placement = *placement;
        if placement.show_cmd == ShowState::Normal {
            window.rect = placement.normal_position;
            window.size = placement.normal_position.size();
        }
        Ok(())
    }

    fn focus_window(&self, id: WindowId) -> Result<()> {
        if self.is_window(id) {
            Ok(())
        } else {
            Err(anyhow!("no such window: {id}"))
        }
    }

    fn cursor_pos(&self) -> Result<Point> {
        Ok(self.state.lock().unwrap().cursor)
    }

    fn dpi_for_point(&self, _point: Point) -> u32 {
        self.state.lock().unwrap().dpi
    }

    fn work_area_at(&self, point: Point) -> Rect {
        let state = self.state.lock().unwrap();
        if let Some(display) = state.displays.iter().find(|d| d.rect.contains(point)) {
            return display.rect;
        }
        state
            .displays
            .iter()
            .min_by_key(|d| {
                let (cx, cy) = d.rect.center();
                let (dx, dy) = ((cx - point.0) as i64, (cy - point.1) as i64);
                dx * dx + dy * dy
            })
            .map(|d| d.rect)
            .unwrap_or(Rect::new(0, 0, 1920, 1080))
    }

    fn frame_thickness(&self, _id: WindowId) -> i32 {
        self.state.lock().unwrap().frame
    }

    fn default_frame_thickness(&self) -> i32 {
        self.state.lock().unwrap().frame
    }
}
