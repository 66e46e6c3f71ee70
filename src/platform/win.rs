//! Win32 window system
//!
//! Wraps the user32/dwmapi calls behind `WinSystem`. Helpers return
//! `Option` and enumeration skips windows it cannot fully resolve, so a
//! window dying mid-enumeration never aborts a capture.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;
use windows::core::{BOOL, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HWND, LPARAM, MAX_PATH, POINT, RECT};
use windows::Win32::Graphics::Dwm::{
    DwmGetWindowAttribute, DWMWA_CLOAKED, DWMWA_EXTENDED_FRAME_BOUNDS,
};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayDevicesW, EnumDisplayMonitors, GetMonitorInfoW, MonitorFromPoint, DISPLAY_DEVICEW,
    HDC, HMONITOR, MONITORINFO, MONITORINFOEXW, MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_FORMAT, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetCursorPos, GetSystemMetrics, GetWindowLongW,
    GetWindowPlacement, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId, IsWindow,
    IsWindowVisible, MoveWindow, SetWindowPlacement, ShowWindow, GWL_STYLE, SM_CXSIZEFRAME,
    SM_CYSIZEFRAME, SW_SHOWNORMAL, WINDOWPLACEMENT, WINDOWPLACEMENT_FLAGS, WS_THICKFRAME,
};

use crate::geometry::{Placement, Point, Rect, Size, WindowId};
use crate::model::{Display, Window};

use super::WinSystem;

/// Flag for EnumDisplayDevicesW to return the device interface path,
/// which carries the stable hardware UID
const EDD_GET_DEVICE_INTERFACE_NAME: u32 = 1;

pub struct Win32System;

impl Win32System {
    pub fn new() -> Self {
        Self
    }
}

fn hwnd(id: WindowId) -> HWND {
    HWND(id as isize as *mut core::ffi::c_void)
}

fn rect_from(r: RECT) -> Rect {
    Rect::new(r.left, r.top, r.right, r.bottom)
}

fn rect_to(r: Rect) -> RECT {
    RECT { left: r.left, top: r.top, right: r.right, bottom: r.bottom }
}

fn get_window_title(handle: HWND) -> Option<String> {
    let mut buffer = [0u16; 512];
    let length = unsafe { GetWindowTextW(handle, &mut buffer) };
    if length > 0 {
        Some(String::from_utf16_lossy(&buffer[..length as usize]))
    } else {
        None
    }
}

fn get_executable(handle: HWND) -> Option<String> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(handle, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }

    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;
    let mut buffer = [0u16; MAX_PATH as usize];
    let mut size = buffer.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_FORMAT::default(),
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        )
    };
    unsafe { CloseHandle(process) }.ok();

    if result.is_ok() {
        Some(OsString::from_wide(&buffer[..size as usize]).to_string_lossy().into_owned())
    } else {
        None
    }
}

fn get_placement(handle: HWND) -> Option<Placement> {
    let mut wp = WINDOWPLACEMENT {
        length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
        ..WINDOWPLACEMENT::default()
    };
    unsafe { GetWindowPlacement(handle, &mut wp) }.ok()?;
    Some(Placement {
        flags: wp.flags.0,
        show_cmd: wp.showCmd.into(),
        min_position: (wp.ptMinPosition.x, wp.ptMinPosition.y),
        max_position: (wp.ptMaxPosition.x, wp.ptMaxPosition.y),
        normal_position: rect_from(wp.rcNormalPosition),
    })
}

fn is_resizable(handle: HWND) -> bool {
    let style = unsafe { GetWindowLongW(handle, GWL_STYLE) };
    style & WS_THICKFRAME.0 as i32 != 0
}

fn is_cloaked(handle: HWND) -> bool {
    let mut cloaked = 0i32;
    let result = unsafe {
        DwmGetWindowAttribute(
            handle,
            DWMWA_CLOAKED,
            &mut cloaked as *mut i32 as *mut core::ffi::c_void,
            std::mem::size_of::<i32>() as u32,
        )
    };
    result.is_ok() && cloaked != 0
}

/// Build a `Window` from a live handle, or `None` for handles that are
/// invisible, untitled, degenerate or cloaked
fn resolve_window(handle: HWND) -> Option<Window> {
    if !unsafe { IsWindowVisible(handle) }.as_bool() {
        return None;
    }
    let name = get_window_title(handle)?;
    let mut r = RECT::default();
    unsafe { GetWindowRect(handle, &mut r) }.ok()?;
    let rect = rect_from(r);
    if rect.is_degenerate() {
        return None;
    }
    if is_cloaked(handle) {
        return None;
    }
    let executable = get_executable(handle)?;
    let placement = get_placement(handle)?;
    Some(Window {
        id: handle.0 as isize as WindowId,
        name,
        executable,
        size: rect.size(),
        rect,
        placement,
        resizable: is_resizable(handle),
    })
}

unsafe extern "system" fn enum_windows_callback(handle: HWND, lparam: LPARAM) -> BOOL {
    let windows = unsafe { &mut *(lparam.0 as *mut Vec<Window>) };
    if let Some(window) = resolve_window(handle) {
        windows.push(window);
    }
    true.into()
}

unsafe extern "system" fn enum_monitors_callback(
    monitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = unsafe { &mut *(lparam.0 as *mut Vec<HMONITOR>) };
    monitors.push(monitor);
    true.into()
}

/// Resolve one monitor to a `Display` via its adapter's device
/// interface path, eg:
/// `\\?\DISPLAY#GSM5BBF#5&9598e04&0&UID4352#{e6f07b5f-...}`
fn resolve_display(monitor: HMONITOR, uid_pattern: &Regex) -> Option<Display> {
    let mut info = MONITORINFOEXW {
        monitorInfo: MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFOEXW>() as u32,
            ..MONITORINFO::default()
        },
        ..MONITORINFOEXW::default()
    };
    let ok = unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut MONITORINFO) };
    if !ok.as_bool() {
        return None;
    }
    let rect = rect_from(info.monitorInfo.rcMonitor);

    for adaptor_index in 0..5 {
        let mut device = DISPLAY_DEVICEW {
            cb: std::mem::size_of::<DISPLAY_DEVICEW>() as u32,
            ..DISPLAY_DEVICEW::default()
        };
        let found = unsafe {
            EnumDisplayDevicesW(
                PCWSTR(info.szDevice.as_ptr()),
                adaptor_index,
                &mut device,
                EDD_GET_DEVICE_INTERFACE_NAME,
            )
        };
        if !found.as_bool() {
            continue;
        }
        let device_id = String::from_utf16_lossy(&device.DeviceID)
            .trim_end_matches('\0')
            .to_string();
        let Some(uid) = uid_pattern.find(&device_id) else {
            continue;
        };
        let Some(name) = device_id.split('#').nth(1) else {
            continue;
        };
        return Some(Display {
            uid: uid.as_str().to_string(),
            name: name.to_string(),
            resolution: rect.size(),
            rect,
            comparison_params: Default::default(),
        });
    }
    None
}

impl WinSystem for Win32System {
    fn windows(&self) -> Result<Vec<Window>> {
        let mut windows: Vec<Window> = Vec::new();
        unsafe {
            EnumWindows(Some(enum_windows_callback), LPARAM(&mut windows as *mut _ as isize))
        }
        .context("EnumWindows failed")?;
        debug!(count = windows.len(), "enumerated windows");
        Ok(windows)
    }

    fn displays(&self) -> Result<Vec<Display>> {
        let uid_pattern = Regex::new(r"UID[0-9]+").context("bad uid pattern")?;
        let mut monitors: Vec<HMONITOR> = Vec::new();
        let ok = unsafe {
            EnumDisplayMonitors(
                None,
                None,
                Some(enum_monitors_callback),
                LPARAM(&mut monitors as *mut _ as isize),
            )
        };
        if !ok.as_bool() {
            anyhow::bail!("EnumDisplayMonitors failed");
        }
        Ok(monitors.into_iter().filter_map(|m| resolve_display(m, &uid_pattern)).collect())
    }

    fn is_window(&self, id: WindowId) -> bool {
        unsafe { IsWindow(Some(hwnd(id))) }.as_bool()
    }

    fn window_rect(&self, id: WindowId) -> Result<Rect> {
        let mut r = RECT::default();
        unsafe { GetWindowRect(hwnd(id), &mut r) }
            .with_context(|| format!("GetWindowRect failed for window {id}"))?;
        Ok(rect_from(r))
    }

    fn move_window(&self, id: WindowId, pos: Point, size: Size, repaint: bool) -> Result<()> {
        unsafe { MoveWindow(hwnd(id), pos.0, pos.1, size.0, size.1, repaint) }
            .with_context(|| format!("MoveWindow failed for window {id}"))
    }

    fn set_placement(&self, id: WindowId, placement: &Placement) -> Result<()> {
        let wp = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            flags: WINDOWPLACEMENT_FLAGS(placement.flags),
            showCmd: placement.show_cmd.into(),
            ptMinPosition: POINT { x: placement.min_position.0, y: placement.min_position.1 },
            ptMaxPosition: POINT { x: placement.max_position.0, y: placement.max_position.1 },
            rcNormalPosition: rect_to(placement.normal_position),
        };
        unsafe { SetWindowPlacement(hwnd(id), &wp) }
            .with_context(|| format!("SetWindowPlacement failed for window {id}"))
    }

    fn focus_window(&self, id: WindowId) -> Result<()> {
        unsafe { BringWindowToTop(hwnd(id)) }
            .with_context(|| format!("BringWindowToTop failed for window {id}"))?;
        let _ = unsafe { ShowWindow(hwnd(id), SW_SHOWNORMAL) };
        Ok(())
    }

    fn cursor_pos(&self) -> Result<Point> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }.context("GetCursorPos failed")?;
        Ok((point.x, point.y))
    }

    fn dpi_for_point(&self, point: Point) -> u32 {
        let monitor = unsafe {
            MonitorFromPoint(POINT { x: point.0, y: point.1 }, MONITOR_DEFAULTTONEAREST)
        };
        let (mut dpi_x, mut dpi_y) = (96u32, 96u32);
        if unsafe { GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) }.is_err() {
            return 96;
        }
        dpi_x
    }

    fn work_area_at(&self, point: Point) -> Rect {
        let monitor = unsafe {
            MonitorFromPoint(POINT { x: point.0, y: point.1 }, MONITOR_DEFAULTTONEAREST)
        };
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..MONITORINFO::default()
        };
        if unsafe { GetMonitorInfoW(monitor, &mut info) }.as_bool() {
            // work area rather than total monitor area so windows are
            // not moved under the taskbar
            rect_from(info.rcWork)
        } else {
            Rect::new(0, 0, 0, 0)
        }
    }

    fn frame_thickness(&self, id: WindowId) -> i32 {
        let mut extended = RECT::default();
        let ok = unsafe {
            DwmGetWindowAttribute(
                hwnd(id),
                DWMWA_EXTENDED_FRAME_BOUNDS,
                &mut extended as *mut RECT as *mut core::ffi::c_void,
                std::mem::size_of::<RECT>() as u32,
            )
        };
        let mut window = RECT::default();
        if ok.is_err() || unsafe { GetWindowRect(hwnd(id), &mut window) }.is_err() {
            return self.default_frame_thickness();
        }
        // the process is per-monitor DPI aware, so extended frame bounds
        // compare directly against GetWindowRect
        [
            extended.left - window.left,
            extended.top - window.top,
            extended.right - window.right,
            extended.bottom - window.bottom,
        ]
        .into_iter()
        .map(i32::abs)
        .max()
        .unwrap_or(0)
    }

    fn default_frame_thickness(&self) -> i32 {
        // the visible border offset is about twice CXSIZEFRAME
        let frame = unsafe {
            GetSystemMetrics(SM_CXSIZEFRAME).max(GetSystemMetrics(SM_CYSIZEFRAME))
        };
        frame * 2
    }
}
