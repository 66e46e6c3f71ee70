//! Background workers
//!
//! Three independent threads drive the engine: a periodic capture loop,
//! a display-configuration watcher that triggers restores, and a
//! new-window watcher. Each polls with bounded sleeps and checks a
//! shared stop flag, so shutdown is prompt and the engine itself never
//! schedules anything.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::engine::{Engine, RestoreTarget};
use crate::geometry::WindowId;
use crate::model::{Display, Window};

/// Sleep for `seconds` in one-second slices, returning false as soon as
/// the stop flag is raised
fn sleep_unless_stopped(stop: &AtomicBool, seconds: u64) -> bool {
    for _ in 0..seconds.max(1) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(Duration::from_secs(1));
    }
    !stop.load(Ordering::Relaxed)
}

/// Periodically capture the desktop and persist the store every
/// `save_freq` captures
pub fn spawn_capture_loop(engine: Arc<Engine>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("capture loop started");
        let mut unsaved = 0u32;
        while !stop.load(Ordering::Relaxed) {
            if !engine.settings().pause_snapshots {
                match engine.update() {
                    Ok(()) => unsaved += 1,
                    Err(err) => error!(%err, "capture failed"),
                }
            }
            if unsaved >= engine.settings().save_freq {
                match engine.save() {
                    Ok(()) => unsaved = 0,
                    Err(err) => error!(%err, "failed to save snapshot store"),
                }
            }
            if !sleep_unless_stopped(&stop, engine.settings().snapshot_freq) {
                break;
            }
        }
        info!("capture loop stopped");
    })
}

/// Watch for display topology changes (hot-plug, resolution switches,
/// wake-from-sleep) and restore the matching layout when one lands
pub fn spawn_display_watcher(engine: Arc<Engine>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("display watcher started");
        let mut last: Option<Vec<Display>> = None;
        while !stop.load(Ordering::Relaxed) {
            match engine.displays() {
                Ok(current) => {
                    if let Some(previous) = &last {
                        if *previous != current {
                            info!(
                                from = previous.len(),
                                to = current.len(),
                                "display configuration changed"
                            );
                            if let Err(err) = engine.restore(RestoreTarget::MostRecent) {
                                error!(%err, "restore after display change failed");
                            }
                        }
                    }
                    last = Some(current);
                }
                Err(err) => error!(%err, "failed to enumerate displays"),
            }
            if !sleep_unless_stopped(&stop, engine.settings().poll_freq) {
                break;
            }
        }
        info!("display watcher stopped");
    })
}

/// Watch for freshly spawned windows and hand them to the engine for
/// last-known-position placement
pub fn spawn_window_watcher(engine: Arc<Engine>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("window watcher started");
        let mut known: HashSet<WindowId> = HashSet::new();
        let mut baselined = false;
        while !stop.load(Ordering::Relaxed) {
            match engine.windows() {
                Ok(windows) => {
                    let fresh = track_new_windows(&mut known, &windows);
                    if baselined {
                        for window in fresh {
                            if let Err(err) = engine.handle_new_window(&window) {
                                error!(window = %window.name, %err, "failed to place new window");
                            }
                        }
                    }
                    baselined = true;
                }
                Err(err) => error!(%err, "failed to enumerate windows"),
            }
            if !sleep_unless_stopped(&stop, engine.settings().poll_freq) {
                break;
            }
        }
        info!("window watcher stopped");
    })
}

/// Update the known-handle set and return windows seen for the first
/// time. Closed handles are forgotten so a recycled handle counts as a
/// new window again.
fn track_new_windows(known: &mut HashSet<WindowId>, windows: &[Window]) -> Vec<Window> {
    let live: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();
    known.retain(|id| live.contains(id));
    windows.iter().filter(|w| known.insert(w.id)).cloned().collect()
}
