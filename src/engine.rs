//! Restoration orchestrator
//!
//! Owns the persisted snapshot store behind one lock; every public entry
//! point acquires it for its full duration, so the capture timer, the
//! display watcher and the spawn watcher can all call in concurrently.
//! Positioning skips windows already at their target, so overlapping
//! restore calls converge instead of fighting.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::geometry::WindowId;
use crate::model::{find_matching_rules, Display, Rule, Window, WindowHistory};
use crate::platform::WinSystem;
use crate::positioning::{center_on, set_pos};
use crate::settings::Settings;
use crate::snapshot::{now, Snapshot};
use crate::store::SnapshotStore;

/// Which history frame a restore should replay
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestoreTarget {
    /// The newest captured frame
    LastCaptured,
    /// The frame last restored (the snapshot's mru), falling back to the
    /// newest capture
    MostRecent,
    /// The frame captured at this exact timestamp, falling back down the
    /// mru chain when missing
    At(f64),
}

pub struct Engine {
    sys: Arc<dyn WinSystem>,
    store: Mutex<SnapshotStore>,
    settings: Settings,
}

impl Engine {
    pub fn new(sys: Arc<dyn WinSystem>, store: SnapshotStore, settings: Settings) -> Self {
        Self { sys, store: Mutex::new(store), settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Live display configuration
    pub fn displays(&self) -> Result<Vec<Display>> {
        self.sys.displays()
    }

    /// Live window list
    pub fn windows(&self) -> Result<Vec<Window>> {
        self.sys.windows()
    }

    /// Read the live displays and windows as a timestamped frame
    pub fn capture(&self) -> Result<(Vec<Display>, WindowHistory)> {
        let displays = self.sys.displays()?;
        let windows = self.sys.windows()?;
        debug!(displays = displays.len(), windows = windows.len(), "captured snapshot");
        Ok((displays, WindowHistory { time: now(), windows }))
    }

    /// Capture and fold the result into the snapshot keyed on the current
    /// display configuration, then squash and prune its history
    pub fn update(&self) -> Result<()> {
        let (displays, frame) = self.capture()?;
        let mut store = self.store.lock().unwrap();
        let index = find_or_create(&mut store, &displays);
        let snapshot = &mut store.snapshots[index];
        snapshot.history.push(frame);
        let alive = |id: WindowId| self.sys.is_window(id);
        snapshot.cleanup(Some(&alive), self.settings.history_ttl as f64, self.settings.history_max);
        Ok(())
    }

    /// Persist the store
    pub fn save(&self) -> Result<()> {
        self.store.lock().unwrap().save()
    }

    /// The snapshot keyed on the current display configuration, created
    /// if this configuration has not been seen before
    pub fn get_current_snapshot(&self) -> Result<Snapshot> {
        let displays = self.sys.displays()?;
        let mut store = self.store.lock().unwrap();
        let index = find_or_create(&mut store, &displays);
        Ok(store.snapshots[index].clone())
    }

    /// Rules visible to a display configuration.
    ///
    /// With no configuration, every rule in the store. Otherwise the
    /// keyed snapshot's own rules plus rules of compatible user layouts;
    /// `exclusive` drops layouts with an empty display list (the Global
    /// sentinel) so only configuration-specific rules remain.
    pub fn get_rules(&self, compatible_with: Option<&[Display]>, exclusive: bool) -> Vec<Rule> {
        let store = self.store.lock().unwrap();
        match compatible_with {
            None => store.snapshots.iter().flat_map(|s| s.rules.iter().cloned()).collect(),
            Some(displays) => gather_rules(&store, displays, exclusive),
        }
    }

    /// Attach a rule to the snapshot keyed on the current configuration,
    /// or to the Global sentinel
    pub fn add_rule(&self, rule: Rule, global: bool) -> Result<()> {
        let displays = self.sys.displays()?;
        let mut store = self.store.lock().unwrap();
        let index = if global {
            store
                .snapshots
                .iter()
                .position(|s| s.is_global())
                .unwrap_or_else(|| {
                    store.snapshots.push(Snapshot::global());
                    store.snapshots.len() - 1
                })
        } else {
            find_or_create(&mut store, &displays)
        };
        store.snapshots[index].rules.push(rule);
        Ok(())
    }

    /// Drop every snapshot's history frames; rules and display lists are
    /// untouched
    pub fn clear_history(&self) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        for snapshot in &mut store.snapshots {
            snapshot.history.clear();
            snapshot.mru = None;
        }
        store.save()
    }

    /// Replay a history frame onto the live windows.
    ///
    /// Each live window gets its exact frame entry (matched by native
    /// handle) when one exists; otherwise the best-ranked rule from this
    /// snapshot and any compatible user layouts. Windows already at
    /// their target are skipped.
    pub fn restore(&self, target: RestoreTarget) -> Result<()> {
        let displays = self.sys.displays()?;
        let live_windows = self.sys.windows()?;
        let mut store = self.store.lock().unwrap();
        let Some(index) = find_snapshot(&store, &displays) else {
            info!("no snapshot for the current display configuration");
            return Ok(());
        };

        let snapshot = &store.snapshots[index];
        let frame = select_frame(snapshot, target);
        let frame_time = frame.map(|f| f.time);
        let frame_windows = frame.map(|f| f.windows.clone()).unwrap_or_default();
        let rules = gather_rules(&store, &displays, false);
        info!(
            frame = ?frame_time,
            windows = frame_windows.len(),
            rules = rules.len(),
            "restoring window positions"
        );

        for live in &live_windows {
            if let Some(item) = frame_windows.iter().find(|w| w.id == live.id) {
                if item.rect.is_degenerate() || live.rect == item.rect {
                    continue;
                }
                debug!(window = %live.name, from = ?live.rect, to = ?item.rect, "restore window");
                set_pos(self.sys.as_ref(), live, item.rect, Some(&item.placement));
            } else if let Some(rule) = find_matching_rules(&rules, live).first() {
                if live.rect == rule.rect {
                    continue;
                }
                debug!(rule = %rule.rule_name, window = %live.name, "apply rule");
                set_pos(self.sys.as_ref(), live, rule.rect, Some(&rule.placement));
            }
        }

        if let Some(time) = frame_time {
            store.snapshots[index].mru = Some(time);
        }
        Ok(())
    }

    /// Position a freshly spawned window from its last known process
    /// instance, falling back to rules, then (optionally) to centering
    /// it on the cursor
    pub fn handle_new_window(&self, live: &Window) -> Result<()> {
        let displays = self.sys.displays()?;
        let store = self.store.lock().unwrap();

        if let Some(index) = find_snapshot(&store, &displays) {
            let snapshot = &store.snapshots[index];
            if let Some(lkp) = snapshot.last_known_process_instance(
                live,
                self.settings.match_by_title,
                self.settings.match_resizability,
            ) {
                info!(window = %live.name, to = ?lkp.rect, "restoring last known position");
                set_pos(self.sys.as_ref(), live, lkp.rect, Some(&lkp.placement));
                return Ok(());
            }
        }

        let rules = gather_rules(&store, &displays, false);
        if let Some(rule) = find_matching_rules(&rules, live).first() {
            info!(rule = %rule.rule_name, window = %live.name, "applying rule to new window");
            set_pos(self.sys.as_ref(), live, rule.rect, Some(&rule.placement));
        } else if self.settings.center_new_windows {
            let cursor = self.sys.cursor_pos()?;
            debug!(window = %live.name, "centering new window on cursor");
            center_on(self.sys.as_ref(), live, cursor);
        }
        Ok(())
    }
}

/// Index of the non-phony snapshot keyed on `displays`
fn find_snapshot(store: &SnapshotStore, displays: &[Display]) -> Option<usize> {
    store
        .snapshots
        .iter()
        .position(|s| !s.is_phony() && s.same_display_config(displays))
}

fn find_or_create(store: &mut SnapshotStore, displays: &[Display]) -> usize {
    find_snapshot(store, displays).unwrap_or_else(|| {
        info!(displays = displays.len(), "new display configuration observed");
        store.snapshots.push(Snapshot::from_displays(displays.to_vec()));
        store.snapshots.len() - 1
    })
}

fn gather_rules(store: &SnapshotStore, displays: &[Display], exclusive: bool) -> Vec<Rule> {
    let mut rules = Vec::new();
    for snapshot in &store.snapshots {
        let include = if snapshot.is_phony() {
            (!exclusive || !snapshot.displays.is_empty()) && snapshot.matches_display_config(displays)
        } else {
            snapshot.same_display_config(displays)
        };
        if include {
            rules.extend(snapshot.rules.iter().cloned());
        }
    }
    rules
}

/// Frame selection chain: explicit timestamp, else the snapshot's mru,
/// else the last captured frame
fn select_frame(snapshot: &Snapshot, target: RestoreTarget) -> Option<&WindowHistory> {
    let by_time = |time: f64| snapshot.history.iter().find(|f| f.time == time);
    match target {
        RestoreTarget::At(time) => by_time(time)
            .or_else(|| {
                warn!(time, "no history frame at requested timestamp");
                snapshot.mru.and_then(by_time)
            })
            .or_else(|| snapshot.history.last()),
        RestoreTarget::MostRecent => snapshot.mru.and_then(by_time).or_else(|| snapshot.history.last()),
        RestoreTarget::LastCaptured => snapshot.history.last(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::model::fixtures::{display, window};
    use crate::platform::mock::MockSystem;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("snapback-engine-{}-{}.json", std::process::id(), name))
    }

    fn engine_with(name: &str, sys: Arc<MockSystem>, settings: Settings) -> Engine {
        Engine::new(sys, SnapshotStore::load(temp_path(name)), settings)
    }

    fn display_a() -> Display {
        display("UID1", "A", Rect::new(0, 0, 1920, 1080))
    }

    fn display_b() -> Display {
        display("UID2", "B", Rect::new(0, 0, 2560, 1440))
    }

    #[test]
    fn test_update_creates_keyed_snapshot() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        let engine = engine_with("keyed", sys, Settings::default());

        engine.update().unwrap();

        let snapshot = engine.get_current_snapshot().unwrap();
        assert_eq!(snapshot.displays, vec![display_a()]);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].windows.len(), 1);
    }

    #[test]
    fn test_update_squashes_identical_frames() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        let engine = engine_with("squash", sys, Settings::default());

        engine.update().unwrap();
        engine.update().unwrap();
        engine.update().unwrap();

        assert_eq!(engine.get_current_snapshot().unwrap().history.len(), 1);
    }

    #[test]
    fn test_update_keeps_diverged_frames() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        let engine = engine_with("diverged", sys.clone(), Settings::default());

        engine.update().unwrap();
        sys.move_window(1, (100, 100), (800, 600), false).unwrap();
        engine.update().unwrap();

        assert_eq!(engine.get_current_snapshot().unwrap().history.len(), 2);
    }

    #[test]
    fn test_new_display_configuration_gets_its_own_snapshot() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        let engine = engine_with("topology", sys.clone(), Settings::default());

        engine.update().unwrap();
        sys.set_displays(vec![display_a(), display_b()]);
        engine.update().unwrap();

        let snapshot = engine.get_current_snapshot().unwrap();
        assert_eq!(snapshot.displays.len(), 2);
        assert_eq!(snapshot.history.len(), 1);
    }

    #[test]
    fn test_restore_repositions_moved_window() {
        let home = Rect::new(0, 0, 800, 600);
        let sys = Arc::new(MockSystem::new(vec![display_a()], vec![window(1, "a", "a.exe", home)]));
        sys.set_frame(0);
        let engine = engine_with("restore", sys.clone(), Settings::default());

        engine.update().unwrap();
        sys.move_window(1, (500, 300), (800, 600), false).unwrap();
        engine.restore(RestoreTarget::LastCaptured).unwrap();

        assert_eq!(sys.window(1).unwrap().rect, home);
        let snapshot = engine.get_current_snapshot().unwrap();
        assert_eq!(snapshot.mru, Some(snapshot.history[0].time));
    }

    #[test]
    fn test_restore_skips_windows_already_in_place() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        let engine = engine_with("noop", sys.clone(), Settings::default());

        engine.update().unwrap();
        engine.restore(RestoreTarget::LastCaptured).unwrap();

        assert!(sys.moves().is_empty());
    }

    #[test]
    fn test_restore_applies_rules_to_unknown_windows() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        sys.set_frame(0);
        let engine = engine_with("rules", sys.clone(), Settings::default());
        engine.update().unwrap();

        let mut rule = Rule::from_rect(Rect::new(100, 100, 700, 500));
        rule.executable = Some(r"notepad\.exe".to_string());
        engine.add_rule(rule, true).unwrap();

        sys.add_window(window(9, "Untitled - Notepad", r"C:\Windows\notepad.exe", Rect::new(0, 0, 640, 480)));
        engine.restore(RestoreTarget::LastCaptured).unwrap();

        assert_eq!(sys.window(9).unwrap().rect, Rect::new(100, 100, 700, 500));
    }

    #[test]
    fn test_restore_explicit_timestamp_selects_frame() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        sys.set_frame(0);
        let engine = engine_with("timestamp", sys.clone(), Settings::default());

        engine.update().unwrap();
        let old = engine.get_current_snapshot().unwrap().history[0].time;
        sys.move_window(1, (300, 200), (800, 600), false).unwrap();
        engine.update().unwrap();

        engine.restore(RestoreTarget::At(old)).unwrap();
        assert_eq!(sys.window(1).unwrap().rect, Rect::new(0, 0, 800, 600));
        assert_eq!(engine.get_current_snapshot().unwrap().mru, Some(old));
    }

    #[test]
    fn test_restore_most_recent_prefers_mru_frame() {
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        sys.set_frame(0);
        let engine = engine_with("mru", sys.clone(), Settings::default());

        engine.update().unwrap();
        let old = engine.get_current_snapshot().unwrap().history[0].time;
        sys.move_window(1, (300, 200), (800, 600), false).unwrap();
        engine.update().unwrap();
        engine.restore(RestoreTarget::At(old)).unwrap();

        // the window drifts again; MostRecent should go back to the
        // frame the user last restored, not the newest capture
        sys.move_window(1, (700, 500), (800, 600), false).unwrap();
        engine.restore(RestoreTarget::MostRecent).unwrap();

        assert_eq!(sys.window(1).unwrap().rect, Rect::new(0, 0, 800, 600));
    }

    #[test]
    fn test_get_rules_exclusive_drops_global_layout_rules() {
        let sys = Arc::new(MockSystem::new(vec![display_a()], Vec::new()));
        let engine = engine_with("exclusive", sys, Settings::default());

        engine.add_rule(Rule::from_rect(Rect::new(0, 0, 100, 100)), true).unwrap();
        let mut local = Rule::from_rect(Rect::new(0, 0, 200, 200));
        local.rule_name = "local".to_string();
        engine.add_rule(local, false).unwrap();

        let displays = [display_a()];
        assert_eq!(engine.get_rules(Some(&displays), false).len(), 2);
        let exclusive = engine.get_rules(Some(&displays), true);
        assert_eq!(exclusive.len(), 1);
        assert_eq!(exclusive[0].rule_name, "local");
        assert_eq!(engine.get_rules(None, false).len(), 2);
    }

    #[test]
    fn test_handle_new_window_restores_last_known_position() {
        let home = Rect::new(100, 100, 900, 700);
        let sys = Arc::new(MockSystem::new(vec![display_a()], vec![window(5, "Inbox - Mail", r"C:\mail.exe", home)]));
        sys.set_frame(0);
        let engine = engine_with("lkp", sys.clone(), Settings::default());

        engine.update().unwrap();

        // the app is closed and reopened under a fresh handle
        sys.remove_window(5);
        let spawned = window(9, "Inbox - Mail", r"C:\mail.exe", Rect::new(0, 0, 640, 480));
        sys.add_window(spawned.clone());
        engine.handle_new_window(&spawned).unwrap();

        assert_eq!(sys.window(9).unwrap().rect, home);
    }

    #[test]
    fn test_handle_new_window_falls_back_to_rules() {
        let sys = Arc::new(MockSystem::new(vec![display_a()], Vec::new()));
        sys.set_frame(0);
        let engine = engine_with("spawn-rule", sys.clone(), Settings::default());

        let mut rule = Rule::from_rect(Rect::new(200, 200, 800, 700));
        rule.executable = Some(r"term\.exe".to_string());
        engine.add_rule(rule, true).unwrap();

        let spawned = window(9, "Terminal", r"C:\term.exe", Rect::new(0, 0, 640, 480));
        sys.add_window(spawned.clone());
        engine.handle_new_window(&spawned).unwrap();

        assert_eq!(sys.window(9).unwrap().rect, Rect::new(200, 200, 800, 700));
    }

    #[test]
    fn test_handle_new_window_centers_on_cursor_when_enabled() {
        let sys = Arc::new(MockSystem::new(vec![display_a()], Vec::new()));
        sys.set_frame(0);
        let settings = Settings { center_new_windows: true, ..Settings::default() };
        let engine = engine_with("spawn-center", sys.clone(), settings);

        let spawned = window(9, "Terminal", r"C:\term.exe", Rect::new(0, 0, 400, 300));
        sys.add_window(spawned.clone());
        engine.handle_new_window(&spawned).unwrap();

        // cursor sits at the mock default (0, 0); rebound keeps the
        // window on screen
        assert_eq!(sys.window(9).unwrap().rect, Rect::new(0, 0, 400, 300));
    }

    #[test]
    fn test_clear_history() {
        let path = temp_path("clear");
        let sys = Arc::new(MockSystem::new(
            vec![display_a()],
            vec![window(1, "a", "a.exe", Rect::new(0, 0, 800, 600))],
        ));
        let engine = Engine::new(sys, SnapshotStore::load(path.clone()), Settings::default());

        engine.update().unwrap();
        engine.clear_history().unwrap();

        assert!(engine.get_current_snapshot().unwrap().history.is_empty());
        let _ = std::fs::remove_file(path);
    }
}
