//! Snapshots: per-display-configuration window history
//!
//! A `Snapshot` owns the captured history frames, user rules and layout
//! metadata for one display configuration. History is continuously
//! squashed (adjacent frames fully contained in their neighbour are
//! dropped) and pruned (windows whose native handle died or was recycled
//! to another process are removed).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::history::GLOBAL_SNAPSHOT;
use crate::geometry::WindowId;
use crate::matching::MatchMode;
use crate::model::{Display, Rule, Window, WindowHistory};

/// Seconds since the Unix epoch
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Probe deciding whether a native handle still refers to a live window.
/// `None` skips liveness checks and only drops recycled handles.
pub type AliveProbe<'a> = Option<&'a dyn Fn(WindowId) -> bool>;

/// ALL-vs-ANY mode for `matches_display_config`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMatchParams {
    #[serde(default)]
    pub displays: MatchMode,
}

/// Persisted record of one display configuration's window history, rules
/// and layout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Display configuration this snapshot is keyed on. An empty list is
    /// the "Global" sentinel matching any configuration.
    #[serde(default)]
    pub displays: Vec<Display>,
    /// Captured frames, ordered oldest to newest
    #[serde(default)]
    pub history: Vec<WindowHistory>,
    /// Timestamp of the last-restored frame
    #[serde(default)]
    pub mru: Option<f64>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Non-empty marks a user-defined named layout rather than an
    /// auto-captured live snapshot
    #[serde(default)]
    pub phony: String,
    #[serde(default)]
    pub comparison_params: SnapshotMatchParams,
}

impl Snapshot {
    /// Auto-captured snapshot for a live display configuration
    pub fn from_displays(displays: Vec<Display>) -> Self {
        Self {
            displays,
            history: Vec::new(),
            mru: None,
            rules: Vec::new(),
            phony: String::new(),
            comparison_params: SnapshotMatchParams::default(),
        }
    }

    /// The standing sentinel record: no displays, matches everything
    pub fn global() -> Self {
        Self {
            phony: GLOBAL_SNAPSHOT.to_string(),
            ..Self::from_displays(Vec::new())
        }
    }

    pub fn is_phony(&self) -> bool {
        !self.phony.is_empty()
    }

    pub fn is_global(&self) -> bool {
        self.phony == GLOBAL_SNAPSHOT && self.displays.is_empty()
    }

    /// Loose compatibility test against a live configuration.
    ///
    /// In `all` mode every one of this snapshot's displays must find a
    /// match among the candidates; the default `any` mode needs just one.
    /// An empty display list matches every configuration.
    pub fn matches_display_config(&self, config: &[Display]) -> bool {
        if self.displays.is_empty() {
            return true;
        }
        let mut matches = 0;
        let mut misses = 0;
        for display in &self.displays {
            if display.matches_config(config) {
                matches += 1;
            } else {
                misses += 1;
            }
        }
        match self.comparison_params.displays {
            MatchMode::All => misses == 0,
            MatchMode::Any => matches >= 1,
        }
    }

    /// Strict keying test used to decide whether a captured configuration
    /// belongs to this snapshot: same display count and every stored
    /// display matched
    pub fn same_display_config(&self, config: &[Display]) -> bool {
        self.displays.len() == config.len() && self.displays.iter().all(|d| d.matches_config(config))
    }

    /// Most recent historical window owned by the same executable as
    /// `window`.
    ///
    /// With `match_resizability`, candidates must agree on resizability
    /// (keeps a splash screen's size from contaminating the match). With
    /// `match_title`, candidates are ranked by trailing-token title
    /// overlap so "12 Reminders" beats "Inbox - Mail" for a reminder
    /// window even though both share an executable.
    pub fn last_known_process_instance(
        &self,
        window: &Window,
        match_title: bool,
        match_resizability: bool,
    ) -> Option<&Window> {
        let mut contenders: Vec<&Window> = Vec::new();
        for frame in self.history.iter().rev() {
            for archived in frame.windows.iter().rev() {
                if archived.executable == window.executable {
                    contenders.push(archived);
                }
            }
        }

        if match_resizability {
            contenders.retain(|c| c.resizable == window.resizable);
        }

        if match_title {
            // stable sort: equal scores keep newest-first order
            contenders.sort_by_cached_key(|c| std::cmp::Reverse(compare_titles(&window.name, &c.name)));
        }

        contenders.first().copied()
    }

    /// Squash the history by dropping frames fully contained in an
    /// adjacent frame.
    ///
    /// Walks newest to oldest. A window survives only if its handle is
    /// not known to have been recycled to a different executable, and —
    /// when an `alive` probe is given — the handle still resolves to a
    /// live window. Of each adjacent pair, the frame with fewer surviving
    /// windows is dropped if every one of its windows appears in the
    /// other frame with identical id, rect and placement; on a tie the
    /// newer frame is the one tested and dropped.
    pub fn squash_history(&mut self, alive: AliveProbe) {
        let mut exe_by_id: HashMap<WindowId, String> = HashMap::new();
        let mut index = self.history.len().saturating_sub(1);
        while index > 0 {
            // seed newest-first so recycled handles are detected before
            // being misattributed to an older owner
            for window in &self.history[index].windows {
                exe_by_id.entry(window.id).or_insert_with(|| window.executable.clone());
            }

            let keep = |window: &Window| -> bool {
                match alive {
                    Some(probe) => {
                        probe(window.id)
                            && exe_by_id.get(&window.id).is_some_and(|exe| *exe == window.executable)
                    }
                    None => exe_by_id
                        .get(&window.id)
                        .is_none_or(|exe| *exe == window.executable),
                }
            };
            self.history[index].windows.retain(|w| keep(w));
            self.history[index - 1].windows.retain(|w| keep(w));

            let (smaller, greater, to_pop) =
                if self.history[index].windows.len() > self.history[index - 1].windows.len() {
                    (index - 1, index, index - 1)
                } else {
                    (index, index - 1, index)
                };

            let contained = self.history[smaller].windows.iter().all(|a| {
                self.history[greater]
                    .windows
                    .iter()
                    .any(|b| a.id == b.id && a.rect == b.rect && a.placement == b.placement)
            });
            if contained {
                self.history.remove(to_pop);
            }

            index -= 1;
        }
    }

    /// Squash, expire frames older than `ttl` seconds (0 disables the
    /// check), then truncate to the most recent `maximum` frames
    pub fn cleanup(&mut self, alive: AliveProbe, ttl: f64, maximum: usize) {
        self.squash_history(alive);
        if ttl != 0.0 {
            let current = now();
            self.history.retain(|frame| current - frame.time <= ttl);
        }
        if self.history.len() > maximum {
            let excess = self.history.len() - maximum;
            self.history.drain(..excess);
        }
    }
}

/// Trailing-token title overlap. An exact match scores one above the
/// token count; otherwise tokens are compared from the end of both
/// titles, stopping at the first mismatch. Handles titles shaped as
/// "dynamic prefix + static suffix", eg: "3 unread - Mail".
fn compare_titles(base: &str, other: &str) -> usize {
    let base_chunks: Vec<&str> = base.split_whitespace().collect();
    if base == other {
        return base_chunks.len() + 1;
    }
    let mut score = 0;
    for (a, b) in base_chunks.iter().rev().zip(other.split_whitespace().rev()) {
        if *a != b {
            return score;
        }
        score += 1;
    }
    score
}
