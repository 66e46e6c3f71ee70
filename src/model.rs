//! Core entity model
//!
//! `Display`, `Window`, `Rule` and `WindowHistory` are the persisted
//! records the engine reconciles against live state. Deserialization
//! ignores unknown fields and fills defaults, so documents written by
//! older builds keep loading.

use serde::{Deserialize, Serialize};

use crate::constants::history::UNNAMED_RULE;
use crate::geometry::{Placement, Rect, Size, WindowId};
use crate::matching::{match_text, CompareOp, SCORE_NONE};

/// A physical display in a captured configuration.
///
/// `uid` and `name` are matched as regex patterns against a candidate
/// display, never required to be non-empty; a resolution axis of 0 is a
/// wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Display {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub resolution: Size,
    pub rect: Rect,
    #[serde(default)]
    pub comparison_params: DisplayMatchParams,
}

/// Per-field operator overrides for display comparison, eg: match
/// resolution with `>=` so a layout applies to any display at least
/// that large
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMatchParams {
    #[serde(default)]
    pub resolution: (CompareOp, CompareOp),
}

impl Display {
    /// Whether `other` (a live display) satisfies this display's
    /// patterns and resolution constraints
    pub fn matches(&self, other: &Display) -> bool {
        if !other.uid.is_empty() && match_text(Some(&self.uid), Some(&other.uid)) == SCORE_NONE {
            return false;
        }
        if !other.name.is_empty() && match_text(Some(&self.name), Some(&other.name)) == SCORE_NONE {
            return false;
        }
        let (op_w, op_h) = self.comparison_params.resolution;
        for (op, candidate, stored) in [
            (op_w, other.resolution.0, self.resolution.0),
            (op_h, other.resolution.1, self.resolution.1),
        ] {
            if candidate == 0 || stored == 0 {
                continue;
            }
            if !op.apply(candidate, stored) {
                return false;
            }
        }
        true
    }

    /// Whether any display in `config` satisfies this one
    pub fn matches_config(&self, config: &[Display]) -> bool {
        config.iter().any(|d| self.matches(d))
    }
}

/// A visible top-level window observed at capture time. Never persisted
/// standalone, always inside a `WindowHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    pub name: String,
    pub executable: String,
    pub size: Size,
    pub rect: Rect,
    pub placement: Placement,
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

fn default_resizable() -> bool {
    true
}

/// One timestamped capture of all live windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowHistory {
    pub time: f64,
    #[serde(default)]
    pub windows: Vec<Window>,
}

/// User-authored positioning rule. `name`/`executable` are patterns;
/// `None` means "ignore this field". Rules are long-lived and never
/// auto-pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_rule_name")]
    pub rule_name: String,
    pub size: Size,
    pub rect: Rect,
    pub placement: Placement,
}

fn default_rule_name() -> String {
    UNNAMED_RULE.to_string()
}

impl Rule {
    /// Rule covering `rect`, matching every window until patterns are set
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            name: None,
            executable: None,
            rule_name: default_rule_name(),
            size: rect.size(),
            rect,
            placement: Placement::normal(rect),
        }
    }
}

/// Shared fit-checking over anything with a rect and a placement.
///
/// `frame` is the border + drop-shadow thickness of the subject, already
/// scaled for the destination display's DPI where that matters.
pub trait WindowMetrics {
    fn rect(&self) -> Rect;
    fn placement(&self) -> &Placement;

    /// The live rect, unless minimized. Minimized windows report
    /// degenerate coordinates like (-32000, -32000), so the placement's
    /// restored rect stands in.
    fn effective_rect(&self) -> Rect {
        if self.placement().is_minimized() {
            self.placement().normal_position
        } else {
            self.rect()
        }
    }

    /// Inclusive bounding check against `target`. With `offset` unset,
    /// maximized windows get the frame thickness as slack since they
    /// legitimately straddle the work-area edge.
    fn fits_rect(&self, target: Rect, offset: Option<i32>, frame: i32) -> bool {
        let rect = self.effective_rect();
        let offset = offset.unwrap_or_else(|| if self.placement().is_maximized() { frame } else { 0 });
        rect.left >= target.left - offset
            && rect.top >= target.top - offset
            && rect.right <= target.right + offset
            && rect.bottom <= target.bottom + offset
    }

    /// Window rects include the drop shadow but display rects don't, so
    /// the frame thickness is always granted as slack here
    fn fits_display(&self, display: &Display, frame: i32) -> bool {
        self.fits_rect(display.rect, Some(frame), frame)
    }

    /// OR semantics over the candidate displays; deliberately permissive
    /// since windows may legitimately overlap monitor boundaries
    fn fits_display_config(&self, displays: &[Display], frame: i32) -> bool {
        displays.iter().any(|d| self.fits_display(d, frame))
    }
}

impl WindowMetrics for Window {
    fn rect(&self) -> Rect {
        self.rect
    }

    fn placement(&self) -> &Placement {
        &self.placement
    }
}

impl WindowMetrics for Rule {
    fn rect(&self) -> Rect {
        self.rect
    }

    fn placement(&self) -> &Placement {
        &self.placement
    }
}

/// Rank `rules` against a live window.
///
/// A rule is eligible only if neither its name nor its executable scores
/// 0 against the window. Eligible rules are ordered by summed score,
/// descending, so exact rules outrank patterned ones and purely wildcard
/// rules come last but stay eligible.
pub fn find_matching_rules<'a>(rules: &'a [Rule], window: &Window) -> Vec<&'a Rule> {
    let mut scored: Vec<(u8, &Rule)> = rules
        .iter()
        .filter_map(|rule| {
            let name_score = match_text(rule.name.as_deref(), Some(&window.name));
            let exe_score = match_text(rule.executable.as_deref(), Some(&window.executable));
            if name_score == SCORE_NONE || exe_score == SCORE_NONE {
                None
            } else {
                Some((name_score + exe_score, rule))
            }
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, rule)| rule).collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{display, minimized, window};
    use super::*;
    use crate::geometry::ShowState;

    #[test]
    fn test_fits_rect_inclusive_at_exact_boundary() {
        let rect = Rect::new(0, 0, 2560, 1440);
        let w = window(1, "a", "a.exe", rect);
        assert!(w.fits_rect(rect, Some(0), 0));
    }

    #[test]
    fn test_fits_display_config() {
        let a = display("UID1", "DISPLAY1", Rect::new(0, 0, 2560, 1440));
        let b = display("UID2", "DISPLAY2", Rect::new(2560, 0, 4480, 1080));
        let w = window(1, "a", "a.exe", Rect::new(0, 0, 2560, 1440));
        assert!(w.fits_display(&a, 0));
        assert!(!w.fits_display(&b, 0));
        assert!(w.fits_display_config(&[a, b.clone()], 0));
        assert!(!w.fits_display_config(&[b], 0));
    }

    #[test]
    fn test_fits_rect_minimized_uses_restored_rect() {
        let target = Rect::new(0, 0, 1920, 1080);
        let w = minimized(window(1, "a", "a.exe", target), Rect::new(100, 100, 800, 700));
        assert!(w.fits_rect(target, Some(0), 0));
    }

    #[test]
    fn test_fits_rect_maximized_gets_frame_slack() {
        let target = Rect::new(0, 0, 1920, 1080);
        let mut w = window(1, "a", "a.exe", Rect::new(-8, -8, 1928, 1088));
        w.placement.show_cmd = ShowState::Maximized;
        assert!(w.fits_rect(target, None, 8));
        assert!(!w.fits_rect(target, None, 4));
    }

    #[test]
    fn test_fits_display_grants_shadow_slack_for_normal_windows() {
        let d = display("UID1", "DISPLAY1", Rect::new(0, 0, 1920, 1080));
        // drop shadow hangs 8px past the display edge
        let w = window(1, "a", "a.exe", Rect::new(-8, 0, 1200, 700));
        assert!(w.fits_display(&d, 8));
        assert!(!w.fits_display(&d, 4));
    }

    #[test]
    fn test_display_matches_patterns_and_resolution() {
        let live = display("UID4567", "GSM1234", Rect::new(0, 0, 2560, 1440));
        let mut stored = display("UID[0-9]+", "GSM.*", Rect::new(0, 0, 2560, 1440));
        assert!(stored.matches(&live));

        stored.resolution = (1920, 1080);
        assert!(!stored.matches(&live));

        // ">= 1080p" style layout
        stored.comparison_params.resolution = (CompareOp::Ge, CompareOp::Ge);
        assert!(stored.matches(&live));

        // a zero axis is a wildcard
        stored.comparison_params = DisplayMatchParams::default();
        stored.resolution = (0, 1440);
        assert!(stored.matches(&live));
    }

    #[test]
    fn test_display_matches_empty_candidate_fields_are_wildcards() {
        let mut live = display("", "", Rect::new(0, 0, 1920, 1080));
        live.resolution = (0, 0);
        let stored = display("UID1", "DELL", Rect::new(0, 0, 2560, 1440));
        assert!(stored.matches(&live));
    }

    #[test]
    fn test_rule_eligible_with_wildcard_name() {
        let mut rule = Rule::from_rect(Rect::new(0, 0, 800, 600));
        rule.executable = Some(r"notepad\.exe".to_string());
        let w = window(1, "Untitled - Notepad", r"C:\Windows\notepad.exe", Rect::new(0, 0, 640, 480));
        let ranked = find_matching_rules(std::slice::from_ref(&rule), &w);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_rule_ranking_prefers_specific_rules() {
        let rect = Rect::new(0, 0, 800, 600);
        let wildcard = Rule::from_rect(rect);
        let mut pattern = Rule::from_rect(rect);
        pattern.rule_name = "pattern".to_string();
        pattern.executable = Some(r"notepad\.exe".to_string());
        let mut exact = Rule::from_rect(rect);
        exact.rule_name = "exact".to_string();
        exact.executable = Some(r"C:\Windows\notepad.exe".to_string());
        let mut other = Rule::from_rect(rect);
        other.rule_name = "other".to_string();
        other.executable = Some(r"calc\.exe".to_string());

        let rules = vec![pattern, exact, other, wildcard];
        let w = window(1, "Untitled - Notepad", r"C:\Windows\notepad.exe", rect);
        let ranked = find_matching_rules(&rules, &w);
        let names: Vec<&str> = ranked.iter().map(|r| r.rule_name.as_str()).collect();
        assert_eq!(names, vec!["exact", "pattern", "Unnamed rule"]);
    }

    #[test]
    fn test_rule_defaults_on_deserialize() {
        let rule: Rule = serde_json::from_str(
            r#"{"size": [800, 600], "rect": [0, 0, 800, 600],
                "placement": [0, 1, [-1, -1], [-1, -1], [0, 0, 800, 600]],
                "something": "else"}"#,
        )
        .unwrap();
        assert_eq!(rule.rule_name, "Unnamed rule");
        assert_eq!(rule.name, None);
        assert_eq!(rule.executable, None);
    }

    #[test]
    fn test_window_round_trip() {
        let w = window(42, "Inbox - Mail", r"C:\mail.exe", Rect::new(10, 10, 600, 400));
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(serde_json::from_str::<Window>(&json).unwrap(), w);
    }
}
