//! Scalar match scoring and comparison operators
//!
//! Scoring drives rule ranking and display matching: 0 means no match,
//! 1 means partial match and 2 means exact match. A missing value on
//! either side is a "don't care" and scores 1, so wildcard rules stay
//! eligible but rank below anything more specific.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// No match
pub const SCORE_NONE: u8 = 0;
/// Partial match (wildcard or pattern hit)
pub const SCORE_PARTIAL: u8 = 1;
/// Exact match
pub const SCORE_EXACT: u8 = 2;

/// Score two optional integers. Integers match on absolute value, which
/// pairs up coordinates mirrored across the virtual-desktop origin.
pub fn match_int(a: Option<i64>, b: Option<i64>) -> u8 {
    let (Some(a), Some(b)) = (a, b) else {
        return SCORE_PARTIAL;
    };
    if a.abs() == b.abs() { SCORE_EXACT } else { SCORE_NONE }
}

/// Score two optional strings. `a` is treated as a case-insensitive
/// pattern searched against candidate `b`; identical strings score
/// higher than a pattern hit. A pattern that fails to compile is logged
/// and scored as no-match, never raised.
pub fn match_text(a: Option<&str>, b: Option<&str>) -> u8 {
    let (Some(a), Some(b)) = (a, b) else {
        return SCORE_PARTIAL;
    };
    if a == b {
        return SCORE_EXACT;
    }
    match RegexBuilder::new(a).case_insensitive(true).build() {
        Ok(re) => {
            if re.is_match(b) {
                SCORE_PARTIAL
            } else {
                SCORE_NONE
            }
        }
        Err(err) => {
            warn!(pattern = a, %err, "failed to compile pattern");
            SCORE_NONE
        }
    }
}

/// Comparison operator named in persisted `comparison_params`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Lt,
    Le,
    #[default]
    Eq,
    Ge,
    Gt,
}

impl CompareOp {
    pub fn apply(&self, a: i32, b: i32) -> bool {
        match self {
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Eq => a == b,
            CompareOp::Ge => a >= b,
            CompareOp::Gt => a > b,
        }
    }
}

/// Whether every display in a snapshot must find a match, or just one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Any,
    All,
}
