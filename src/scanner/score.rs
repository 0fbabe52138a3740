//! Staleness score
//!
//! A point-additive model, higher meaning a more outdated site and a hotter
//! lead:
//!
//! | Signal | Points |
//! |--------|--------|
//! | not reachable over HTTPS | 25 |
//! | no viewport (not mobile-friendly) | 25 |
//! | copyright year older than last year | 20 |
//! | each outdated-technology issue | 10 |
//! | load time over 3 s | 15 |
//! | load time over 5 s | 10 more |
//!
//! The sum is clamped to 100.

pub const MAX_SCORE: u32 = 100;

const NO_HTTPS_POINTS: u32 = 25;
const NOT_MOBILE_POINTS: u32 = 25;
const STALE_COPYRIGHT_POINTS: u32 = 20;
const POINTS_PER_ISSUE: u32 = 10;
const SLOW_POINTS: u32 = 15;
const VERY_SLOW_POINTS: u32 = 10;

const SLOW_SECONDS: f64 = 3.0;
const VERY_SLOW_SECONDS: f64 = 5.0;

/// Signals the score is computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub ssl_valid: bool,
    pub mobile_friendly: bool,
    pub copyright_year: Option<i32>,
    pub outdated_issue_count: usize,
    pub load_time_seconds: f64,
}

/// Computes the 0-100 staleness score
///
/// A copyright year counts as stale when it is before `current_year - 1`.
/// A missing year adds nothing.
pub fn staleness_score(inputs: &ScoreInputs, current_year: i32) -> u32 {
    let mut score: u32 = 0;

    if !inputs.ssl_valid {
        score += NO_HTTPS_POINTS;
    }
    if !inputs.mobile_friendly {
        score += NOT_MOBILE_POINTS;
    }
    if matches!(inputs.copyright_year, Some(year) if year < current_year - 1) {
        score += STALE_COPYRIGHT_POINTS;
    }

    let issues = u32::try_from(inputs.outdated_issue_count).unwrap_or(u32::MAX);
    score = score.saturating_add(issues.saturating_mul(POINTS_PER_ISSUE));

    if inputs.load_time_seconds > SLOW_SECONDS {
        score = score.saturating_add(SLOW_POINTS);
    }
    if inputs.load_time_seconds > VERY_SLOW_SECONDS {
        score = score.saturating_add(VERY_SLOW_POINTS);
    }

    score.min(MAX_SCORE)
}
