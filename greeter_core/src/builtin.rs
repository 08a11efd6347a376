//! Built-in predicates over [`GreetingContext`] fields.
//!
//! Every function here is pure and synchronous. They are registered by name
//! in [`register_builtins`] so registry tables can refer to them.

use crate::{GreetingContext, PredicateRegistry};
use chrono::{Datelike, Timelike, Weekday};

/// Streak lengths that earn a milestone greeting
pub const STREAK_MILESTONES: &[u32] = &[3, 7, 14, 21, 30, 50, 100, 200, 365];

/// Lifetime brush counts that earn a milestone greeting
pub const BRUSH_COUNT_MILESTONES: &[u32] = &[10, 25, 50, 100, 250, 500, 1000];

/// A missed day or more breaks the streak
const STREAK_BREAK_GAP_DAYS: i64 = 2;

/// Absence long enough to be greeted as a returning user
const COMEBACK_GAP_DAYS: i64 = 7;

fn hour(ctx: &GreetingContext) -> Option<u32> {
    ctx.current_time.map(|t| t.hour())
}

// ============================================================================
// Time of day
// ============================================================================

/// 05:00 to 11:59
pub fn is_morning(ctx: &GreetingContext) -> bool {
    matches!(hour(ctx), Some(5..=11))
}

/// 12:00 to 16:59
pub fn is_afternoon(ctx: &GreetingContext) -> bool {
    matches!(hour(ctx), Some(12..=16))
}

/// 17:00 to 20:59
pub fn is_evening(ctx: &GreetingContext) -> bool {
    matches!(hour(ctx), Some(17..=20))
}

/// 21:00 to 04:59
pub fn is_night(ctx: &GreetingContext) -> bool {
    matches!(hour(ctx), Some(21..=23) | Some(0..=4))
}

pub fn is_weekday(ctx: &GreetingContext) -> bool {
    ctx.weekday()
        .is_some_and(|d| !matches!(d, Weekday::Sat | Weekday::Sun))
}

pub fn is_weekend(ctx: &GreetingContext) -> bool {
    ctx.weekday()
        .is_some_and(|d| matches!(d, Weekday::Sat | Weekday::Sun))
}

pub fn is_monday(ctx: &GreetingContext) -> bool {
    ctx.weekday() == Some(Weekday::Mon)
}

pub fn is_friday(ctx: &GreetingContext) -> bool {
    ctx.weekday() == Some(Weekday::Fri)
}

/// Tuesday through Thursday
pub fn is_midweek(ctx: &GreetingContext) -> bool {
    matches!(ctx.weekday(), Some(Weekday::Tue | Weekday::Wed | Weekday::Thu))
}

// ============================================================================
// Streak state
// ============================================================================

pub fn streak_active(ctx: &GreetingContext) -> bool {
    ctx.streak() >= 1
}

pub fn streak_milestone(ctx: &GreetingContext) -> bool {
    STREAK_MILESTONES.contains(&ctx.streak())
}

/// Streak between 7 and 29 days
pub fn streak_weeks(ctx: &GreetingContext) -> bool {
    (7..30).contains(&ctx.streak())
}

/// Streak between 30 and 364 days
pub fn streak_months(ctx: &GreetingContext) -> bool {
    (30..365).contains(&ctx.streak())
}

pub fn streak_year(ctx: &GreetingContext) -> bool {
    ctx.streak() >= 365
}

/// Streak reset to zero after the user had brushed before and then skipped
/// at least a full day
pub fn streak_broken(ctx: &GreetingContext) -> bool {
    ctx.streak() == 0
        && ctx.total_brushes() > 0
        && ctx
            .days_since_last_brush()
            .is_some_and(|gap| gap >= STREAK_BREAK_GAP_DAYS)
}

/// Streak still alive but nothing brushed yet today
pub fn streak_at_risk(ctx: &GreetingContext) -> bool {
    ctx.streak() >= 1 && ctx.brushes_on_day() == 0 && ctx.days_since_last_brush() == Some(1)
}

pub fn returning_user(ctx: &GreetingContext) -> bool {
    ctx.days_since_last_brush()
        .is_some_and(|gap| gap >= COMEBACK_GAP_DAYS)
}

// ============================================================================
// Progress
// ============================================================================

pub fn first_brush(ctx: &GreetingContext) -> bool {
    ctx.first_brush()
}

pub fn brush_count_milestone(ctx: &GreetingContext) -> bool {
    BRUSH_COUNT_MILESTONES.contains(&ctx.total_brushes())
}

/// One session already logged today
pub fn second_brush_today(ctx: &GreetingContext) -> bool {
    ctx.brushes_on_day() == 1
}

pub fn brushed_twice_today(ctx: &GreetingContext) -> bool {
    ctx.brushes_on_day() >= 2
}

/// Anniversary of the install date (whole years, at least one)
pub fn install_anniversary(ctx: &GreetingContext) -> bool {
    match (ctx.today(), ctx.install_date) {
        (Some(today), Some(installed)) => {
            today.year() > installed.year()
                && today.month() == installed.month()
                && today.day() == installed.day()
        }
        _ => false,
    }
}

/// Installed within the last week
pub fn new_user(ctx: &GreetingContext) -> bool {
    ctx.days_since_install()
        .is_some_and(|days| (0..7).contains(&days))
}

// ============================================================================
// Session duration
// ============================================================================

pub fn met_target_duration(ctx: &GreetingContext) -> bool {
    ctx.actual_duration_secs
        .is_some_and(|secs| secs >= ctx.target_duration())
}

/// Last session under half the target
pub fn short_session(ctx: &GreetingContext) -> bool {
    ctx.actual_duration_secs
        .is_some_and(|secs| secs.saturating_mul(2) < ctx.target_duration())
}

/// Register every built-in predicate under its reference name
pub fn register_builtins(registry: &mut PredicateRegistry) {
    registry.register_fn("always", |_| true);
    // Placeholder for rows whose feature is not built yet
    registry.register_fn("never", |_| false);

    registry.register_fn("morning", is_morning);
    registry.register_fn("afternoon", is_afternoon);
    registry.register_fn("evening", is_evening);
    registry.register_fn("night", is_night);
    registry.register_fn("weekday", is_weekday);
    registry.register_fn("weekend", is_weekend);
    registry.register_fn("monday", is_monday);
    registry.register_fn("friday", is_friday);
    registry.register_fn("midweek", is_midweek);

    registry.register_fn("streak_active", streak_active);
    registry.register_fn("streak_milestone", streak_milestone);
    registry.register_fn("streak_weeks", streak_weeks);
    registry.register_fn("streak_months", streak_months);
    registry.register_fn("streak_year", streak_year);
    registry.register_fn("streak_broken", streak_broken);
    registry.register_fn("streak_at_risk", streak_at_risk);
    registry.register_fn("returning_user", returning_user);

    registry.register_fn("first_brush", first_brush);
    registry.register_fn("brush_count_milestone", brush_count_milestone);
    registry.register_fn("second_brush_today", second_brush_today);
    registry.register_fn("brushed_twice_today", brushed_twice_today);
    registry.register_fn("install_anniversary", install_anniversary);
    registry.register_fn("new_user", new_user);

    registry.register_fn("met_target_duration", met_target_duration);
    registry.register_fn("short_session", short_session);
}
