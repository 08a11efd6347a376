//! Default greeting registry and content tables.
//!
//! This module provides the built-in categories, their weights and the
//! presentation keys every leaf resolves to. Operators can export these as
//! TOML, retune them, and point the config at the edited copies.

use crate::registry::{CategoryRow, RegistryTable, SubcaseRow};
use crate::{ContentRef, ContentTable};
use once_cell::sync::Lazy;

/// Cached default registry table - built once and reused across all engines
static DEFAULT_REGISTRY_TABLE: Lazy<RegistryTable> = Lazy::new(build_default_registry_table);

/// Cached default content table
static DEFAULT_CONTENT_TABLE: Lazy<ContentTable> = Lazy::new(build_default_content_table);

/// Get a reference to the cached default registry table
pub fn get_default_registry_table() -> &'static RegistryTable {
    &DEFAULT_REGISTRY_TABLE
}

/// Get a reference to the cached default content table
pub fn get_default_content_table() -> &'static ContentTable {
    &DEFAULT_CONTENT_TABLE
}

/// Builds the default category table
///
/// Zero-weight rows are features that are not live yet. They stay in the
/// table; weight alone keeps them from being selected.
pub fn build_default_registry_table() -> RegistryTable {
    let categories = vec![
        // ====================================================================
        // Time of day
        // ====================================================================
        CategoryRow::new("time_of_day", 1.0)
            .subcase(SubcaseRow::new("morning", 1.0, "morning"))
            .subcase(SubcaseRow::new("afternoon", 1.0, "afternoon"))
            .subcase(SubcaseRow::new("evening", 1.0, "evening"))
            .subcase(SubcaseRow::new("night", 1.0, "night"))
            .subcase(
                SubcaseRow::new("weekday", 1.0, "weekday")
                    .sub_condition("monday", 2.0, "monday")
                    .sub_condition("friday", 2.0, "friday")
                    .sub_condition("midweek", 1.0, "midweek"),
            )
            .subcase(SubcaseRow::new("weekend", 1.0, "weekend")),
        // ====================================================================
        // Streak state
        // ====================================================================
        CategoryRow::new("streak", 2.0)
            .subcase(SubcaseRow::new("active", 1.0, "streak_active"))
            .subcase(
                SubcaseRow::new("milestone", 3.0, "streak_milestone")
                    .sub_condition("weeks", 1.0, "streak_weeks")
                    .sub_condition("months", 1.0, "streak_months")
                    .sub_condition("year", 1.0, "streak_year"),
            )
            .subcase(SubcaseRow::new("broken", 4.0, "streak_broken"))
            .subcase(SubcaseRow::new("at_risk", 2.0, "streak_at_risk")),
        // ====================================================================
        // Progress
        // ====================================================================
        CategoryRow::new("progress", 1.5)
            .subcase(SubcaseRow::new("first_brush", 5.0, "first_brush"))
            .subcase(SubcaseRow::new("count_milestone", 3.0, "brush_count_milestone"))
            .subcase(SubcaseRow::new("second_today", 1.0, "second_brush_today"))
            .subcase(SubcaseRow::new("twice_today", 1.0, "brushed_twice_today")),
        // ====================================================================
        // Last session
        // ====================================================================
        CategoryRow::new("session", 1.0)
            .subcase(SubcaseRow::new("full_duration", 1.0, "met_target_duration"))
            .subcase(SubcaseRow::new("short", 1.0, "short_session")),
        // ====================================================================
        // Returning and new users
        // ====================================================================
        CategoryRow::new("return", 2.0)
            .subcase(SubcaseRow::new("comeback", 3.0, "returning_user"))
            .subcase(SubcaseRow::new("new_user", 1.0, "new_user")),
        // ====================================================================
        // Special days
        // ====================================================================
        CategoryRow::new("special", 1.0)
            .subcase(SubcaseRow::new("install_anniversary", 5.0, "install_anniversary"))
            .subcase(SubcaseRow::new("birthday", 0.0, "never"))
            .subcase(SubcaseRow::new("holiday", 0.0, "never")),
    ];

    RegistryTable { categories }
}

/// Builds the default content table covering every default leaf
pub fn build_default_content_table() -> ContentTable {
    let mut table = ContentTable::default();

    let visuals = [
        ("time_of_day", "companion.wave"),
        ("streak", "companion.flex"),
        ("progress", "companion.party"),
        ("session", "companion.thumbs_up"),
        ("return", "companion.hug"),
        ("special", "companion.confetti"),
    ];

    for leaf in build_default_registry_table().leaves() {
        let visual = visuals
            .iter()
            .find(|(category, _)| *category == leaf.category_id)
            .map(|(_, visual)| *visual)
            .unwrap_or(crate::content::DEFAULT_VISUAL_VARIANT);

        table.insert(
            leaf.key(),
            ContentRef::new(format!("greeting.{}", leaf.key()), visual),
        );
    }

    // Asset overrides where the generic category pose does not fit
    table.insert(
        "time_of_day.night",
        ContentRef::new("greeting.time_of_day.night", "companion.sleepy"),
    );
    table.insert(
        "streak.broken",
        ContentRef::new("greeting.streak.broken", "companion.encourage"),
    );
    table.insert(
        "streak.at_risk",
        ContentRef::new("greeting.streak.at_risk", "companion.worried"),
    );

    table
}
