//! Core domain types for the greeting selection engine.
//!
//! This module defines the values that flow in and out of a selection call:
//! - The per-call behavioral context consumed by predicates
//! - The leaf path chosen by the sampler
//! - The selection result handed to the presentation layer

use crate::Result;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Session length assumed when the caller does not supply a target
pub const DEFAULT_TARGET_DURATION_SECS: u32 = 120;

// ============================================================================
// Context
// ============================================================================

/// Immutable snapshot of a user's brushing state for one selection call
///
/// Every field is optional. The accessor methods document the default each
/// predicate sees when a field is missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GreetingContext {
    /// Local wall-clock time of the greeting
    #[serde(default)]
    pub current_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub day_of_week: Option<Weekday>,
    #[serde(default)]
    pub streak_days: Option<u32>,
    #[serde(default)]
    pub total_brush_count: Option<u32>,
    #[serde(default)]
    pub last_brush_date: Option<NaiveDate>,
    #[serde(default)]
    pub brushes_today: Option<u32>,
    /// Duration of the most recent session
    #[serde(default)]
    pub actual_duration_secs: Option<u32>,
    #[serde(default)]
    pub target_duration_secs: Option<u32>,
    #[serde(default)]
    pub is_first_brush: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub install_date: Option<NaiveDate>,
}

impl GreetingContext {
    /// Context pinned to a wall-clock time, everything else unknown
    pub fn at(current_time: NaiveDateTime) -> Self {
        Self {
            current_time: Some(current_time),
            ..Self::default()
        }
    }

    /// Load a context snapshot from a JSON file
    ///
    /// Unlike predicate failures, a malformed snapshot is reported: it is
    /// caller input, not something the engine can degrade around.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ctx: GreetingContext = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded greeting context from {:?}", path);
        Ok(ctx)
    }

    /// Calendar date of the greeting, if the time is known
    pub fn today(&self) -> Option<NaiveDate> {
        self.current_time.map(|t| t.date())
    }

    /// Explicit day of week, else derived from `current_time`
    pub fn weekday(&self) -> Option<Weekday> {
        self.day_of_week
            .or_else(|| self.current_time.map(|t| t.weekday()))
    }

    /// Defaults to 0
    pub fn streak(&self) -> u32 {
        self.streak_days.unwrap_or(0)
    }

    /// Defaults to 0
    pub fn total_brushes(&self) -> u32 {
        self.total_brush_count.unwrap_or(0)
    }

    /// Defaults to 0
    pub fn brushes_on_day(&self) -> u32 {
        self.brushes_today.unwrap_or(0)
    }

    /// Defaults to [`DEFAULT_TARGET_DURATION_SECS`]
    pub fn target_duration(&self) -> u32 {
        self.target_duration_secs
            .unwrap_or(DEFAULT_TARGET_DURATION_SECS)
    }

    /// Explicit flag, else true when no brush has been counted yet
    pub fn first_brush(&self) -> bool {
        self.is_first_brush
            .unwrap_or_else(|| self.total_brushes() == 0)
    }

    /// Whole days between the last brush and today
    ///
    /// `None` when either date is unknown.
    pub fn days_since_last_brush(&self) -> Option<i64> {
        let today = self.today()?;
        let last = self.last_brush_date?;
        Some((today - last).num_days())
    }

    /// Whole days between install and today
    pub fn days_since_install(&self) -> Option<i64> {
        let today = self.today()?;
        let installed = self.install_date?;
        Some((today - installed).num_days())
    }
}

// ============================================================================
// Leaf and Result Types
// ============================================================================

/// Path to a sampled outcome: category, subcase and optional sub-condition
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Leaf {
    pub category_id: String,
    pub subcase_id: String,
    pub sub_condition_id: Option<String>,
}

impl Leaf {
    pub fn new(category_id: impl Into<String>, subcase_id: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            subcase_id: subcase_id.into(),
            sub_condition_id: None,
        }
    }

    pub fn with_sub_condition(mut self, sub_condition_id: impl Into<String>) -> Self {
        self.sub_condition_id = Some(sub_condition_id.into());
        self
    }

    /// Dotted key used by the content table, e.g. `streak.milestone.week`
    pub fn key(&self) -> String {
        match &self.sub_condition_id {
            Some(cond) => format!("{}.{}.{}", self.category_id, self.subcase_id, cond),
            None => self.subcase_key(),
        }
    }

    /// Dotted key without the sub-condition
    pub fn subcase_key(&self) -> String {
        format!("{}.{}", self.category_id, self.subcase_id)
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Presentation keys a leaf resolves to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_key: String,
    pub visual_variant_key: String,
}

impl ContentRef {
    pub fn new(content_key: impl Into<String>, visual_variant_key: impl Into<String>) -> Self {
        Self {
            content_key: content_key.into(),
            visual_variant_key: visual_variant_key.into(),
        }
    }
}

/// Outcome of one selection call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub category_id: String,
    pub subcase_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_condition_id: Option<String>,
    pub content_key: String,
    pub visual_variant_key: String,
    /// True when nothing was eligible and the fixed default was returned
    #[serde(default)]
    pub fallback: bool,
}

impl SelectionResult {
    pub fn from_leaf(leaf: Leaf, content: ContentRef) -> Self {
        Self {
            category_id: leaf.category_id,
            subcase_id: leaf.subcase_id,
            sub_condition_id: leaf.sub_condition_id,
            content_key: content.content_key,
            visual_variant_key: content.visual_variant_key,
            fallback: false,
        }
    }

    /// Leaf path this result was resolved from
    pub fn leaf(&self) -> Leaf {
        Leaf {
            category_id: self.category_id.clone(),
            subcase_id: self.subcase_id.clone(),
            sub_condition_id: self.sub_condition_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_missing_fields_use_documented_defaults() {
        let ctx = GreetingContext::default();

        assert_eq!(ctx.streak(), 0);
        assert_eq!(ctx.total_brushes(), 0);
        assert_eq!(ctx.brushes_on_day(), 0);
        assert_eq!(ctx.target_duration(), DEFAULT_TARGET_DURATION_SECS);
        assert!(ctx.first_brush());
        assert!(ctx.weekday().is_none());
        assert!(ctx.days_since_last_brush().is_none());
    }

    #[test]
    fn test_weekday_derived_from_time() {
        // 2024-01-15 is a Monday
        let ctx = GreetingContext::at(at("2024-01-15", "08:00"));
        assert_eq!(ctx.weekday(), Some(Weekday::Mon));

        let explicit = GreetingContext {
            day_of_week: Some(Weekday::Sat),
            ..ctx
        };
        assert_eq!(explicit.weekday(), Some(Weekday::Sat));
    }

    #[test]
    fn test_days_since_last_brush() {
        let ctx = GreetingContext {
            last_brush_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            ..GreetingContext::at(at("2024-01-15", "21:30"))
        };
        assert_eq!(ctx.days_since_last_brush(), Some(10));
    }

    #[test]
    fn test_first_brush_flag_overrides_count() {
        let ctx = GreetingContext {
            total_brush_count: Some(0),
            is_first_brush: Some(false),
            ..Default::default()
        };
        assert!(!ctx.first_brush());
    }

    #[test]
    fn test_context_parses_partial_json() {
        let json = r#"{
            "current_time": "2024-01-15T08:00:00",
            "streak_days": 4
        }"#;
        let ctx: GreetingContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.streak(), 4);
        assert!(ctx.last_brush_date.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(&path, r#"{"streak_days": 0, "last_brush_date": "2024-01-05"}"#).unwrap();

        let ctx = GreetingContext::load_from(&path).unwrap();
        assert_eq!(ctx.last_brush_date, NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn test_load_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(matches!(
            GreetingContext::load_from(&path),
            Err(crate::Error::Json(_))
        ));
    }

    #[test]
    fn test_leaf_keys() {
        let leaf = Leaf::new("streak", "milestone");
        assert_eq!(leaf.key(), "streak.milestone");

        let leaf = leaf.with_sub_condition("week");
        assert_eq!(leaf.key(), "streak.milestone.week");
        assert_eq!(leaf.subcase_key(), "streak.milestone");
    }
}
