//! Display-ready aggregates and target classification for a [`Day`].
//!
//! Every function here is pure and total over its argument.

use serde::Serialize;

use crate::models::{Day, MealEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetStatus {
    NotSet,
    Within,
    Below,
    Above,
}

/// Calendar/history colouring for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayColor {
    Empty,
    Above,
    Below,
    Within,
}

/// Distance from the current total to each target bound. Negative means over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Remaining {
    pub to_min: Option<i64>,
    pub to_max: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub target_min: Option<u32>,
    pub target_max: Option<u32>,
    pub total_actual: u32,
    pub total_planned_min: u32,
    pub total_planned_max: u32,
    pub status: TargetStatus,
    pub color: DayColor,
    pub progress_percent: f64,
    pub remaining: Remaining,
    pub meals_done: usize,
}

fn sum_by(day: &Day, field: impl Fn(&MealEntry) -> Option<u32>) -> u32 {
    day.meals()
        .iter()
        .map(|m| field(m).unwrap_or(0))
        .fold(0u32, u32::saturating_add)
}

#[must_use]
pub fn total_actual(day: &Day) -> u32 {
    sum_by(day, |m| m.actual)
}

#[must_use]
pub fn total_planned_min(day: &Day) -> u32 {
    sum_by(day, |m| m.planned_min)
}

#[must_use]
pub fn total_planned_max(day: &Day) -> u32 {
    sum_by(day, |m| m.planned_max)
}

/// A day with nothing logged. Empty days are left out of history.
#[must_use]
pub fn is_empty(day: &Day) -> bool {
    total_actual(day) == 0
}

#[must_use]
pub fn is_above_target(day: &Day) -> bool {
    day.target_max.is_some_and(|max| total_actual(day) > max)
}

#[must_use]
pub fn is_below_target(day: &Day) -> bool {
    day.target_min.is_some_and(|min| total_actual(day) < min)
}

#[must_use]
pub fn is_within_target(day: &Day) -> bool {
    match (day.target_min, day.target_max) {
        (Some(min), Some(max)) => (min..=max).contains(&total_actual(day)),
        _ => false,
    }
}

/// Single status for display.
///
/// With an inverted range (`min > max`) a total can be both above and below;
/// `Above` is checked first, then `Below`.
#[must_use]
pub fn status(day: &Day) -> TargetStatus {
    if day.target_min.is_none() || day.target_max.is_none() {
        TargetStatus::NotSet
    } else if is_above_target(day) {
        TargetStatus::Above
    } else if is_below_target(day) {
        TargetStatus::Below
    } else {
        TargetStatus::Within
    }
}

/// Progress towards the upper bound, clamped to `0..=100`.
#[must_use]
pub fn progress_percent(day: &Day) -> f64 {
    match day.target_max {
        Some(max) if max > 0 => {
            (f64::from(total_actual(day)) / f64::from(max) * 100.0).min(100.0)
        }
        _ => 0.0,
    }
}

#[must_use]
pub fn remaining(day: &Day) -> Remaining {
    let total = i64::from(total_actual(day));
    Remaining {
        to_min: day.target_min.map(|min| i64::from(min) - total),
        to_max: day.target_max.map(|max| i64::from(max) - total),
    }
}

#[must_use]
pub fn day_color(day: &Day) -> DayColor {
    if is_empty(day) {
        return DayColor::Empty;
    }
    match status(day) {
        TargetStatus::NotSet => DayColor::Empty,
        TargetStatus::Above => DayColor::Above,
        TargetStatus::Below => DayColor::Below,
        TargetStatus::Within => DayColor::Within,
    }
}

#[must_use]
pub fn summarize(day: &Day) -> DaySummary {
    DaySummary {
        date: day.key(),
        target_min: day.target_min,
        target_max: day.target_max,
        total_actual: total_actual(day),
        total_planned_min: total_planned_min(day),
        total_planned_max: total_planned_max(day),
        status: status(day),
        color: day_color(day),
        progress_percent: progress_percent(day),
        remaining: remaining(day),
        meals_done: day.meals().iter().filter(|m| m.done).count(),
    }
}
