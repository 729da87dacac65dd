use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One of the fixed meal categories tracked per day.
///
/// Declaration order is the canonical display and aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MealSlot {
    Breakfast,
    IntraWorkout,
    PostWorkout,
    Lunch,
    #[serde(rename = "snack-1")]
    Snack1,
    #[serde(rename = "snack-2")]
    Snack2,
    #[serde(rename = "snack-3")]
    Snack3,
    Dinner,
}

impl MealSlot {
    pub const COUNT: usize = 8;

    pub const ALL: [MealSlot; Self::COUNT] = [
        MealSlot::Breakfast,
        MealSlot::IntraWorkout,
        MealSlot::PostWorkout,
        MealSlot::Lunch,
        MealSlot::Snack1,
        MealSlot::Snack2,
        MealSlot::Snack3,
        MealSlot::Dinner,
    ];

    /// Position of this slot in [`MealSlot::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name, as stored in persisted records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::IntraWorkout => "intra-workout",
            MealSlot::PostWorkout => "post-workout",
            MealSlot::Lunch => "lunch",
            MealSlot::Snack1 => "snack-1",
            MealSlot::Snack2 => "snack-2",
            MealSlot::Snack3 => "snack-3",
            MealSlot::Dinner => "dinner",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::IntraWorkout => "Intra Workout",
            MealSlot::PostWorkout => "Post Workout",
            MealSlot::Lunch => "Lunch",
            MealSlot::Snack1 => "Snack 1",
            MealSlot::Snack2 => "Snack 2",
            MealSlot::Snack3 => "Snack 3",
            MealSlot::Dinner => "Dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        MealSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = MealSlot::ALL.iter().map(|m| m.as_str()).collect();
                anyhow::anyhow!("Invalid meal '{s}'. Must be one of: {}", names.join(", "))
            })
    }
}

/// A per-meal planned intake interval. Either bound may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRange {
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}

impl PlannedRange {
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    #[serde(rename = "type")]
    slot: MealSlot,
    pub planned_min: Option<u32>,
    pub planned_max: Option<u32>,
    /// `None` means not yet logged, which is not the same as `Some(0)`.
    pub actual: Option<u32>,
    #[serde(rename = "isDone")]
    pub done: bool,
}

impl MealEntry {
    #[must_use]
    pub fn new(slot: MealSlot) -> Self {
        Self {
            slot,
            planned_min: None,
            planned_max: None,
            actual: None,
            done: false,
        }
    }

    #[must_use]
    pub fn with_planned(slot: MealSlot, range: PlannedRange) -> Self {
        Self {
            planned_min: range.min,
            planned_max: range.max,
            ..Self::new(slot)
        }
    }

    #[must_use]
    pub fn slot(&self) -> MealSlot {
        self.slot
    }

    #[must_use]
    pub fn planned(&self) -> PlannedRange {
        PlannedRange {
            min: self.planned_min,
            max: self.planned_max,
        }
    }
}

/// One calendar date's tracking record.
///
/// `meals` always holds exactly one entry per [`MealSlot`], in canonical order.
/// It is private so the only ways in are the constructors below and
/// [`Day::meal_mut`], none of which change the set or order of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Day {
    pub date: NaiveDate,
    #[serde(rename = "dailyTargetMin")]
    pub target_min: Option<u32>,
    #[serde(rename = "dailyTargetMax")]
    pub target_max: Option<u32>,
    meals: Vec<MealEntry>,
}

impl Day {
    #[must_use]
    pub fn new(date: NaiveDate, target_min: Option<u32>, target_max: Option<u32>) -> Self {
        Self {
            date,
            target_min,
            target_max,
            meals: MealSlot::ALL.into_iter().map(MealEntry::new).collect(),
        }
    }

    /// A fresh day seeded from the settings' target and default planned ranges.
    #[must_use]
    pub fn from_settings(date: NaiveDate, settings: &Settings) -> Self {
        Self {
            date,
            target_min: settings.target_min,
            target_max: settings.target_max,
            meals: MealSlot::ALL
                .into_iter()
                .map(|slot| MealEntry::with_planned(slot, settings.planned_range(slot)))
                .collect(),
        }
    }

    /// Build a day from entries in any order.
    ///
    /// The first entry seen for a slot wins; slots with no entry get an empty one.
    #[must_use]
    pub fn from_meals(
        date: NaiveDate,
        target_min: Option<u32>,
        target_max: Option<u32>,
        meals: impl IntoIterator<Item = MealEntry>,
    ) -> Self {
        let mut by_slot: [Option<MealEntry>; MealSlot::COUNT] = Default::default();
        for meal in meals {
            let cell = &mut by_slot[meal.slot.index()];
            if cell.is_none() {
                *cell = Some(meal);
            }
        }
        let meals = MealSlot::ALL
            .into_iter()
            .zip(by_slot)
            .map(|(slot, meal)| meal.unwrap_or_else(|| MealEntry::new(slot)))
            .collect();
        Self {
            date,
            target_min,
            target_max,
            meals,
        }
    }

    #[must_use]
    pub fn meals(&self) -> &[MealEntry] {
        &self.meals
    }

    #[must_use]
    pub fn meal(&self, slot: MealSlot) -> &MealEntry {
        &self.meals[slot.index()]
    }

    pub fn meal_mut(&mut self, slot: MealSlot) -> &mut MealEntry {
        &mut self.meals[slot.index()]
    }

    /// The storage key for this day (`YYYY-MM-DD`).
    #[must_use]
    pub fn key(&self) -> String {
        date_key(self.date)
    }
}

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// User settings. Only consulted when a new [`Day`] is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "dailyTargetMin")]
    pub target_min: Option<u32>,
    #[serde(rename = "dailyTargetMax")]
    pub target_max: Option<u32>,
    pub default_planned_ranges: BTreeMap<MealSlot, PlannedRange>,
}

pub const DEFAULT_TARGET: u32 = 150;

impl Default for Settings {
    fn default() -> Self {
        let ranges = MealSlot::ALL
            .into_iter()
            .map(|slot| {
                let range = match slot {
                    MealSlot::Breakfast => PlannedRange::new(70, 80),
                    MealSlot::Lunch => PlannedRange::new(40, 50),
                    MealSlot::Dinner => PlannedRange::new(30, 40),
                    _ => PlannedRange::new(0, 0),
                };
                (slot, range)
            })
            .collect();
        Self {
            target_min: Some(DEFAULT_TARGET),
            target_max: Some(DEFAULT_TARGET),
            default_planned_ranges: ranges,
        }
    }
}

impl Settings {
    /// Settings with no target and every planned range unset.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            target_min: None,
            target_max: None,
            default_planned_ranges: MealSlot::ALL
                .into_iter()
                .map(|slot| (slot, PlannedRange::default()))
                .collect(),
        }
    }

    #[must_use]
    pub fn planned_range(&self, slot: MealSlot) -> PlannedRange {
        self.default_planned_ranges
            .get(&slot)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_planned_range(&mut self, slot: MealSlot, range: PlannedRange) {
        self.default_planned_ranges.insert(slot, range);
    }

    /// Reject inverted ranges. The store itself never calls this.
    pub fn validate(&self) -> Result<()> {
        validate_range("Daily target", self.target_min, self.target_max)?;
        for slot in MealSlot::ALL {
            let range = self.planned_range(slot);
            validate_range(slot.label(), range.min, range.max)?;
        }
        Ok(())
    }
}

pub fn validate_range(label: &str, min: Option<u32>, max: Option<u32>) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max) {
        if max < min {
            bail!("{label}: maximum ({max}) must be greater than or equal to minimum ({min})");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_slot_order_is_fixed() {
        let names: Vec<&str> = MealSlot::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "breakfast",
                "intra-workout",
                "post-workout",
                "lunch",
                "snack-1",
                "snack-2",
                "snack-3",
                "dinner"
            ]
        );
        for (i, slot) in MealSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn test_slot_parse() {
        assert_eq!("breakfast".parse::<MealSlot>().unwrap(), MealSlot::Breakfast);
        assert_eq!("Snack-2".parse::<MealSlot>().unwrap(), MealSlot::Snack2);
        assert_eq!("snack_3".parse::<MealSlot>().unwrap(), MealSlot::Snack3);
        assert_eq!(
            "Intra Workout".parse::<MealSlot>().unwrap(),
            MealSlot::IntraWorkout
        );
        assert!("brunch".parse::<MealSlot>().is_err());
        assert!("".parse::<MealSlot>().is_err());
    }

    #[test]
    fn test_slot_serde_names_match_display() {
        for slot in MealSlot::ALL {
            let json = serde_json::to_string(&slot).unwrap();
            assert_eq!(json, format!("\"{slot}\""));
            let back: MealSlot = serde_json::from_str(&json).unwrap();
            assert_eq!(back, slot);
        }
    }

    #[test]
    fn test_new_day_has_every_slot_in_order() {
        let day = Day::new(date(2024, 6, 15), None, None);
        assert_eq!(day.meals().len(), MealSlot::COUNT);
        for (meal, slot) in day.meals().iter().zip(MealSlot::ALL) {
            assert_eq!(meal.slot(), slot);
            assert!(meal.actual.is_none());
            assert!(!meal.done);
        }
    }

    #[test]
    fn test_from_meals_canonicalizes() {
        let mut dinner = MealEntry::new(MealSlot::Dinner);
        dinner.actual = Some(30);
        let mut dup_dinner = MealEntry::new(MealSlot::Dinner);
        dup_dinner.actual = Some(99);
        let mut breakfast = MealEntry::new(MealSlot::Breakfast);
        breakfast.actual = Some(10);

        let day = Day::from_meals(
            date(2024, 6, 15),
            Some(100),
            Some(150),
            vec![dinner, breakfast, dup_dinner],
        );

        assert_eq!(day.meals().len(), MealSlot::COUNT);
        assert_eq!(day.meals()[0].slot(), MealSlot::Breakfast);
        assert_eq!(day.meal(MealSlot::Breakfast).actual, Some(10));
        // First entry for a slot wins
        assert_eq!(day.meal(MealSlot::Dinner).actual, Some(30));
        assert!(day.meal(MealSlot::Lunch).actual.is_none());
    }

    #[test]
    fn test_from_settings_seeds_ranges() {
        let settings = Settings::default();
        let day = Day::from_settings(date(2024, 6, 15), &settings);
        assert_eq!(day.target_min, Some(DEFAULT_TARGET));
        assert_eq!(day.target_max, Some(DEFAULT_TARGET));
        let breakfast = day.meal(MealSlot::Breakfast);
        assert_eq!(breakfast.planned_min, Some(70));
        assert_eq!(breakfast.planned_max, Some(80));
        assert_eq!(day.meal(MealSlot::Snack1).planned(), PlannedRange::new(0, 0));
        assert!(day.meals().iter().all(|m| m.actual.is_none() && !m.done));
    }

    #[test]
    fn test_meal_mut_edits_one_slot() {
        let mut day = Day::new(date(2024, 6, 15), None, None);
        day.meal_mut(MealSlot::Lunch).actual = Some(45);
        day.meal_mut(MealSlot::Lunch).done = true;
        assert_eq!(day.meal(MealSlot::Lunch).actual, Some(45));
        assert!(day.meal(MealSlot::Lunch).done);
        assert_eq!(day.meal(MealSlot::Lunch).slot(), MealSlot::Lunch);
        assert!(day.meal(MealSlot::Dinner).actual.is_none());
    }

    #[test]
    fn test_day_wire_format() {
        let mut day = Day::new(date(2024, 6, 5), Some(100), None);
        day.meal_mut(MealSlot::Breakfast).actual = Some(50);
        let value = serde_json::to_value(&day).unwrap();
        assert_eq!(value["date"], "2024-06-05");
        assert_eq!(value["dailyTargetMin"], 100);
        assert!(value["dailyTargetMax"].is_null());
        let first = &value["meals"][0];
        assert_eq!(first["type"], "breakfast");
        assert_eq!(first["actual"], 50);
        assert_eq!(first["isDone"], false);
        assert!(first["plannedMin"].is_null());
        assert_eq!(day.key(), "2024-06-05");
    }

    #[test]
    fn test_default_settings_cover_every_slot() {
        let settings = Settings::default();
        assert_eq!(settings.default_planned_ranges.len(), MealSlot::COUNT);
        assert!(settings.validate().is_ok());

        let empty = Settings::empty();
        assert_eq!(empty.default_planned_ranges.len(), MealSlot::COUNT);
        assert!(empty.target_min.is_none());
        assert_eq!(empty.planned_range(MealSlot::Lunch), PlannedRange::default());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("x", Some(10), Some(20)).is_ok());
        assert!(validate_range("x", Some(20), Some(20)).is_ok());
        assert!(validate_range("x", None, Some(5)).is_ok());
        assert!(validate_range("x", Some(5), None).is_ok());
        assert!(validate_range("x", Some(21), Some(20)).is_err());
    }

    #[test]
    fn test_settings_validate_rejects_inverted() {
        let mut settings = Settings::default();
        settings.target_min = Some(200);
        settings.target_max = Some(100);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.set_planned_range(
            MealSlot::Lunch,
            PlannedRange {
                min: Some(60),
                max: Some(50),
            },
        );
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("Lunch"));
    }
}
