//! Upcasting persisted records of any schema generation to the current types.
//!
//! Stored JSON is never touched here: a record is detected as one of the known
//! versions, deserialized into that version's shape, and walked up the chain
//! `V1 -> V2 -> V3` in memory. The result is only written back when a caller
//! explicitly saves it.
//!
//! Day record generations:
//! - `V1`: a single required `dailyTarget` (older builds wrote `targetValue`)
//!   and required integer planned bounds per meal.
//! - `V2`: the single target and the planned bounds became nullable.
//! - `V3`: the single target was split into `dailyTargetMin`/`dailyTargetMax`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::models::{Day, MealEntry, MealSlot, PlannedRange, Settings, date_key};

const RANGE_KEYS: [&str; 2] = ["dailyTargetMin", "dailyTargetMax"];
const LEGACY_TARGET_KEYS: [&str; 2] = ["dailyTarget", "targetValue"];

/// Error key used when a settings record fails to migrate.
pub const SETTINGS_RECORD: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MealV1 {
    #[serde(rename = "type")]
    slot: String,
    planned_min: u32,
    planned_max: u32,
    #[serde(default)]
    actual: Option<u32>,
    #[serde(default)]
    is_done: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MealV2 {
    #[serde(rename = "type")]
    slot: String,
    #[serde(default)]
    planned_min: Option<u32>,
    #[serde(default)]
    planned_max: Option<u32>,
    #[serde(default)]
    actual: Option<u32>,
    #[serde(default)]
    is_done: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayV1 {
    #[serde(default)]
    daily_target: Option<u32>,
    #[serde(default)]
    target_value: Option<u32>,
    #[serde(default)]
    meals: Vec<MealV1>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayV2 {
    #[serde(default)]
    daily_target: Option<u32>,
    #[serde(default)]
    target_value: Option<u32>,
    #[serde(default)]
    meals: Vec<MealV2>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayV3 {
    #[serde(default)]
    daily_target_min: Option<u32>,
    #[serde(default)]
    daily_target_max: Option<u32>,
    #[serde(default)]
    meals: Vec<MealV2>,
}

impl From<MealV1> for MealV2 {
    fn from(m: MealV1) -> Self {
        MealV2 {
            slot: m.slot,
            planned_min: Some(m.planned_min),
            planned_max: Some(m.planned_max),
            actual: m.actual,
            is_done: m.is_done,
        }
    }
}

/// `dailyTarget` wins over the older `targetValue` when a record has both.
fn legacy_target(daily_target: Option<u32>, target_value: Option<u32>) -> Option<u32> {
    daily_target.or(target_value)
}

impl DayV1 {
    fn target(&self) -> Option<u32> {
        legacy_target(self.daily_target, self.target_value)
    }
}

impl From<DayV1> for DayV2 {
    fn from(d: DayV1) -> Self {
        DayV2 {
            daily_target: d.target(),
            target_value: None,
            meals: d.meals.into_iter().map(MealV2::from).collect(),
        }
    }
}

impl From<DayV2> for DayV3 {
    fn from(d: DayV2) -> Self {
        let target = legacy_target(d.daily_target, d.target_value);
        DayV3 {
            daily_target_min: target,
            daily_target_max: target,
            meals: d.meals,
        }
    }
}

impl DayV3 {
    fn into_day(self, date: NaiveDate) -> Day {
        let key = date_key(date);
        let meals = self.meals.into_iter().filter_map(|m| {
            if let Ok(slot) = m.slot.parse::<MealSlot>() {
                let mut entry = MealEntry::new(slot);
                entry.planned_min = m.planned_min;
                entry.planned_max = m.planned_max;
                entry.actual = m.actual;
                entry.done = m.is_done;
                Some(entry)
            } else {
                warn!(
                    "event=day_migrate module=migrate status=skipped key={key} reason=unknown_meal meal={}",
                    m.slot
                );
                None
            }
        });
        Day::from_meals(date, self.daily_target_min, self.daily_target_max, meals)
    }
}

#[derive(Debug)]
enum DayRecord {
    V1(DayV1),
    V2(DayV2),
    V3(DayV3),
}

impl DayRecord {
    fn detect(key: &str, value: &Value) -> StoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::malformed(key, "expected a JSON object"))?;
        let has_range = RANGE_KEYS.iter().any(|k| obj.contains_key(*k));
        let has_legacy = LEGACY_TARGET_KEYS.iter().any(|k| obj.contains_key(*k));

        if has_range || !has_legacy {
            return parse(key, value).map(DayRecord::V3);
        }
        // V1 is the strict shape; anything with nulls in it is V2.
        match DayV1::deserialize(value) {
            Ok(v1) if v1.target().is_some() => Ok(DayRecord::V1(v1)),
            _ => parse(key, value).map(DayRecord::V2),
        }
    }

    #[cfg(test)]
    fn version(&self) -> u8 {
        match self {
            DayRecord::V1(_) => 1,
            DayRecord::V2(_) => 2,
            DayRecord::V3(_) => 3,
        }
    }

    fn upcast(self) -> DayV3 {
        match self {
            DayRecord::V1(v1) => DayV3::from(DayV2::from(v1)),
            DayRecord::V2(v2) => DayV3::from(v2),
            DayRecord::V3(v3) => v3,
        }
    }
}

fn parse<T: DeserializeOwned>(key: &str, value: &Value) -> StoreResult<T> {
    T::deserialize(value).map_err(|e| StoreError::malformed(key, e))
}

/// Read a stored day record of any generation as a current [`Day`].
///
/// `date` is the storage key the record was filed under; a `date` field inside
/// the record is ignored. Meals are canonicalized: unknown meal names are
/// dropped, duplicates resolve to the first entry, missing slots are filled.
pub fn migrate_day(date: NaiveDate, value: &Value) -> StoreResult<Day> {
    let key = date_key(date);
    let record = DayRecord::detect(&key, value)?;
    Ok(record.upcast().into_day(date))
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsV1 {
    #[serde(default)]
    daily_target: Option<u32>,
    #[serde(default)]
    target_value: Option<u32>,
    #[serde(default)]
    default_planned_ranges: Option<BTreeMap<String, PlannedRange>>,
}

/// Current settings shape. The outer `Option` on each target records whether
/// the field was present at all, so merging can tell "absent" from "null".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsV2 {
    #[serde(default, deserialize_with = "present")]
    daily_target_min: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    daily_target_max: Option<Option<u32>>,
    #[serde(default)]
    default_planned_ranges: Option<BTreeMap<String, PlannedRange>>,
}

impl From<SettingsV1> for SettingsV2 {
    fn from(s: SettingsV1) -> Self {
        let target = legacy_target(s.daily_target, s.target_value);
        SettingsV2 {
            daily_target_min: Some(target),
            daily_target_max: Some(target),
            default_planned_ranges: s.default_planned_ranges,
        }
    }
}

impl SettingsV2 {
    fn apply(self, mut base: Settings) -> Settings {
        if let Some(min) = self.daily_target_min {
            base.target_min = min;
        }
        if let Some(max) = self.daily_target_max {
            base.target_max = max;
        }
        for (name, range) in self.default_planned_ranges.unwrap_or_default() {
            match name.parse::<MealSlot>() {
                Ok(slot) => base.set_planned_range(slot, range),
                Err(_) => warn!(
                    "event=settings_migrate module=migrate status=skipped reason=unknown_meal meal={name}"
                ),
            }
        }
        base
    }
}

fn detect_settings(value: &Value) -> StoreResult<SettingsV2> {
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::malformed(SETTINGS_RECORD, "expected a JSON object"))?;
    let has_range = RANGE_KEYS.iter().any(|k| obj.contains_key(*k));
    let has_legacy = LEGACY_TARGET_KEYS.iter().any(|k| obj.contains_key(*k));

    if has_legacy && !has_range {
        parse::<SettingsV1>(SETTINGS_RECORD, value).map(SettingsV2::from)
    } else {
        parse(SETTINGS_RECORD, value)
    }
}

/// Overlay a stored settings record of any generation onto `base`.
///
/// Fields present in the record win, including explicit nulls; each planned
/// range present in the record replaces only that slot's range.
pub fn merge_settings(value: &Value, base: Settings) -> StoreResult<Settings> {
    Ok(detect_settings(value)?.apply(base))
}

/// Read a stored settings record on its own, with nothing filled in from the
/// built-in defaults: absent targets stay unset and any slot missing from
/// `defaultPlannedRanges` gets an unset range.
pub fn migrate_settings(value: &Value) -> StoreResult<Settings> {
    merge_settings(value, Settings::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn detect(value: &Value) -> DayRecord {
        DayRecord::detect("test", value).unwrap()
    }

    #[test]
    fn test_detect_versions() {
        assert_eq!(detect(&json!({ "dailyTargetMin": 1 })).version(), 3);
        assert_eq!(detect(&json!({ "meals": [] })).version(), 3);
        assert_eq!(detect(&json!({ "dailyTarget": 150 })).version(), 1);
        assert_eq!(detect(&json!({ "targetValue": 150 })).version(), 1);
        assert_eq!(detect(&json!({ "dailyTarget": null })).version(), 2);
        assert_eq!(
            detect(&json!({
                "dailyTarget": 150,
                "meals": [{ "type": "lunch", "plannedMin": null, "plannedMax": 50 }]
            }))
            .version(),
            2
        );
    }

    #[test]
    fn test_both_legacy_target_keys_prefer_daily_target() {
        let value = json!({
            "dailyTarget": 120,
            "targetValue": 90,
            "meals": [{ "type": "lunch", "plannedMin": 40, "plannedMax": 50, "actual": 45, "isDone": true }]
        });
        assert_eq!(detect(&value).version(), 1);
        let day = migrate_day(date(), &value).unwrap();
        assert_eq!(day.target_min, Some(120));
        assert_eq!(day.target_max, Some(120));
        assert_eq!(day.meal(MealSlot::Lunch).actual, Some(45));

        let day = migrate_day(date(), &json!({ "dailyTarget": null, "targetValue": 90 })).unwrap();
        assert_eq!(day.target_min, Some(90));

        let settings = migrate_settings(&json!({ "dailyTarget": 130, "targetValue": 90 })).unwrap();
        assert_eq!(settings.target_min, Some(130));
        assert_eq!(settings.target_max, Some(130));
    }

    #[test]
    fn test_legacy_target_value_upcasts_to_range() {
        let day = migrate_day(date(), &json!({ "targetValue": 150 })).unwrap();
        assert_eq!(day.target_min, Some(150));
        assert_eq!(day.target_max, Some(150));
        assert_eq!(day.meals().len(), MealSlot::COUNT);
    }

    #[test]
    fn test_v1_required_planned_bounds_pass_through() {
        let value = json!({
            "date": "2024-06-15",
            "dailyTarget": 120,
            "meals": [
                { "type": "breakfast", "plannedMin": 70, "plannedMax": 80, "actual": 75, "isDone": true },
                { "type": "lunch", "plannedMin": 40, "plannedMax": 50, "actual": null, "isDone": false }
            ]
        });
        let day = migrate_day(date(), &value).unwrap();
        assert_eq!(day.target_min, Some(120));
        assert_eq!(day.target_max, Some(120));
        let breakfast = day.meal(MealSlot::Breakfast);
        assert_eq!(breakfast.planned(), PlannedRange::new(70, 80));
        assert_eq!(breakfast.actual, Some(75));
        assert!(breakfast.done);
        assert_eq!(day.meal(MealSlot::Lunch).planned(), PlannedRange::new(40, 50));
        assert!(day.meal(MealSlot::Dinner).planned_min.is_none());
    }

    #[test]
    fn test_v2_null_target_stays_unset() {
        let value = json!({
            "dailyTarget": null,
            "meals": [{ "type": "dinner", "plannedMin": null, "plannedMax": null, "actual": 30, "isDone": false }]
        });
        let day = migrate_day(date(), &value).unwrap();
        assert!(day.target_min.is_none());
        assert!(day.target_max.is_none());
        assert_eq!(day.meal(MealSlot::Dinner).actual, Some(30));
    }

    #[test]
    fn test_range_fields_take_priority_over_legacy() {
        let value = json!({ "dailyTarget": 999, "dailyTargetMin": 100, "dailyTargetMax": 150 });
        let day = migrate_day(date(), &value).unwrap();
        assert_eq!(day.target_min, Some(100));
        assert_eq!(day.target_max, Some(150));
    }

    #[test]
    fn test_current_record_is_unchanged() {
        let mut day = Day::new(date(), Some(100), Some(150));
        day.meal_mut(MealSlot::Breakfast).actual = Some(50);
        day.meal_mut(MealSlot::Breakfast).done = true;
        day.meal_mut(MealSlot::Lunch).planned_min = Some(40);
        day.meal_mut(MealSlot::Snack2).actual = Some(0);

        let stored = serde_json::to_value(&day).unwrap();
        let migrated = migrate_day(date(), &stored).unwrap();
        assert_eq!(migrated, day);
        assert_eq!(serde_json::to_value(&migrated).unwrap(), stored);

        let again = migrate_day(date(), &serde_json::to_value(&migrated).unwrap()).unwrap();
        assert_eq!(again, migrated);
    }

    #[test]
    fn test_meals_are_canonicalized() {
        let value = json!({
            "dailyTargetMin": null,
            "dailyTargetMax": null,
            "meals": [
                { "type": "dinner", "actual": 30, "isDone": false },
                { "type": "brunch", "actual": 500, "isDone": false },
                { "type": "breakfast", "actual": 10, "isDone": false },
                { "type": "dinner", "actual": 99, "isDone": true }
            ]
        });
        let day = migrate_day(date(), &value).unwrap();
        let slots: Vec<MealSlot> = day.meals().iter().map(MealEntry::slot).collect();
        assert_eq!(slots, MealSlot::ALL.to_vec());
        assert_eq!(day.meal(MealSlot::Breakfast).actual, Some(10));
        assert_eq!(day.meal(MealSlot::Dinner).actual, Some(30));
        assert!(!day.meal(MealSlot::Dinner).done);
    }

    #[test]
    fn test_malformed_day_records() {
        for bad in [
            json!("2024-06-15"),
            json!([1, 2, 3]),
            json!(null),
            json!({ "dailyTargetMin": "lots" }),
            json!({ "dailyTargetMin": -5 }),
            json!({ "meals": [{ "type": "lunch", "actual": "abc" }] }),
            json!({ "meals": { "lunch": 5 } }),
            json!({ "dailyTarget": "high" }),
        ] {
            let err = migrate_day(date(), &bad).unwrap_err();
            assert!(
                matches!(err, StoreError::MalformedRecord { ref key, .. } if key == "2024-06-15"),
                "{bad} -> {err}"
            );
        }
    }

    #[test]
    fn test_legacy_settings_upcast() {
        let value = json!({
            "dailyTarget": 150,
            "defaultPlannedRanges": { "breakfast": { "min": 70, "max": 80 } }
        });
        let settings = migrate_settings(&value).unwrap();
        assert_eq!(settings.target_min, Some(150));
        assert_eq!(settings.target_max, Some(150));
        assert_eq!(settings.planned_range(MealSlot::Breakfast), PlannedRange::new(70, 80));
        // Missing slots are synthesized as unset ranges
        assert_eq!(settings.default_planned_ranges.len(), MealSlot::COUNT);
        assert_eq!(settings.planned_range(MealSlot::Dinner), PlannedRange::default());
    }

    #[test]
    fn test_merge_settings_over_defaults() {
        let value = json!({
            "dailyTargetMin": null,
            "defaultPlannedRanges": {
                "lunch": { "min": 10, "max": 20 },
                "elevenses": { "min": 1, "max": 2 }
            }
        });
        let settings = merge_settings(&value, Settings::default()).unwrap();
        // Present null wins, absent field keeps the default
        assert!(settings.target_min.is_none());
        assert_eq!(settings.target_max, Settings::default().target_max);
        assert_eq!(settings.planned_range(MealSlot::Lunch), PlannedRange::new(10, 20));
        assert_eq!(
            settings.planned_range(MealSlot::Breakfast),
            Settings::default().planned_range(MealSlot::Breakfast)
        );
        assert_eq!(settings.default_planned_ranges.len(), MealSlot::COUNT);
    }

    #[test]
    fn test_current_settings_unchanged() {
        let mut settings = Settings::default();
        settings.target_min = Some(90);
        settings.set_planned_range(
            MealSlot::Snack1,
            PlannedRange {
                min: None,
                max: Some(15),
            },
        );
        let stored = serde_json::to_value(&settings).unwrap();
        let migrated = migrate_settings(&stored).unwrap();
        assert_eq!(migrated, settings);
        assert_eq!(serde_json::to_value(&migrated).unwrap(), stored);
    }

    #[test]
    fn test_malformed_settings() {
        for bad in [
            json!(42),
            json!({ "dailyTargetMax": "x" }),
            json!({ "defaultPlannedRanges": [1, 2] }),
            json!({ "defaultPlannedRanges": { "lunch": { "min": "a" } } }),
        ] {
            let err = migrate_settings(&bad).unwrap_err();
            assert!(matches!(err, StoreError::MalformedRecord { .. }), "{bad}");
        }
    }
}
