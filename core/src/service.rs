use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

use crate::calendar::calendar_grid;
use crate::derive::{self, DayColor};
use crate::error::StoreError;
use crate::models::{Day, MealSlot, Settings, date_key};
use crate::store::Store;

/// What [`Tracker::copy_from`] carries over from the source day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Logged amounts and done flags.
    Actual,
    /// Planned min/max per meal.
    Planned,
}

/// One square of a month view. `date` is `None` for leading blanks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: Option<NaiveDate>,
    pub tracked: bool,
    pub total_actual: u32,
    pub color: DayColor,
}

/// What is stored under a date, as far as the tracker cares.
enum Stored {
    Day(Day),
    Missing,
    /// Present but unreadable. Left alone until a copy of it exists.
    Unreadable,
}

/// Day-level operations used by the front ends, on top of a [`Store`].
pub struct Tracker<'s> {
    store: &'s Store,
}

impl<'s> Tracker<'s> {
    #[must_use]
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &'s Store {
        self.store
    }

    fn stored(&self, date: NaiveDate) -> Stored {
        match self.store.load_entry(date) {
            Ok(Some(day)) => Stored::Day(day),
            Ok(None) => Stored::Missing,
            Err(StoreError::MalformedRecord { key, reason }) if key == date_key(date) => {
                warn!("event=day_load module=service status=malformed date={date} error={reason}");
                Stored::Unreadable
            }
            Err(err) => {
                debug!("event=day_load module=service status=fallback date={date} error={err}");
                Stored::Missing
            }
        }
    }

    /// The stored day, or a default one which is saved before returning.
    ///
    /// If the stored entry cannot be read, a default day is returned and the
    /// entry is left as it is.
    pub fn day(&self, date: NaiveDate) -> Day {
        match self.stored(date) {
            Stored::Day(day) => day,
            Stored::Unreadable => self.store.create_default_day(date),
            Stored::Missing => {
                let day = self.store.create_default_day(date);
                self.store.save(&day);
                day
            }
        }
    }

    /// Days with anything logged, newest first.
    pub fn history(&self) -> Vec<Day> {
        self.store
            .load_all()
            .into_values()
            .rev()
            .filter(|day| !derive::is_empty(day))
            .collect()
    }

    pub fn settings(&self) -> Settings {
        self.store.load_settings()
    }

    /// Validate and persist. Existing days keep the targets they were created with.
    pub fn update_settings(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        self.store.save_settings(settings);
        info!("event=settings_update module=service status=ok");
        Ok(())
    }

    /// Apply `change` to the day and save it. An unreadable entry is copied
    /// aside before a default day replaces it; if the copy fails nothing is saved.
    fn edit(&self, date: NaiveDate, change: impl FnOnce(&mut Day)) -> Day {
        let (mut day, persist) = match self.stored(date) {
            Stored::Day(day) => (day, true),
            Stored::Missing => (self.store.create_default_day(date), true),
            Stored::Unreadable => (
                self.store.create_default_day(date),
                self.store.backup_entry(date).is_some(),
            ),
        };
        change(&mut day);
        if persist {
            self.store.save(&day);
        } else {
            warn!("event=day_edit module=service status=unsaved reason=backup_failed date={date}");
        }
        day
    }

    /// Set or clear the logged amount for one meal.
    pub fn set_actual(&self, date: NaiveDate, slot: MealSlot, actual: Option<u32>) -> Day {
        self.edit(date, |day| day.meal_mut(slot).actual = actual)
    }

    pub fn set_planned(
        &self,
        date: NaiveDate,
        slot: MealSlot,
        min: Option<u32>,
        max: Option<u32>,
    ) -> Day {
        self.edit(date, |day| {
            let meal = day.meal_mut(slot);
            meal.planned_min = min;
            meal.planned_max = max;
        })
    }

    pub fn set_target(&self, date: NaiveDate, min: Option<u32>, max: Option<u32>) -> Day {
        self.edit(date, |day| {
            day.target_min = min;
            day.target_max = max;
        })
    }

    pub fn set_done(&self, date: NaiveDate, slot: MealSlot, done: bool) -> Day {
        self.edit(date, |day| day.meal_mut(slot).done = done)
    }

    pub fn toggle_done(&self, date: NaiveDate, slot: MealSlot) -> Day {
        self.edit(date, |day| {
            let meal = day.meal_mut(slot);
            meal.done = !meal.done;
        })
    }

    /// Replace the day with a fresh one built from the current settings.
    pub fn reset_day(&self, date: NaiveDate) -> Day {
        let fresh = self.store.create_default_day(date);
        let day = self.edit(date, |day| *day = fresh);
        info!("event=day_reset module=service status=ok date={}", day.key());
        day
    }

    /// Copy one aspect of every meal from `source` onto `target`.
    ///
    /// Returns `None` and changes nothing when no day is stored for `source`.
    /// Targets of the destination day are left alone.
    pub fn copy_from(&self, source: NaiveDate, target: NaiveDate, mode: CopyMode) -> Option<Day> {
        let from = self.store.load(source)?;
        let day = self.edit(target, |day| {
            for meal in from.meals() {
                let dest = day.meal_mut(meal.slot());
                match mode {
                    CopyMode::Actual => {
                        dest.actual = meal.actual;
                        dest.done = meal.done;
                    }
                    CopyMode::Planned => {
                        dest.planned_min = meal.planned_min;
                        dest.planned_max = meal.planned_max;
                    }
                }
            }
        });
        info!(
            "event=day_copy module=service status=ok from={} to={} mode={mode:?}",
            from.key(),
            day.key()
        );
        Some(day)
    }

    pub fn delete_day(&self, date: NaiveDate) {
        self.store.delete(date);
    }

    /// Month view annotated with each stored day's colour and total.
    /// Days that were never stored are not created.
    pub fn month(&self, year: i32, month: u32) -> Vec<CalendarCell> {
        let days = self.store.load_all();
        calendar_grid(year, month)
            .into_iter()
            .map(|date| {
                let day = date.and_then(|d| days.get(&d));
                CalendarCell {
                    date,
                    tracked: day.is_some(),
                    total_actual: day.map_or(0, derive::total_actual),
                    color: day.map_or(DayColor::Empty, derive::day_color),
                }
            })
            .collect()
    }
}
