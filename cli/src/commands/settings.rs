use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use carbs_core::Tracker;
use carbs_core::models::{MealSlot, PlannedRange, Settings};

use super::helpers::{fmt_opt, fmt_range, parse_meal};

fn print_settings(settings: &Settings, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RangeRow {
        #[tabled(rename = "Meal")]
        meal: &'static str,
        #[tabled(rename = "Min")]
        min: String,
        #[tabled(rename = "Max")]
        max: String,
    }

    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    println!(
        "Daily target: {}",
        fmt_range(settings.target_min, settings.target_max)
    );
    println!("Default planned ranges:");
    let rows: Vec<RangeRow> = MealSlot::ALL
        .into_iter()
        .map(|slot| {
            let range = settings.planned_range(slot);
            RangeRow {
                meal: slot.label(),
                min: fmt_opt(range.min),
                max: fmt_opt(range.max),
            }
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("\nChanges apply to days created from now on.");
    Ok(())
}

pub(crate) fn cmd_settings_show(tracker: &Tracker, json: bool) -> Result<()> {
    print_settings(&tracker.settings(), json)
}

pub(crate) fn cmd_settings_target(
    tracker: &Tracker,
    min: Option<u32>,
    max: Option<u32>,
    clear: bool,
    json: bool,
) -> Result<()> {
    if min.is_none() && max.is_none() && !clear {
        bail!("Nothing to set. Provide --min, --max, or --clear");
    }
    let mut settings = tracker.settings();
    if clear {
        settings.target_min = None;
        settings.target_max = None;
    }
    if min.is_some() {
        settings.target_min = min;
    }
    if max.is_some() {
        settings.target_max = max;
    }
    tracker.update_settings(&settings)?;
    print_settings(&settings, json)
}

pub(crate) fn cmd_settings_range(
    tracker: &Tracker,
    meal: &str,
    min: Option<u32>,
    max: Option<u32>,
    json: bool,
) -> Result<()> {
    if min.is_none() && max.is_none() {
        bail!("Nothing to set. Provide --min, --max, or both");
    }
    let slot = parse_meal(meal)?;
    let mut settings = tracker.settings();
    let current = settings.planned_range(slot);
    settings.set_planned_range(
        slot,
        PlannedRange {
            min: min.or(current.min),
            max: max.or(current.max),
        },
    );
    tracker.update_settings(&settings)?;
    print_settings(&settings, json)
}
