use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::process;

use carbs_core::calendar::format_display_date;
use carbs_core::derive;
use carbs_core::models::{Day, validate_range};
use carbs_core::{CopyMode, StoreError, Tracker};

use super::helpers::{json_error, parse_date, parse_meal, print_day_table};

fn print_day(day: &Day, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "day": day,
                "summary": derive::summarize(day),
            }))?
        );
    } else {
        println!("=== {} ===\n", format_display_date(day.date));
        print_day_table(day);
    }
    Ok(())
}

pub(crate) fn cmd_day_show(tracker: &Tracker, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    print_day(&tracker.day(date), json)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_day_set(
    tracker: &Tracker,
    meal: &str,
    date: Option<String>,
    actual: Option<u32>,
    clear_actual: bool,
    min: Option<u32>,
    max: Option<u32>,
    json: bool,
) -> Result<()> {
    if actual.is_none() && !clear_actual && min.is_none() && max.is_none() {
        bail!("Nothing to set. Provide at least one of --actual, --clear-actual, --min, or --max");
    }
    let slot = parse_meal(meal)?;
    let date = parse_date(date)?;

    let mut day = tracker.day(date);
    if min.is_some() || max.is_some() {
        let current = day.meal(slot).planned();
        let min = min.or(current.min);
        let max = max.or(current.max);
        validate_range(slot.label(), min, max)?;
        day = tracker.set_planned(date, slot, min, max);
    }
    if actual.is_some() || clear_actual {
        day = tracker.set_actual(date, slot, actual);
    }

    print_day(&day, json)
}

pub(crate) fn cmd_day_target(
    tracker: &Tracker,
    date: Option<String>,
    min: Option<u32>,
    max: Option<u32>,
    json: bool,
) -> Result<()> {
    if min.is_none() && max.is_none() {
        bail!("Nothing to set. Provide --min, --max, or both");
    }
    let date = parse_date(date)?;
    let day = tracker.day(date);
    let min = min.or(day.target_min);
    let max = max.or(day.target_max);
    validate_range("Daily target", min, max)?;
    print_day(&tracker.set_target(date, min, max), json)
}

pub(crate) fn cmd_day_done(
    tracker: &Tracker,
    meal: &str,
    date: Option<String>,
    undo: bool,
    json: bool,
) -> Result<()> {
    let slot = parse_meal(meal)?;
    let date = parse_date(date)?;
    let day = tracker.set_done(date, slot, !undo);

    if json {
        return print_day(&day, json);
    }
    let state = if undo { "not done" } else { "done" };
    println!(
        "{} on {} marked {state}",
        slot.label(),
        format_display_date(date)
    );
    Ok(())
}

pub(crate) fn cmd_day_reset(tracker: &Tracker, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let day = tracker.reset_day(date);
    if !json {
        println!("Reset {}\n", format_display_date(date));
    }
    print_day(&day, json)
}

pub(crate) fn cmd_day_copy(
    tracker: &Tracker,
    from: &str,
    to: Option<String>,
    planned: bool,
    json: bool,
) -> Result<()> {
    let source = parse_date(Some(from.to_string()))?;
    let target = parse_date(to)?;
    if source == target {
        bail!("Source and destination are the same day");
    }
    let mode = if planned {
        CopyMode::Planned
    } else {
        CopyMode::Actual
    };

    let Some(day) = tracker.copy_from(source, target, mode) else {
        let message = format!("No day stored for {source}");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    };

    if !json {
        let what = if planned { "planned ranges" } else { "actual values" };
        println!(
            "Copied {what} from {} to {}\n",
            format_display_date(source),
            format_display_date(target)
        );
    }
    print_day(&day, json)
}

pub(crate) fn cmd_day_delete(tracker: &Tracker, date: &str, json: bool) -> Result<()> {
    let date: NaiveDate = parse_date(Some(date.to_string()))?;
    let existed = matches!(
        tracker.store().load_entry(date),
        Ok(Some(_)) | Err(StoreError::MalformedRecord { .. })
    );
    tracker.delete_day(date);

    if existed {
        if json {
            println!("{}", serde_json::json!({ "deleted": date }));
        } else {
            println!("Deleted {}", format_display_date(date));
        }
        Ok(())
    } else {
        let message = format!("No day stored for {date}");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }
}
