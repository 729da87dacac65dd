use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use carbs_core::Tracker;
use carbs_core::calendar::{format_display_date, month_name};
use carbs_core::derive::{self, DayColor};
use carbs_core::service::CalendarCell;

use super::helpers::{fmt_range, status_label};

pub(crate) fn cmd_history(tracker: &Tracker, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Done")]
        done: String,
    }

    let summaries: Vec<_> = tracker.history().iter().map(derive::summarize).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        eprintln!("No days tracked yet");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| HistoryRow {
            date: s.date.clone(),
            total: format!("{}g", s.total_actual),
            target: fmt_range(s.target_min, s.target_max),
            status: status_label(s.status).to_string(),
            done: format!("{}/{}", s.meals_done, carbs_core::MealSlot::COUNT),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

fn color_mark(color: DayColor) -> char {
    match color {
        DayColor::Empty => ' ',
        DayColor::Within => '=',
        DayColor::Below => '-',
        DayColor::Above => '+',
    }
}

fn render_cell(cell: &CalendarCell) -> String {
    match cell.date {
        None => "    ".to_string(),
        Some(date) => format!("{:>3}{}", date.day(), color_mark(cell.color)),
    }
}

/// Rows of seven cells for a month grid.
fn render_weeks(cells: &[CalendarCell]) -> Vec<String> {
    cells
        .chunks(7)
        .map(|week| {
            week.iter()
                .map(render_cell)
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

pub(crate) fn cmd_calendar(
    tracker: &Tracker,
    year: Option<i32>,
    month: Option<u32>,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or_else(|| today.year());
    let month = month.unwrap_or_else(|| today.month());
    let name = month_name(month).with_context(|| format!("Invalid month {month}. Use 1-12"))?;

    let cells = tracker.month(year, month);

    if json {
        println!("{}", serde_json::to_string_pretty(&cells)?);
        return Ok(());
    }

    println!("{name} {year}");
    println!(" Sun Mon Tue Wed Thu Fri Sat");
    for line in render_weeks(&cells) {
        println!("{line}");
    }
    println!("\n  = within  - below  + above");

    let tracked: Vec<&CalendarCell> = cells.iter().filter(|c| c.total_actual > 0).collect();
    if !tracked.is_empty() {
        println!();
        for cell in tracked {
            if let Some(date) = cell.date {
                println!("  {}: {}g", format_display_date(date), cell.total_actual);
            }
        }
    }

    Ok(())
}
