use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use carbs_core::derive::{self, TargetStatus};
use carbs_core::models::{Day, MealSlot};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn parse_meal(s: &str) -> Result<MealSlot> {
    s.parse()
}

pub(crate) fn fmt_opt(v: Option<u32>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) fn fmt_range(min: Option<u32>, max: Option<u32>) -> String {
    match (min, max) {
        (None, None) => "-".to_string(),
        (Some(a), Some(b)) if a == b => format!("{a}g"),
        (Some(a), Some(b)) => format!("{a}-{b}g"),
        (None, Some(b)) => format!("≤{b}g"),
        (Some(a), None) => format!("≥{a}g"),
    }
}

pub(crate) fn status_label(status: TargetStatus) -> &'static str {
    match status {
        TargetStatus::NotSet => "no target",
        TargetStatus::Within => "within target",
        TargetStatus::Below => "below target",
        TargetStatus::Above => "above target",
    }
}

pub(crate) fn print_day_table(day: &Day) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Planned")]
        planned: String,
        #[tabled(rename = "Actual")]
        actual: String,
        #[tabled(rename = "Done")]
        done: String,
    }

    let rows: Vec<MealRow> = day
        .meals()
        .iter()
        .map(|m| MealRow {
            meal: m.slot().label().to_string(),
            planned: fmt_range(m.planned_min, m.planned_max),
            actual: m.actual.map_or_else(|| "-".to_string(), |a| format!("{a}g")),
            done: if m.done { "x" } else { "" }.to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let summary = derive::summarize(day);
    let total = summary.total_actual;
    let planned = fmt_range(Some(summary.total_planned_min), Some(summary.total_planned_max));
    println!("  TOTAL: {total}g (planned {planned})");
    println!(
        "  TARGET: {} ({})",
        fmt_range(day.target_min, day.target_max),
        status_label(summary.status)
    );
    if let (Some(to_min), Some(to_max)) = (summary.remaining.to_min, summary.remaining.to_max) {
        println!("  REMAINING: {to_min}g to min, {to_max}g to max");
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}
