use chrono::{Datelike, NaiveDate};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Cells for a month view with weeks starting on Sunday.
///
/// One `None` per weekday before the 1st, then every date of the month.
/// An invalid year/month gives an empty grid.
#[must_use]
pub fn calendar_grid(year: i32, month: u32) -> Vec<Option<NaiveDate>> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let blanks = first.weekday().num_days_from_sunday() as usize;
    std::iter::repeat_n(None, blanks)
        .chain(
            first
                .iter_days()
                .take_while(|d| d.month() == month)
                .map(Some),
        )
        .collect()
}

#[must_use]
pub fn month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month.checked_sub(1)?).ok()?;
    MONTH_NAMES.get(index).copied()
}

/// Long form, e.g. "June 15, 2024".
#[must_use]
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}
