use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// Hour before which activity still belongs to the previous day's list.
pub const ROLLOVER_HOUR: u32 = 3;

/// Date of the daily list that is active at `local`.
pub fn effective_date(local: NaiveDateTime) -> NaiveDate {
    if local.hour() < ROLLOVER_HOUR {
        local.date() - Duration::days(1)
    } else {
        local.date()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{value}': {e}"))
}
