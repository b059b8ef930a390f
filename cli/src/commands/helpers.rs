use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Weekday};
use serde::Serialize;
use std::process;

use larder_core::models::week_start_of;

/// Resolve a week argument to its Monday.
///
/// Accepts this/next/last (default: this) or any YYYY-MM-DD date; a date in
/// the middle of a week snaps back to that week's Monday.
pub(crate) fn parse_week(week: Option<&str>) -> Result<NaiveDate> {
    parse_week_from(week, Local::now().date_naive())
}

fn parse_week_from(week: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    let this_week = week_start_of(today);
    match week.map(str::trim) {
        None | Some("this" | "today") => Ok(this_week),
        Some("next") => Ok(this_week + chrono::Duration::weeks(1)),
        Some("last") => Ok(this_week - chrono::Duration::weeks(1)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(week_start_of)
            .with_context(|| format!("Invalid week '{s}'. Use this/next/last or YYYY-MM-DD")),
    }
}

pub(crate) fn format_week(week_start: NaiveDate) -> String {
    week_start.format("%Y-%m-%d").to_string()
}

/// Parse mon..sun or monday..sunday, any case.
pub(crate) fn parse_day(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("Invalid day '{s}'. Use mon-sun or monday-sunday"))
}

/// "100 g", "2 pc", or just "3" for unitless amounts.
pub(crate) fn format_quantity(quantity: f64, unit: Option<&str>) -> String {
    let qty = if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        let s = format!("{quantity:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    };
    match unit {
        Some(u) => format!("{qty} {u}"),
        None => qty,
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
