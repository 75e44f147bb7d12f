use crate::error::{Result, TripcastError};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use std::sync::OnceLock;

fn days_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:in\s+)?(\d+|a|one|two|three|four|five|six|seven)\s+days?(?:\s+from\s+now)?$")
            .expect("valid days pattern")
    })
}

fn number_word(word: &str) -> Option<i64> {
    match word {
        "a" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        other => other.parse::<u16>().ok().map(i64::from),
    }
}

/// Resolve a date expression relative to `today`.
///
/// Accepts ISO dates (`2026-10-20`), `today`, `tomorrow`,
/// `day after tomorrow`, `next week`, `in 3 days` / `3 days from now`, and
/// weekday names, which resolve to the next occurrence after today.
pub fn resolve_date(expression: &str, today: NaiveDate) -> Result<NaiveDate> {
    let lowered = expression.trim().to_lowercase();
    let text = lowered.trim_end_matches(['?', '.', '!']).trim();

    match text {
        "" | "today" | "now" | "tonight" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "day after tomorrow" | "the day after tomorrow" => return Ok(today + Duration::days(2)),
        "next week" | "in a week" | "a week from now" => return Ok(today + Duration::days(7)),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Some(caps) = days_pattern().captures(text) {
        if let Some(days) = caps.get(1).and_then(|m| number_word(m.as_str())) {
            return Ok(today + Duration::days(days));
        }
    }

    let weekday_text = text
        .strip_prefix("next ")
        .or_else(|| text.strip_prefix("this "))
        .or_else(|| text.strip_prefix("on "))
        .unwrap_or(text);
    if let Ok(weekday) = weekday_text.parse::<Weekday>() {
        return Ok(next_weekday(today, weekday));
    }

    Err(TripcastError::InvalidArguments(format!(
        "could not understand the date '{}'; use YYYY-MM-DD",
        expression.trim()
    )))
}

/// Next occurrence of `weekday` strictly after `today`.
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}
