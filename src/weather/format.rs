use super::WeatherSnapshot;
use chrono::{Duration, NaiveDate};

/// Conversational one-paragraph summary of a forecast.
pub fn format_forecast(
    snapshot: &WeatherSnapshot,
    partner_name: Option<&str>,
    today: NaiveDate,
) -> String {
    let mut text = match partner_name {
        Some(partner) => format!(
            "The weather in {} for your visit to {} ",
            snapshot.location, partner
        ),
        None => format!("The weather in {} ", snapshot.location),
    };

    if snapshot.date == today {
        text.push_str("today ");
    } else if snapshot.date == today + Duration::days(1) {
        text.push_str("tomorrow ");
    } else {
        text.push_str(&format!("on {} ", snapshot.date.format("%A, %B %d")));
    }

    text.push_str(&format!(
        "will be {} with temperatures around {}°C ({}°F).",
        snapshot.condition, snapshot.temperature_c, snapshot.temperature_f
    ));

    let precip = snapshot.precipitation_probability;
    if precip > 50 {
        text.push_str(&format!(" There's a {}% chance of rain - pack an umbrella!", precip));
    } else if precip > 20 {
        text.push_str(&format!(" There's a {}% chance of rain.", precip));
    }

    if snapshot.temperature_c < 5 {
        text.push_str(" It will be quite cold, so dress warmly.");
    } else if snapshot.temperature_c > 30 {
        text.push_str(" It will be hot, so stay hydrated and consider light clothing.");
    }

    text
}
