//! Current date and time tool.

use chrono::{Datelike, Utc};
use chrono_tz::America::Los_Angeles;
use serde_json::{Value, json};

/// Current date and time in `America/Los_Angeles`.
///
/// Returns the ISO date, numeric year/month/day, the uppercase English
/// weekday, the literal timezone label `PST`, and a 12-hour formatted time.
pub fn current_date_and_time() -> Value {
    let now = Utc::now().with_timezone(&Los_Angeles);
    json!({
        "date": now.format("%Y-%m-%d").to_string(),
        "year": now.year(),
        "month": now.month(),
        "day": now.day(),
        "dayOfWeek": now.format("%A").to_string().to_uppercase(),
        "timezone": "PST",
        "formattedTime": now.format("%-I:%M %p").to_string(),
    })
}
