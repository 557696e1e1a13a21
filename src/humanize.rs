use chrono::{DateTime, Duration, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

pub fn relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    if delta < Duration::zero() {
        format!("in {}", span((-delta).num_seconds()))
    } else {
        format!("{} ago", span(delta.num_seconds()))
    }
}

fn span(seconds: i64) -> String {
    let (one, many, unit) = match seconds {
        s if s < MINUTE => ("about a second", "seconds", 1),
        s if s < HOUR => ("about a minute", "minutes", MINUTE),
        s if s < DAY => ("about an hour", "hours", HOUR),
        s if s < MONTH => ("one day", "days", DAY),
        s if s < YEAR => ("one month", "months", MONTH),
        _ => ("one year", "years", YEAR),
    };
    match seconds / unit {
        0 | 1 => one.to_string(),
        n => format!("{n} {many}"),
    }
}
