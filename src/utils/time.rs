use crate::components::models::EventTime;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse a Notion date string into an event time.
///
/// Notion returns either a bare `YYYY-MM-DD` (all-day) or an RFC 3339
/// date-time. Date-times without an offset are resolved in `time_zone` when
/// the property carries one, otherwise in `default_tz`.
pub fn parse_event_time(
    value: &str,
    time_zone: Option<&str>,
    default_tz: Tz,
) -> Result<EventTime, String> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(EventTime::DateTime(dt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(EventTime::Date(date));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| format!("unrecognized date '{}'", value))?;

    let tz = match time_zone {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| format!("unknown time zone '{}'", name))?,
        None => default_tz,
    };

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(EventTime::DateTime(dt.fixed_offset())),
        // Clocks going back: take the first occurrence
        LocalResult::Ambiguous(earliest, _) => Ok(EventTime::DateTime(earliest.fixed_offset())),
        LocalResult::None => Err(format!("'{}' does not exist in {}", value, tz.name())),
    }
}
