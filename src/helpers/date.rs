//! Date helper functions

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Spanish long date
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// let date = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
/// assert_eq!(crianzas::helpers::long_date_es(&date), "5 de enero de 2025");
/// ```
pub fn long_date_es<Z: TimeZone>(date: &DateTime<Z>) -> String {
    format!(
        "{} de {} de {}",
        date.day(),
        MONTHS_ES[date.month0() as usize],
        date.year()
    )
}

/// Format a UTC timestamp in the site timezone.
///
/// `long` selects the Spanish long date; anything else is a chrono format
/// string.
pub fn format_date(date: &DateTime<Utc>, tz: Tz, format: &str) -> String {
    let local = date.with_timezone(&tz);
    if format.is_empty() || format == "long" {
        long_date_es(&local)
    } else {
        local.format(format).to_string()
    }
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// `YYYY-MM-DD` in the site timezone, for date inputs
pub fn input_date(date: &DateTime<Utc>, tz: Tz) -> String {
    date.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// Parse a date input as midnight in the site timezone
pub fn parse_input_date(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
