use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Length of the month used when normalising counts to monthly rates.
pub const DAYS_PER_MONTH: f64 = 30.0;

// ── Sheet date parsing ────────────────────────────────────────────────────────

/// Parse a day/month/year sheet date (`15/01/2024`, `5/1/2024`).
///
/// The year must have four digits. Returns `None` for blank or unrecognised
/// input, including two-digit years such as `15/01/24`.
pub fn parse_dmy(s: &str) -> Option<NaiveDate> {
    parse_with(s, "%d/%m/%Y")
}

/// Parse a month/day/year date as found in the `Date_US` column.
pub fn parse_mdy(s: &str) -> Option<NaiveDate> {
    parse_with(s, "%m/%d/%Y")
}

fn parse_with(s: &str, fmt: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    let year = trimmed.rsplit('/').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, fmt).ok()
}

/// Parse a CLI date, accepting ISO `YYYY-MM-DD` or day/month/year.
pub fn parse_cli_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_dmy(s))
}

// ── Timezone / "today" ────────────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a timezone name, treating `"auto"` as the system zone.
///
/// Unknown names fall back to UTC with a warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name == "auto" {
        get_system_timezone()
    } else {
        name.to_string()
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

/// Calendar date of `now` as seen in `tz`.
pub fn date_in_timezone(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Today's date in the named timezone. Only the binary calls this; the
/// aggregation code always receives `today` as a parameter.
pub fn today_in(tz_name: &str) -> NaiveDate {
    date_in_timezone(Utc::now(), resolve_timezone(tz_name))
}
