use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Label used for rows whose platform cell is blank.
pub const UNSPECIFIED_PLATFORM: &str = "Unspecified";

/// Longest accepted `last_days` window, roughly a century.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Pipeline stage recorded as a flag column on every application row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusFlag {
    Inbound,
    Dialogue,
    Declined,
    Accepted,
}

impl StatusFlag {
    /// All flags in sheet column order.
    pub const ALL: [StatusFlag; 4] = [
        StatusFlag::Inbound,
        StatusFlag::Dialogue,
        StatusFlag::Declined,
        StatusFlag::Accepted,
    ];

    /// Column header used for this flag in the source table.
    pub fn column_name(&self) -> &'static str {
        match self {
            StatusFlag::Inbound => "Inbound",
            StatusFlag::Dialogue => "Dialogue",
            StatusFlag::Declined => "Declined",
            StatusFlag::Accepted => "Accepted",
        }
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for StatusFlag {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        StatusFlag::ALL
            .into_iter()
            .find(|flag| flag.column_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TrackerError::UnknownStatus(s.to_string()))
    }
}

/// How a raw flag cell is read as a boolean.
///
/// Exactly one rule is in force for a run; it is never inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// The trimmed cell equals `Yes` (ASCII case-insensitive).
    #[default]
    Yes,
    /// The trimmed cell is non-empty.
    Present,
}

impl MatchRule {
    pub fn matches(&self, cell: Option<&str>) -> bool {
        let Some(value) = cell.map(str::trim) else {
            return false;
        };
        match self {
            MatchRule::Yes => value.eq_ignore_ascii_case("yes"),
            MatchRule::Present => !value.is_empty(),
        }
    }
}

impl FromStr for MatchRule {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(MatchRule::Yes),
            "present" => Ok(MatchRule::Present),
            other => Err(TrackerError::Config(format!("unknown match rule: {other}"))),
        }
    }
}

/// One job application, validated at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// 1-based line in the source table (header is line 1).
    pub line: usize,
    /// Sequence number from the `No` column, when numeric.
    pub number: Option<u32>,
    pub job: String,
    /// Application date (the `Date` column, day/month/year).
    pub date: NaiveDate,
    /// Informational month/day/year copy from `Date_US`.
    pub date_us: Option<NaiveDate>,
    pub inbound: Option<String>,
    pub dialogue: Option<String>,
    pub declined: Option<String>,
    pub accepted: Option<String>,
    /// Source platform label; blank cells become [`UNSPECIFIED_PLATFORM`].
    pub platform: String,
    #[serde(default)]
    pub notes: String,
}

impl ApplicationRecord {
    /// Raw cell for `flag`, `None` when the cell was blank.
    pub fn flag(&self, flag: StatusFlag) -> Option<&str> {
        match flag {
            StatusFlag::Inbound => self.inbound.as_deref(),
            StatusFlag::Dialogue => self.dialogue.as_deref(),
            StatusFlag::Declined => self.declined.as_deref(),
            StatusFlag::Accepted => self.accepted.as_deref(),
        }
    }

    pub fn has_status(&self, flag: StatusFlag, rule: MatchRule) -> bool {
        rule.matches(self.flag(flag))
    }
}

// ── Time windows ──────────────────────────────────────────────────────────────

/// Lower bound of a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowKind {
    /// Records dated within the last `days` days.
    LastDays { days: u32 },
    /// Records dated on or after `date`.
    Since { date: NaiveDate },
    /// Every record up to today.
    AllTime,
}

/// A named, date-bounded filter over the record table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub name: String,
    #[serde(flatten)]
    pub kind: WindowKind,
}

impl TimeWindow {
    pub fn last_days(name: impl Into<String>, days: u32) -> Self {
        Self {
            name: name.into(),
            kind: WindowKind::LastDays { days },
        }
    }

    pub fn since(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            kind: WindowKind::Since { date },
        }
    }

    pub fn all_time(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: WindowKind::AllTime,
        }
    }

    /// The default dashboard windows: last 30 days, last 90 days, overall.
    pub fn defaults() -> Vec<TimeWindow> {
        vec![
            TimeWindow::last_days("Last 30 Days", 30),
            TimeWindow::last_days("Last 90 Days", 90),
            TimeWindow::all_time("Overall"),
        ]
    }

    /// Reject `last_days` windows longer than [`MAX_WINDOW_DAYS`].
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            WindowKind::LastDays { days } if days > MAX_WINDOW_DAYS => {
                Err(TrackerError::InvalidWindow(format!(
                    "window \"{}\" spans {} days (max {})",
                    self.name, days, MAX_WINDOW_DAYS
                )))
            }
            _ => Ok(()),
        }
    }

    /// Pin the window to concrete dates relative to `today`.
    ///
    /// `campaign_start` is only consulted by [`WindowKind::AllTime`] to give
    /// the window a span for rate normalisation. Fails when the cutoff falls
    /// outside the representable date range.
    pub fn resolve(
        &self,
        today: NaiveDate,
        campaign_start: Option<NaiveDate>,
    ) -> Result<ResolvedWindow> {
        let (cutoff, span_days) = match &self.kind {
            WindowKind::LastDays { days } => {
                let days = i64::from(*days);
                let cutoff = today
                    .checked_sub_signed(Duration::days(days))
                    .ok_or_else(|| {
                        TrackerError::InvalidWindow(format!(
                            "window \"{}\" reaches before the earliest date",
                            self.name
                        ))
                    })?;
                (Some(cutoff), Some(days))
            }
            WindowKind::Since { date } => (Some(*date), Some((today - *date).num_days())),
            WindowKind::AllTime => (None, campaign_start.map(|s| (today - s).num_days())),
        };
        Ok(ResolvedWindow {
            name: self.name.clone(),
            cutoff,
            end: today,
            span_days,
        })
    }
}

/// Parse a CLI window definition: `NAME=DAYS`, `NAME=since:D/M/YYYY` or
/// `NAME=all`.
impl FromStr for TimeWindow {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, spec) = s
            .split_once('=')
            .ok_or_else(|| TrackerError::InvalidWindow(format!("expected NAME=SPEC, got {s:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::InvalidWindow(format!("empty window name in {s:?}")));
        }
        let spec = spec.trim();

        if spec.eq_ignore_ascii_case("all") {
            return Ok(TimeWindow::all_time(name));
        }
        if let Some(date) = spec.strip_prefix("since:") {
            let date = crate::time_utils::parse_dmy(date)
                .ok_or_else(|| TrackerError::InvalidWindow(format!("bad date in {s:?}")))?;
            return Ok(TimeWindow::since(name, date));
        }
        let days: u32 = spec
            .parse()
            .map_err(|_| TrackerError::InvalidWindow(format!("bad day count in {s:?}")))?;
        let window = TimeWindow::last_days(name, days);
        window.validate()?;
        Ok(window)
    }
}

/// A [`TimeWindow`] pinned to dates: `cutoff <= date <= end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub name: String,
    /// Inclusive lower bound; `None` for all-time windows.
    pub cutoff: Option<NaiveDate>,
    /// Inclusive upper bound (the injected "today").
    pub end: NaiveDate,
    /// Length of the window in days, used for monthly rates.
    pub span_days: Option<i64>,
}

impl ResolvedWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date <= self.end && self.cutoff.map_or(true, |cutoff| date >= cutoff)
    }

    /// Span expressed in 30-day months, `None` when there is no positive span.
    pub fn months(&self) -> Option<f64> {
        self.span_days
            .filter(|days| *days > 0)
            .map(|days| days as f64 / crate::time_utils::DAYS_PER_MONTH)
    }
}

// ── Share ─────────────────────────────────────────────────────────────────────

/// A percentage or rate that may be undefined for lack of data.
///
/// Serialises as a plain number, or `null` for [`Share::InsufficientData`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Share {
    Value(f64),
    /// The window held no records (or had no span to normalise by).
    InsufficientData,
}

impl Share {
    /// `numerator / denominator` expressed as a percentage.
    pub fn percent(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Share::InsufficientData
        } else {
            Share::Value(numerator as f64 * 100.0 / denominator as f64)
        }
    }

    /// `count / months`, undefined when the span is missing or non-positive.
    pub fn per_month(count: usize, months: Option<f64>) -> Self {
        match months {
            Some(m) if m > 0.0 => Share::Value(count as f64 / m),
            _ => Share::InsufficientData,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Share::Value(v) => Some(*v),
            Share::InsufficientData => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Share::InsufficientData)
    }

    /// The numeric value, or [`TrackerError::EmptyWindow`] naming `window`.
    pub fn require(&self, window: &str) -> Result<f64> {
        self.value()
            .ok_or_else(|| TrackerError::EmptyWindow(window.to_string()))
    }
}

impl From<Option<f64>> for Share {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Share::InsufficientData, Share::Value)
    }
}

impl From<Share> for Option<f64> {
    fn from(share: Share) -> Self {
        share.value()
    }
}
