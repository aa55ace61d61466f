use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::models::{MatchRule, StatusFlag, TimeWindow};
use crate::time_utils;

/// Default credentials file checked before the secret store.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// Environment variable acting as the secret store for credentials.
pub const SECRET_ENV_VAR: &str = "JOB_TRACKER_SERVICE_ACCOUNT";

// ── Config enums ───────────────────────────────────────────────────────────────

/// What to do with a row whose `Date` cell is not day/month/year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Drop the row and report it in the load report.
    #[default]
    Drop,
    /// Abort the whole load.
    Fail,
}

impl FromStr for DatePolicy {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(DatePolicy::Drop),
            "fail" => Ok(DatePolicy::Fail),
            other => Err(TrackerError::Config(format!("unknown date policy: {other}"))),
        }
    }
}

/// How header cells map to the fixed column set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnMode {
    /// Match header names case-insensitively.
    #[default]
    Named,
    /// Take the first ten columns in fixed order, ignoring header text.
    Positional,
}

impl FromStr for ColumnMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "named" => Ok(ColumnMode::Named),
            "positional" => Ok(ColumnMode::Positional),
            other => Err(TrackerError::Config(format!("unknown column mode: {other}"))),
        }
    }
}

// ── DashboardConfig ────────────────────────────────────────────────────────────

/// Declarative description of what the dashboard computes.
///
/// Read from `~/.job-tracker/config.json` (or `--config`), then overridden by
/// explicit CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub windows: Vec<TimeWindow>,
    pub statuses: Vec<StatusFlag>,
    pub match_rule: MatchRule,
    pub date_policy: DatePolicy,
    pub column_mode: ColumnMode,
    /// Reference start used to normalise all-time counts to monthly rates.
    pub campaign_start: Option<NaiveDate>,
    pub top_n: usize,
    /// Explicit display order for windows; unlisted windows follow.
    pub window_order: Vec<String>,
    /// Explicit display order for categories; unlisted categories follow.
    pub category_order: Vec<String>,
    pub fetch_timeout_secs: u64,
    pub credentials_path: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            windows: TimeWindow::defaults(),
            statuses: StatusFlag::ALL.to_vec(),
            match_rule: MatchRule::default(),
            date_policy: DatePolicy::default(),
            column_mode: ColumnMode::default(),
            campaign_start: None,
            top_n: 5,
            window_order: Vec::new(),
            category_order: Vec::new(),
            fetch_timeout_secs: 10,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
        }
    }
}

impl DashboardConfig {
    /// `~/.job-tracker/config.json`.
    pub fn default_path() -> PathBuf {
        Self::path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".job-tracker").join("config.json")
    }

    /// Load from `path`; a missing file yields the defaults, a malformed one
    /// is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no dashboard config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| TrackerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            return Err(TrackerError::Config("at least one window is required".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for window in &self.windows {
            window.validate()?;
            if !seen.insert(window.name.as_str()) {
                return Err(TrackerError::InvalidWindow(format!(
                    "duplicate window name \"{}\"",
                    window.name
                )));
            }
        }
        if self.statuses.is_empty() {
            return Err(TrackerError::Config("at least one status is required".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(TrackerError::Config("fetch timeout must be positive".into()));
        }
        Ok(())
    }
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Job application analytics over rolling time windows
#[derive(Parser, Debug, Clone)]
#[command(
    name = "job-tracker",
    about = "Job application analytics over rolling time windows",
    version
)]
pub struct Settings {
    /// CSV export to read: a file path or an http(s) URL
    #[arg(long, env = "JOB_TRACKER_SOURCE")]
    pub source: String,

    /// Dashboard config file (defaults to ~/.job-tracker/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Which tables to emit
    #[arg(long, default_value = "all", value_parser = ["all", "status", "counts", "rates", "platforms", "top"])]
    pub view: String,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "csv", "json"])]
    pub format: String,

    /// Write output to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Reference date for the windows (YYYY-MM-DD or D/M/YYYY); defaults to today
    #[arg(long)]
    pub today: Option<String>,

    /// Timezone used to determine today's date
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Time window NAME=DAYS, NAME=since:D/M/YYYY or NAME=all (repeatable)
    #[arg(long = "window")]
    pub windows: Vec<String>,

    /// Status flag to evaluate (repeatable)
    #[arg(long = "status", value_parser = ["Inbound", "Dialogue", "Declined", "Accepted"])]
    pub statuses: Vec<String>,

    /// How flag cells are read as booleans
    #[arg(long, value_parser = ["yes", "present"])]
    pub match_rule: Option<String>,

    /// What to do with rows whose date cannot be parsed
    #[arg(long, value_parser = ["drop", "fail"])]
    pub date_policy: Option<String>,

    /// How header cells map to the fixed columns
    #[arg(long, value_parser = ["named", "positional"])]
    pub columns: Option<String>,

    /// Campaign start date used for all-time monthly rates
    #[arg(long)]
    pub campaign_start: Option<String>,

    /// Number of top platforms listed per window
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Display order of windows, comma separated
    #[arg(long, value_delimiter = ',')]
    pub window_order: Vec<String>,

    /// Display order of categories, comma separated
    #[arg(long, value_delimiter = ',')]
    pub category_order: Vec<String>,

    /// Local credentials file checked before the secret store
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Fetch timeout in seconds (1-300)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=300))]
    pub timeout_secs: Option<u64>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Load the config file and apply every explicitly given CLI override.
    pub fn resolve_config(&self) -> Result<DashboardConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(DashboardConfig::default_path);
        let config = DashboardConfig::load_from(&path)?;
        self.apply_overrides(config)
    }

    /// Merge CLI values over `config` (CLI always wins).
    pub fn apply_overrides(&self, mut config: DashboardConfig) -> Result<DashboardConfig> {
        if !self.windows.is_empty() {
            config.windows = self
                .windows
                .iter()
                .map(|w| w.parse())
                .collect::<Result<Vec<TimeWindow>>>()?;
        }
        if !self.statuses.is_empty() {
            config.statuses = self
                .statuses
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<StatusFlag>>>()?;
        }
        if let Some(rule) = &self.match_rule {
            config.match_rule = rule.parse()?;
        }
        if let Some(policy) = &self.date_policy {
            config.date_policy = policy.parse()?;
        }
        if let Some(mode) = &self.columns {
            config.column_mode = mode.parse()?;
        }
        if let Some(start) = &self.campaign_start {
            config.campaign_start = Some(time_utils::parse_cli_date(start).ok_or_else(|| {
                TrackerError::Config(format!("invalid campaign start date: {start}"))
            })?);
        }
        if let Some(n) = self.top_n {
            config.top_n = n;
        }
        if !self.window_order.is_empty() {
            config.window_order = self.window_order.clone();
        }
        if !self.category_order.is_empty() {
            config.category_order = self.category_order.clone();
        }
        if let Some(path) = &self.credentials {
            config.credentials_path = path.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    /// The reference date: `--today` when given, otherwise the current date
    /// in the configured timezone.
    pub fn reference_date(&self) -> Result<NaiveDate> {
        match &self.today {
            Some(raw) => time_utils::parse_cli_date(raw)
                .ok_or_else(|| TrackerError::Config(format!("invalid --today date: {raw}"))),
            None => Ok(time_utils::today_in(&self.timezone)),
        }
    }

    /// Effective log level, with `--debug` taking precedence.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Settings {
        let mut full = vec!["job-tracker", "--source", "export.csv"];
        full.extend_from_slice(args);
        Settings::parse_from(full)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── DashboardConfig ───────────────────────────────────────────────────────

    #[test]
    fn test_config_defaults() {
        let config = DashboardConfig::default();
        let names: Vec<&str> = config.windows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Last 30 Days", "Last 90 Days", "Overall"]);
        assert_eq!(config.statuses, StatusFlag::ALL.to_vec());
        assert_eq!(config.match_rule, MatchRule::Yes);
        assert_eq!(config.date_policy, DatePolicy::Drop);
        assert_eq!(config.column_mode, ColumnMode::Named);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.fetch_timeout_secs, 10);
        assert!(config.campaign_start.is_none());
    }

    #[test]
    fn test_config_load_missing_file_is_default() {
        let tmp = TempDir::new().expect("tempdir");
        let config = DashboardConfig::load_from(&DashboardConfig::path_in(tmp.path())).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_config_load_partial_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "windows": [
                    {"name": "Last 90 Days", "kind": "last_days", "days": 90},
                    {"name": "All Time", "kind": "all_time"}
                ],
                "match_rule": "present",
                "campaign_start": "2024-01-01"
            }"#,
        )
        .unwrap();

        let config = DashboardConfig::load_from(&path).unwrap();
        assert_eq!(config.windows.len(), 2);
        assert_eq!(config.windows[1], TimeWindow::all_time("All Time"));
        assert_eq!(config.match_rule, MatchRule::Present);
        assert_eq!(config.campaign_start, Some(date(2024, 1, 1)));
        // Unspecified fields keep their defaults.
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_config_load_malformed_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            DashboardConfig::load_from(&path),
            Err(TrackerError::JsonParse(_))
        ));
    }

    #[test]
    fn test_config_rejects_duplicate_window_names() {
        let config = DashboardConfig {
            windows: vec![
                TimeWindow::last_days("Recent", 30),
                TimeWindow::last_days("Recent", 60),
            ],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TrackerError::InvalidWindow(_))));
    }

    #[test]
    fn test_config_rejects_oversized_window_from_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"windows": [{"name": "Big", "kind": "last_days", "days": 4000000000}]}"#,
        )
        .unwrap();
        assert!(matches!(
            DashboardConfig::load_from(&path),
            Err(TrackerError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_cli_rejects_oversized_window() {
        assert!(parse(&["--window", "Big=4000000000"])
            .apply_overrides(DashboardConfig::default())
            .is_err());
    }

    #[test]
    fn test_config_rejects_empty_windows() {
        let config = DashboardConfig {
            windows: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = parse(&[]);
        assert_eq!(settings.source, "export.csv");
        assert_eq!(settings.view, "all");
        assert_eq!(settings.format, "table");
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.windows.is_empty());
        assert!(settings.today.is_none());
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_overrides_win_over_config() {
        let settings = parse(&[
            "--window",
            "Recent=14",
            "--window",
            "Everything=all",
            "--status",
            "Inbound",
            "--match-rule",
            "present",
            "--date-policy",
            "fail",
            "--columns",
            "positional",
            "--campaign-start",
            "2024-02-01",
            "--top-n",
            "3",
            "--window-order",
            "Everything,Recent",
            "--timeout-secs",
            "30",
        ]);
        let config = settings.apply_overrides(DashboardConfig::default()).unwrap();

        assert_eq!(
            config.windows,
            vec![
                TimeWindow::last_days("Recent", 14),
                TimeWindow::all_time("Everything")
            ]
        );
        assert_eq!(config.statuses, vec![StatusFlag::Inbound]);
        assert_eq!(config.match_rule, MatchRule::Present);
        assert_eq!(config.date_policy, DatePolicy::Fail);
        assert_eq!(config.column_mode, ColumnMode::Positional);
        assert_eq!(config.campaign_start, Some(date(2024, 2, 1)));
        assert_eq!(config.top_n, 3);
        assert_eq!(config.window_order, vec!["Everything", "Recent"]);
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_settings_without_overrides_keeps_config() {
        let base = DashboardConfig {
            top_n: 8,
            match_rule: MatchRule::Present,
            ..Default::default()
        };
        let config = parse(&[]).apply_overrides(base.clone()).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_settings_bad_window_is_error() {
        let settings = parse(&["--window", "Recent=soon"]);
        assert!(settings.apply_overrides(DashboardConfig::default()).is_err());
    }

    #[test]
    fn test_settings_resolve_config_reads_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("dash.json");
        std::fs::write(&path, r#"{"top_n": 2}"#).unwrap();

        let settings = parse(&["--config", path.to_str().unwrap()]);
        let config = settings.resolve_config().unwrap();
        assert_eq!(config.top_n, 2);
    }

    #[test]
    fn test_settings_reference_date_explicit() {
        let settings = parse(&["--today", "2024-06-30"]);
        assert_eq!(settings.reference_date().unwrap(), date(2024, 6, 30));

        let settings = parse(&["--today", "30/06/2024"]);
        assert_eq!(settings.reference_date().unwrap(), date(2024, 6, 30));

        let settings = parse(&["--today", "tomorrow"]);
        assert!(settings.reference_date().is_err());
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        assert_eq!(parse(&["--debug"]).effective_log_level(), "DEBUG");
        assert_eq!(
            parse(&["--log-level", "WARNING"]).effective_log_level(),
            "WARNING"
        );
    }
}
