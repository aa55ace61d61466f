//! Status aggregation over rolling time windows.
//!
//! One parameterised aggregator: the windows, the statuses to evaluate and
//! the flag match rule all come from configuration.

use chrono::NaiveDate;
use serde::Serialize;
use tracker_core::models::{
    ApplicationRecord, MatchRule, ResolvedWindow, Share, StatusFlag, TimeWindow,
};
use tracker_core::settings::DashboardConfig;
use tracker_core::Result;

/// Category name used for the total application count in rate tables.
pub const APPLICATIONS_CATEGORY: &str = "Applications";

// ── Result types ──────────────────────────────────────────────────────────────

/// Count and percentage of one status within one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub status: StatusFlag,
    pub count: usize,
    pub percentage: Share,
}

/// Status percentages for a single window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStatus {
    pub window: String,
    pub row_count: usize,
    pub statuses: Vec<StatusShare>,
}

impl WindowStatus {
    pub fn get(&self, status: StatusFlag) -> Option<&StatusShare> {
        self.statuses.iter().find(|s| s.status == status)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// Status percentages for every configured window, in window order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPercentages {
    pub windows: Vec<WindowStatus>,
}

impl StatusPercentages {
    pub fn window(&self, name: &str) -> Option<&WindowStatus> {
        self.windows.iter().find(|w| w.window == name)
    }
}

/// Count per month for one category within one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRate {
    pub category: String,
    pub count: usize,
    pub per_month: Share,
}

/// Monthly rates for a single window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRates {
    pub window: String,
    /// Span of the window in 30-day months, when it has one.
    pub months: Option<f64>,
    pub rates: Vec<CategoryRate>,
}

impl WindowRates {
    pub fn get(&self, category: &str) -> Option<&CategoryRate> {
        self.rates.iter().find(|r| r.category == category)
    }
}

// ── Window helpers ────────────────────────────────────────────────────────────

/// Pin every window to dates relative to `today`.
pub fn resolve_windows(
    windows: &[TimeWindow],
    today: NaiveDate,
    campaign_start: Option<NaiveDate>,
) -> Result<Vec<ResolvedWindow>> {
    windows
        .iter()
        .map(|w| w.resolve(today, campaign_start))
        .collect()
}

/// Records falling inside `window`, in input order.
pub fn filter_window<'a>(
    records: &'a [ApplicationRecord],
    window: &ResolvedWindow,
) -> Vec<&'a ApplicationRecord> {
    records.iter().filter(|r| window.contains(r.date)).collect()
}

// ── StatusAggregator ──────────────────────────────────────────────────────────

/// Computes status percentages and monthly rates per window.
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    statuses: Vec<StatusFlag>,
    rule: MatchRule,
}

impl StatusAggregator {
    pub fn new(statuses: Vec<StatusFlag>, rule: MatchRule) -> Self {
        Self { statuses, rule }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.statuses.clone(), config.match_rule)
    }

    /// Percentage of each window's rows carrying each status.
    ///
    /// A window with no rows yields [`Share::InsufficientData`] for every
    /// status rather than dividing by zero.
    pub fn percentages(
        &self,
        records: &[ApplicationRecord],
        windows: &[ResolvedWindow],
    ) -> StatusPercentages {
        let windows = windows
            .iter()
            .map(|window| {
                let rows = filter_window(records, window);
                let statuses = self
                    .count_statuses(&rows)
                    .into_iter()
                    .map(|(status, count)| StatusShare {
                        status,
                        count,
                        percentage: Share::percent(count, rows.len()),
                    })
                    .collect();
                if rows.is_empty() {
                    tracing::debug!("window \"{}\" has no records", window.name);
                }
                WindowStatus {
                    window: window.name.clone(),
                    row_count: rows.len(),
                    statuses,
                }
            })
            .collect();

        StatusPercentages { windows }
    }

    /// Counts per 30-day month: the total application count first, then each
    /// status.
    ///
    /// Windows without a positive span (an all-time window with no campaign
    /// start, or one starting today) report [`Share::InsufficientData`].
    pub fn rates(
        &self,
        records: &[ApplicationRecord],
        windows: &[ResolvedWindow],
    ) -> Vec<WindowRates> {
        windows
            .iter()
            .map(|window| {
                let rows = filter_window(records, window);
                let months = window.months();
                if months.is_none() {
                    tracing::warn!(
                        "window \"{}\" has no span to normalise by; rates unavailable",
                        window.name
                    );
                }

                let mut rates = vec![CategoryRate {
                    category: APPLICATIONS_CATEGORY.to_string(),
                    count: rows.len(),
                    per_month: Share::per_month(rows.len(), months),
                }];
                rates.extend(self.count_statuses(&rows).into_iter().map(|(status, count)| {
                    CategoryRate {
                        category: status.to_string(),
                        count,
                        per_month: Share::per_month(count, months),
                    }
                }));

                WindowRates {
                    window: window.name.clone(),
                    months,
                    rates,
                }
            })
            .collect()
    }

    fn count_statuses(&self, rows: &[&ApplicationRecord]) -> Vec<(StatusFlag, usize)> {
        self.statuses
            .iter()
            .map(|&status| {
                let count = rows
                    .iter()
                    .filter(|r| r.has_status(status, self.rule))
                    .count();
                (status, count)
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
