//! Pivoting between wide aggregation output and tidy long tables.
//!
//! A [`WideTable`] has one row per window and one column per category. Its
//! long form is one [`TidyRow`] per `(category, period, value)` cell, which
//! is what charting front-ends consume directly.

use serde::{Deserialize, Serialize};

use crate::aggregator::{StatusPercentages, StatusShare, WindowRates};
use crate::attribution::{PlatformAttribution, PlatformShare};

/// One cell of a tidy table. `value` is `None` where the window had
/// insufficient data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyRow {
    pub category: String,
    pub period: String,
    pub value: Option<f64>,
}

/// Preferred ordering of periods and categories in long output.
///
/// Listed names come first in the given order; names not listed follow in
/// their original order. Listed names that do not occur are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayOrder {
    pub windows: Vec<String>,
    pub categories: Vec<String>,
}

impl DisplayOrder {
    pub fn new(windows: Vec<String>, categories: Vec<String>) -> Self {
        Self {
            windows,
            categories,
        }
    }
}

/// Windows × categories grid of optional values.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub windows: Vec<String>,
    pub categories: Vec<String>,
    /// `values[w][c]` is the cell for `windows[w]` and `categories[c]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl WideTable {
    /// An all-`None` table of the given shape.
    pub fn new(windows: Vec<String>, categories: Vec<String>) -> Self {
        let values = vec![vec![None; categories.len()]; windows.len()];
        Self {
            windows,
            categories,
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() || self.categories.is_empty()
    }

    /// Value at `(window, category)`, `None` when absent or insufficient.
    pub fn get(&self, window: &str, category: &str) -> Option<f64> {
        let w = self.windows.iter().position(|n| n == window)?;
        let c = self.categories.iter().position(|n| n == category)?;
        self.values[w][c]
    }

    // ── Builders ──────────────────────────────────────────────────────────────

    /// Status percentages; categories are the status names.
    pub fn from_status_percentages(status: &StatusPercentages) -> Self {
        Self::from_status(status, |s| s.percentage.value())
    }

    /// Raw status counts per window.
    pub fn from_status_counts(status: &StatusPercentages) -> Self {
        Self::from_status(status, |s| Some(s.count as f64))
    }

    /// Monthly rates; categories are `Applications` followed by the statuses.
    pub fn from_rates(rates: &[WindowRates]) -> Self {
        let windows = rates.iter().map(|w| w.window.clone()).collect();
        let categories = rates
            .first()
            .map(|w| w.rates.iter().map(|r| r.category.clone()).collect())
            .unwrap_or_default();
        let values = rates
            .iter()
            .map(|w| w.rates.iter().map(|r| r.per_month.value()).collect())
            .collect();
        Self {
            windows,
            categories,
            values,
        }
    }

    /// Platform counts; categories are the platform label union.
    pub fn from_platform_counts(attribution: &PlatformAttribution) -> Self {
        Self::from_platforms(attribution, |p| Some(p.count as f64))
    }

    /// Platform shares of each window total.
    pub fn from_platform_shares(attribution: &PlatformAttribution) -> Self {
        Self::from_platforms(attribution, |p| p.percentage.value())
    }

    fn from_status<F>(status: &StatusPercentages, cell: F) -> Self
    where
        F: Fn(&StatusShare) -> Option<f64>,
    {
        let windows = status.windows.iter().map(|w| w.window.clone()).collect();
        let categories = status
            .windows
            .first()
            .map(|w| w.statuses.iter().map(|s| s.status.to_string()).collect())
            .unwrap_or_default();
        let values = status
            .windows
            .iter()
            .map(|w| w.statuses.iter().map(&cell).collect())
            .collect();
        Self {
            windows,
            categories,
            values,
        }
    }

    fn from_platforms<F>(attribution: &PlatformAttribution, cell: F) -> Self
    where
        F: Fn(&PlatformShare) -> Option<f64>,
    {
        let windows = attribution
            .windows
            .iter()
            .map(|w| w.window.clone())
            .collect();
        let values = attribution
            .windows
            .iter()
            .map(|w| w.platforms.iter().map(&cell).collect())
            .collect();
        Self {
            windows,
            categories: attribution.labels.clone(),
            values,
        }
    }

    // ── Pivots ────────────────────────────────────────────────────────────────

    /// Tidy rows, grouped by category then period, in `order`.
    pub fn to_long(&self, order: &DisplayOrder) -> Vec<TidyRow> {
        let window_idx = arrange(&self.windows, &order.windows);
        let category_idx = arrange(&self.categories, &order.categories);

        let mut rows = Vec::with_capacity(window_idx.len() * category_idx.len());
        for &c in &category_idx {
            for &w in &window_idx {
                rows.push(TidyRow {
                    category: self.categories[c].clone(),
                    period: self.windows[w].clone(),
                    value: self.values[w][c],
                });
            }
        }
        rows
    }

    /// Pivot tidy rows back into a grid. Periods and categories keep
    /// first-seen order; cells with no row stay `None`, and a repeated
    /// `(category, period)` pair keeps the last value.
    pub fn from_long(rows: &[TidyRow]) -> Self {
        let mut windows: Vec<String> = Vec::new();
        let mut categories: Vec<String> = Vec::new();
        for row in rows {
            if !windows.contains(&row.period) {
                windows.push(row.period.clone());
            }
            if !categories.contains(&row.category) {
                categories.push(row.category.clone());
            }
        }

        let mut table = Self::new(windows, categories);
        for row in rows {
            let w = table.windows.iter().position(|n| *n == row.period);
            let c = table.categories.iter().position(|n| *n == row.category);
            if let (Some(w), Some(c)) = (w, c) {
                table.values[w][c] = row.value;
            }
        }
        table
    }
}

/// Indices of `names` with the `preferred` ones first.
fn arrange(names: &[String], preferred: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = Vec::with_capacity(names.len());
    for i in preferred.iter().filter_map(|p| names.iter().position(|n| n == p)) {
        if !order.contains(&i) {
            order.push(i);
        }
    }
    for i in 0..names.len() {
        if !order.contains(&i) {
            order.push(i);
        }
    }
    order
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::WindowStatus;
    use crate::attribution::WindowPlatforms;
    use tracker_core::models::{Share, StatusFlag};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> WideTable {
        WideTable {
            windows: names(&["Last 30 Days", "Overall"]),
            categories: names(&["Inbound", "Accepted"]),
            values: vec![vec![Some(60.0), Some(10.0)], vec![None, Some(2.5)]],
        }
    }

    fn share(status: StatusFlag, count: usize, total: usize) -> StatusShare {
        StatusShare {
            status,
            count,
            percentage: Share::percent(count, total),
        }
    }

    // ── to_long ───────────────────────────────────────────────────────────────

    #[test]
    fn test_to_long_default_order() {
        let rows = sample().to_long(&DisplayOrder::default());
        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.category.as_str(), r.period.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Inbound", "Last 30 Days"),
                ("Inbound", "Overall"),
                ("Accepted", "Last 30 Days"),
                ("Accepted", "Overall"),
            ]
        );
        assert_eq!(rows[0].value, Some(60.0));
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn test_to_long_respects_display_order() {
        let order = DisplayOrder::new(names(&["Overall"]), names(&["Accepted", "Nope"]));
        let rows = sample().to_long(&order);
        assert_eq!(rows[0].category, "Accepted");
        assert_eq!(rows[0].period, "Overall");
        assert_eq!(rows[1].period, "Last 30 Days");
        assert_eq!(rows[2].category, "Inbound");
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_arrange_ignores_unknown_and_duplicates() {
        let list = names(&["a", "b", "c"]);
        assert_eq!(arrange(&list, &names(&["c", "x", "a", "c"])), vec![2, 0, 1]);
        assert_eq!(arrange(&list, &[]), vec![0, 1, 2]);
    }

    // ── from_long ─────────────────────────────────────────────────────────────

    #[test]
    fn test_round_trip_reproduces_values() {
        let wide = sample();
        let back = WideTable::from_long(&wide.to_long(&DisplayOrder::default()));
        assert_eq!(back, wide);
    }

    #[test]
    fn test_round_trip_with_custom_order_keeps_cells() {
        let wide = sample();
        let order = DisplayOrder::new(names(&["Overall"]), names(&["Accepted"]));
        let back = WideTable::from_long(&wide.to_long(&order));
        for window in &wide.windows {
            for category in &wide.categories {
                assert_eq!(back.get(window, category), wide.get(window, category));
            }
        }
    }

    #[test]
    fn test_from_long_fills_missing_cells_with_none() {
        let rows = vec![
            TidyRow {
                category: "LinkedIn".into(),
                period: "Overall".into(),
                value: Some(3.0),
            },
            TidyRow {
                category: "Slack".into(),
                period: "Last 30 Days".into(),
                value: Some(1.0),
            },
        ];
        let table = WideTable::from_long(&rows);
        assert_eq!(table.windows, names(&["Overall", "Last 30 Days"]));
        assert_eq!(table.get("Overall", "Slack"), None);
        assert_eq!(table.get("Last 30 Days", "Slack"), Some(1.0));
    }

    // ── Builders ──────────────────────────────────────────────────────────────

    #[test]
    fn test_from_status_builders() {
        let status = StatusPercentages {
            windows: vec![
                WindowStatus {
                    window: "Last 30 Days".into(),
                    row_count: 10,
                    statuses: vec![
                        share(StatusFlag::Inbound, 6, 10),
                        share(StatusFlag::Accepted, 1, 10),
                    ],
                },
                WindowStatus {
                    window: "All Time".into(),
                    row_count: 0,
                    statuses: vec![
                        share(StatusFlag::Inbound, 0, 0),
                        share(StatusFlag::Accepted, 0, 0),
                    ],
                },
            ],
        };

        let pct = WideTable::from_status_percentages(&status);
        assert_eq!(pct.categories, names(&["Inbound", "Accepted"]));
        assert_eq!(pct.get("Last 30 Days", "Inbound"), Some(60.0));
        assert_eq!(pct.get("All Time", "Inbound"), None);

        let counts = WideTable::from_status_counts(&status);
        assert_eq!(counts.get("Last 30 Days", "Accepted"), Some(1.0));
        assert_eq!(counts.get("All Time", "Accepted"), Some(0.0));
    }

    #[test]
    fn test_from_platform_builders() {
        let attribution = PlatformAttribution {
            labels: names(&["LinkedIn", "Slack"]),
            windows: vec![WindowPlatforms {
                window: "Last 30 Days".into(),
                row_count: 4,
                platforms: vec![
                    PlatformShare {
                        platform: "LinkedIn".into(),
                        count: 4,
                        percentage: Share::Value(100.0),
                    },
                    PlatformShare {
                        platform: "Slack".into(),
                        count: 0,
                        percentage: Share::Value(0.0),
                    },
                ],
            }],
        };

        let counts = WideTable::from_platform_counts(&attribution);
        assert_eq!(counts.categories, names(&["LinkedIn", "Slack"]));
        assert_eq!(counts.get("Last 30 Days", "Slack"), Some(0.0));

        let shares = WideTable::from_platform_shares(&attribution);
        assert_eq!(shares.get("Last 30 Days", "LinkedIn"), Some(100.0));
    }

    #[test]
    fn test_empty_inputs_build_empty_tables() {
        let table = WideTable::from_rates(&[]);
        assert!(table.is_empty());
        assert!(table.to_long(&DisplayOrder::default()).is_empty());
    }
}
