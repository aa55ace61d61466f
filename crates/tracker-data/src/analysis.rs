//! Main analysis pipeline for the job tracker.
//!
//! Takes a loaded sheet, resolves the configured windows against an injected
//! reference date and runs every aggregation, returning a [`DashboardReport`]
//! that can be flattened into tidy tables for output.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracker_core::settings::DashboardConfig;
use tracker_core::{Result, TrackerError};

use crate::aggregator::{resolve_windows, StatusAggregator, StatusPercentages, WindowRates};
use crate::attribution::{
    attribute_platforms, platform_ranking, top_platforms, PlatformAttribution, PlatformShare,
    TopPlatforms,
};
use crate::reader::{DroppedRow, LoadReport};
use crate::reshape::{DisplayOrder, TidyRow, WideTable};

/// Period label used for the whole-sheet platform ranking.
pub const RANKING_PERIOD: &str = "All Records";

// ── Public types ──────────────────────────────────────────────────────────────

/// Which group of tables to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    All,
    Status,
    Counts,
    Rates,
    Platforms,
    Top,
}

impl FromStr for View {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(View::All),
            "status" => Ok(View::Status),
            "counts" => Ok(View::Counts),
            "rates" => Ok(View::Rates),
            "platforms" => Ok(View::Platforms),
            "top" => Ok(View::Top),
            other => Err(TrackerError::Config(format!("unknown view: {other}"))),
        }
    }
}

/// Metadata produced alongside the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// RFC 3339 timestamp when this report was generated.
    pub generated_at: String,
    /// Reference date the windows were resolved against.
    pub today: NaiveDate,
    pub records_processed: usize,
    pub rows_dropped: usize,
    pub blank_rows: usize,
}

/// A named tidy table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyTable {
    pub name: String,
    pub rows: Vec<TidyRow>,
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    /// Rows dropped at load time, with their reasons.
    pub dropped: Vec<DroppedRow>,
    pub status: StatusPercentages,
    pub rates: Vec<WindowRates>,
    pub platforms: PlatformAttribution,
    pub top: Vec<TopPlatforms>,
    pub ranking: Vec<PlatformShare>,
    #[serde(skip)]
    order: DisplayOrder,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Resolve every configured window against `today`.
/// 2. Compute status percentages and monthly rates.
/// 3. Attribute applications to platforms and rank them.
/// 4. Return a [`DashboardReport`].
///
/// Fails only when a window cannot be resolved against `today`.
pub fn analyze(
    load: LoadReport,
    config: &DashboardConfig,
    today: NaiveDate,
) -> Result<DashboardReport> {
    let LoadReport {
        records,
        dropped,
        blank_rows,
    } = load;

    // ── Step 1: Windows ───────────────────────────────────────────────────────
    let windows = resolve_windows(&config.windows, today, config.campaign_start)?;
    tracing::debug!("resolved {} windows against {}", windows.len(), today);

    // ── Step 2: Statuses ──────────────────────────────────────────────────────
    let aggregator = StatusAggregator::from_config(config);
    let status = aggregator.percentages(&records, &windows);
    let rates = aggregator.rates(&records, &windows);

    // ── Step 3: Platforms ─────────────────────────────────────────────────────
    let platforms = attribute_platforms(&records, &windows);
    let top = top_platforms(&platforms, config.top_n);
    let ranking = platform_ranking(&records);

    // ── Step 4: Build result ──────────────────────────────────────────────────
    let metadata = ReportMetadata {
        generated_at: Utc::now().to_rfc3339(),
        today,
        records_processed: records.len(),
        rows_dropped: dropped.len(),
        blank_rows,
    };

    tracing::info!(
        "analysed {} records over {} windows ({} dropped)",
        metadata.records_processed,
        windows.len(),
        metadata.rows_dropped
    );

    Ok(DashboardReport {
        metadata,
        dropped,
        status,
        rates,
        platforms,
        top,
        ranking,
        order: DisplayOrder::new(config.window_order.clone(), config.category_order.clone()),
    })
}

impl DashboardReport {
    /// Flatten the report into the tidy tables selected by `view`.
    pub fn tidy_tables(&self, view: View) -> Vec<TidyTable> {
        let wants = |v: View| view == View::All || view == v;
        let mut tables = Vec::new();

        if wants(View::Status) {
            let wide = WideTable::from_status_percentages(&self.status);
            tables.push(self.long("status_percentages", wide));
        }
        if wants(View::Counts) {
            let wide = WideTable::from_status_counts(&self.status);
            tables.push(self.long("status_counts", wide));
        }
        if wants(View::Rates) {
            let wide = WideTable::from_rates(&self.rates);
            tables.push(self.long("monthly_rates", wide));
        }
        if wants(View::Counts) {
            let wide = WideTable::from_platform_counts(&self.platforms);
            tables.push(self.long("platform_counts", wide));
        }
        if wants(View::Platforms) {
            let wide = WideTable::from_platform_shares(&self.platforms);
            tables.push(self.long("platform_shares", wide));
        }
        if wants(View::Top) {
            tables.push(TidyTable {
                name: "top_platforms".to_string(),
                rows: self.top_rows(),
            });
        }
        if wants(View::Platforms) {
            let rows = self
                .ranking
                .iter()
                .map(|p| TidyRow {
                    category: p.platform.clone(),
                    period: RANKING_PERIOD.to_string(),
                    value: Some(p.count as f64),
                })
                .collect();
            tables.push(TidyTable {
                name: "platform_ranking".to_string(),
                rows,
            });
        }
        tables
    }

    fn long(&self, name: &str, table: WideTable) -> TidyTable {
        TidyTable {
            name: name.to_string(),
            rows: table.to_long(&self.order),
        }
    }

    /// Top-N rows: windows in display order, platforms by rank.
    fn top_rows(&self) -> Vec<TidyRow> {
        let mut ordered: Vec<&TopPlatforms> = Vec::with_capacity(self.top.len());
        let preferred = self
            .order
            .windows
            .iter()
            .filter_map(|name| self.top.iter().find(|t| t.window == *name));
        for top in preferred.chain(self.top.iter()) {
            if !ordered.iter().any(|o| o.window == top.window) {
                ordered.push(top);
            }
        }

        ordered
            .into_iter()
            .flat_map(|t| {
                t.platforms.iter().map(move |p| TidyRow {
                    category: p.platform.clone(),
                    period: t.window.clone(),
                    value: p.percentage.value(),
                })
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
