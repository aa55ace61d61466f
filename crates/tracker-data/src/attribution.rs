//! Platform attribution per time window.
//!
//! Every window reports every platform label seen in any window, so a
//! platform missing from one window shows up there as zero instead of
//! vanishing from the chart.

use std::collections::HashMap;

use serde::Serialize;
use tracker_core::models::{ApplicationRecord, ResolvedWindow, Share};

use crate::aggregator::filter_window;

// ── Result types ──────────────────────────────────────────────────────────────

/// Count and share of one platform within one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformShare {
    pub platform: String,
    pub count: usize,
    pub percentage: Share,
}

/// Platform breakdown of a single window, over the full label union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowPlatforms {
    pub window: String,
    pub row_count: usize,
    pub platforms: Vec<PlatformShare>,
}

impl WindowPlatforms {
    pub fn get(&self, platform: &str) -> Option<&PlatformShare> {
        self.platforms.iter().find(|p| p.platform == platform)
    }

    /// The `n` highest-share platforms with a non-zero count.
    ///
    /// Ties keep first-seen order because the sort is stable and `platforms`
    /// is already in first-seen order.
    pub fn top(&self, n: usize) -> Vec<PlatformShare> {
        let mut ranked: Vec<&PlatformShare> =
            self.platforms.iter().filter(|p| p.count > 0).collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.into_iter().take(n).cloned().collect()
    }
}

/// Platform breakdown for every window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformAttribution {
    /// Union of labels across all windows, in first-seen order.
    pub labels: Vec<String>,
    pub windows: Vec<WindowPlatforms>,
}

impl PlatformAttribution {
    pub fn window(&self, name: &str) -> Option<&WindowPlatforms> {
        self.windows.iter().find(|w| w.window == name)
    }
}

/// Top-N platforms of one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPlatforms {
    pub window: String,
    pub platforms: Vec<PlatformShare>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Distinct platform labels of `records` in first-seen order.
pub fn platform_labels<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ApplicationRecord>,
{
    let mut labels: Vec<String> = Vec::new();
    for record in records {
        if !labels.iter().any(|l| *l == record.platform) {
            labels.push(record.platform.clone());
        }
    }
    labels
}

/// Count and share per platform for each window, zero-filled over the union
/// of labels appearing in any window.
pub fn attribute_platforms(
    records: &[ApplicationRecord],
    windows: &[ResolvedWindow],
) -> PlatformAttribution {
    let per_window: Vec<(&ResolvedWindow, Vec<&ApplicationRecord>)> = windows
        .iter()
        .map(|w| (w, filter_window(records, w)))
        .collect();

    // Walk the table once so label order follows the sheet, not the windows.
    let labels = platform_labels(
        records
            .iter()
            .filter(|r| windows.iter().any(|w| w.contains(r.date))),
    );

    let windows = per_window
        .into_iter()
        .map(|(window, rows)| {
            let counts = count_by_platform(&rows);
            let platforms = labels
                .iter()
                .map(|label| {
                    let count = counts.get(label.as_str()).copied().unwrap_or(0);
                    PlatformShare {
                        platform: label.clone(),
                        count,
                        percentage: Share::percent(count, rows.len()),
                    }
                })
                .collect();
            WindowPlatforms {
                window: window.name.clone(),
                row_count: rows.len(),
                platforms,
            }
        })
        .collect();

    tracing::debug!("attributed {} platform labels", labels.len());

    PlatformAttribution { labels, windows }
}

/// Top-`n` platforms for every window, each window ranked independently.
pub fn top_platforms(attribution: &PlatformAttribution, n: usize) -> Vec<TopPlatforms> {
    attribution
        .windows
        .iter()
        .map(|w| TopPlatforms {
            window: w.window.clone(),
            platforms: w.top(n),
        })
        .collect()
}

/// Applications per platform across the whole table, most used first.
pub fn platform_ranking(records: &[ApplicationRecord]) -> Vec<PlatformShare> {
    let rows: Vec<&ApplicationRecord> = records.iter().collect();
    let counts = count_by_platform(&rows);
    let mut ranking: Vec<PlatformShare> = platform_labels(records)
        .into_iter()
        .map(|label| {
            let count = counts.get(label.as_str()).copied().unwrap_or(0);
            PlatformShare {
                percentage: Share::percent(count, records.len()),
                platform: label,
                count,
            }
        })
        .collect();
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking
}

fn count_by_platform<'a>(rows: &[&'a ApplicationRecord]) -> HashMap<&'a str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.platform.as_str()).or_default() += 1;
    }
    counts
}

// ── Tests ─────────────────────────────────────────────────────────────────────
