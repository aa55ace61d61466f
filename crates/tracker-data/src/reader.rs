//! CSV loading for the job tracker.
//!
//! Turns a spreadsheet export into typed [`ApplicationRecord`]s, validating
//! the column set once and applying the configured date policy to every row.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use tracker_core::models::{ApplicationRecord, UNSPECIFIED_PLATFORM};
use tracker_core::settings::{ColumnMode, DashboardConfig, DatePolicy};
use tracker_core::time_utils::{parse_dmy, parse_mdy};
use tracker_core::{Result, TrackerError};

// ── Columns ───────────────────────────────────────────────────────────────────

/// The fixed column set of the application sheet, in sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    No,
    Job,
    Date,
    Inbound,
    Dialogue,
    Declined,
    Accepted,
    DateUs,
    Platform,
    Notes,
}

impl Column {
    const ALL: [Column; 10] = [
        Column::No,
        Column::Job,
        Column::Date,
        Column::Inbound,
        Column::Dialogue,
        Column::Declined,
        Column::Accepted,
        Column::DateUs,
        Column::Platform,
        Column::Notes,
    ];

    fn name(self) -> &'static str {
        match self {
            Column::No => "No",
            Column::Job => "Job",
            Column::Date => "Date",
            Column::Inbound => "Inbound",
            Column::Dialogue => "Dialogue",
            Column::Declined => "Declined",
            Column::Accepted => "Accepted",
            Column::DateUs => "Date_US",
            Column::Platform => "Platform",
            Column::Notes => "Notes",
        }
    }

    /// Columns the aggregation cannot run without.
    fn is_required(self) -> bool {
        matches!(
            self,
            Column::Date
                | Column::Inbound
                | Column::Dialogue
                | Column::Declined
                | Column::Accepted
                | Column::Platform
        )
    }
}

/// Position of every known column within a CSV row.
#[derive(Debug)]
struct ColumnMap {
    positions: [Option<usize>; 10],
}

impl ColumnMap {
    fn build(headers: &csv::StringRecord, mode: ColumnMode) -> Result<Self> {
        let mut positions = [None; 10];
        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            *slot = match mode {
                ColumnMode::Named => headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(column.name())),
                ColumnMode::Positional => {
                    let idx = column as usize;
                    (idx < headers.len()).then_some(idx)
                }
            };
        }

        let missing: Vec<String> = Column::ALL
            .iter()
            .zip(positions.iter())
            .filter(|(column, pos)| {
                pos.is_none() && (column.is_required() || mode == ColumnMode::Positional)
            })
            .map(|(column, _)| column.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TrackerError::MissingColumns(missing));
        }

        Ok(Self { positions })
    }

    /// Trimmed cell for `column`, empty when the column or cell is absent.
    fn cell<'r>(&self, row: &'r csv::StringRecord, column: Column) -> &'r str {
        self.positions[column as usize]
            .and_then(|idx| row.get(idx))
            .map(str::trim)
            .unwrap_or("")
    }
}

// ── Public types ──────────────────────────────────────────────────────────────

/// Options controlling how rows are validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    pub column_mode: ColumnMode,
    pub date_policy: DatePolicy,
}

impl From<&DashboardConfig> for ReaderOptions {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            column_mode: config.column_mode,
            date_policy: config.date_policy,
        }
    }
}

/// A row excluded from the table by the date policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: String,
}

/// Outcome of a load: the usable records plus what was left out.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Valid records in sheet order.
    pub records: Vec<ApplicationRecord>,
    /// Rows dropped for an unparsable date.
    pub dropped: Vec<DroppedRow>,
    /// Fully blank rows skipped silently.
    pub blank_rows: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse CSV text into records.
///
/// Fails with [`TrackerError::MissingColumns`] when required columns are
/// absent and [`TrackerError::NoRows`] when no valid row remains.
pub fn read_records<R: Read>(input: R, options: ReaderOptions) -> Result<LoadReport> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::build(&headers, options.column_mode)?;

    let mut report = LoadReport::default();

    for (index, row) in reader.records().enumerate() {
        let row = row?;
        // Header is line 1; fall back to the row index when csv has no position.
        let line = row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);

        if row.iter().all(|cell| cell.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }

        match map_row(&columns, &row, line) {
            Ok(record) => report.records.push(record),
            Err(TrackerError::DateParse { line, value }) => match options.date_policy {
                DatePolicy::Drop => {
                    warn!("dropping line {}: unparsable date {:?}", line, value);
                    report.dropped.push(DroppedRow {
                        line,
                        reason: format!("unparsable date {value:?}"),
                    });
                }
                DatePolicy::Fail => return Err(TrackerError::DateParse { line, value }),
            },
            Err(e) => return Err(e),
        }
    }

    debug!(
        "loaded {} records ({} dropped, {} blank)",
        report.records.len(),
        report.dropped.len(),
        report.blank_rows
    );

    if report.records.is_empty() {
        return Err(TrackerError::NoRows);
    }

    Ok(report)
}

/// Read a local CSV export.
pub fn load_csv_file(path: &Path, options: ReaderOptions) -> Result<LoadReport> {
    let file = std::fs::File::open(path).map_err(|source| TrackerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    read_records(std::io::BufReader::new(file), options)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn map_row(columns: &ColumnMap, row: &csv::StringRecord, line: usize) -> Result<ApplicationRecord> {
    let raw_date = columns.cell(row, Column::Date);
    let date = parse_dmy(raw_date).ok_or_else(|| TrackerError::DateParse {
        line,
        value: raw_date.to_string(),
    })?;

    let optional = |column: Column| {
        let value = columns.cell(row, column);
        (!value.is_empty()).then(|| value.to_string())
    };

    let platform = match columns.cell(row, Column::Platform) {
        "" => UNSPECIFIED_PLATFORM.to_string(),
        label => label.to_string(),
    };

    Ok(ApplicationRecord {
        line,
        number: columns.cell(row, Column::No).parse().ok(),
        job: columns.cell(row, Column::Job).to_string(),
        date,
        date_us: parse_mdy(columns.cell(row, Column::DateUs)),
        inbound: optional(Column::Inbound),
        dialogue: optional(Column::Dialogue),
        declined: optional(Column::Declined),
        accepted: optional(Column::Accepted),
        platform,
        notes: columns.cell(row, Column::Notes).to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
