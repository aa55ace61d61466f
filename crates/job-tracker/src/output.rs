//! Emitting tidy tables as aligned text, CSV or JSON.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracker_core::formatting::format_cell;
use tracker_data::analysis::{DashboardReport, ReportMetadata, TidyTable, View};
use tracker_data::reader::DroppedRow;
use unicode_width::UnicodeWidthStr;

const HEADERS: [&str; 3] = ["category", "period", "value"];

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => bail!("unknown output format: {other}"),
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    metadata: &'a ReportMetadata,
    dropped: &'a [DroppedRow],
    tables: &'a [TidyTable],
}

/// Render the tables of `view` in `format`.
pub fn render(report: &DashboardReport, view: View, format: OutputFormat) -> Result<String> {
    let tables = report.tidy_tables(view);
    match format {
        OutputFormat::Table => Ok(render_text(&tables, &report.metadata)),
        OutputFormat::Csv => render_csv(&tables),
        OutputFormat::Json => {
            let output = JsonOutput {
                metadata: &report.metadata,
                dropped: &report.dropped,
                tables: &tables,
            };
            let mut json = serde_json::to_string_pretty(&output)?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Write `content` to `out`, or stdout when no path is given.
pub fn write_output(content: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("wrote output to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            handle.flush()?;
        }
    }
    Ok(())
}

// ── Text ──────────────────────────────────────────────────────────────────────

fn render_text(tables: &[TidyTable], metadata: &ReportMetadata) -> String {
    let mut out = String::new();

    for table in tables {
        let _ = writeln!(out, "{}", table.name);
        let cells: Vec<[String; 3]> = table
            .rows
            .iter()
            .map(|r| [r.category.clone(), r.period.clone(), format_cell(r.value, 2)])
            .collect();

        let mut widths = HEADERS.map(|h| h.width());
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.width());
            }
        }

        let header = HEADERS.map(str::to_string);
        push_row(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "{}", rule.join("  "));
        for row in &cells {
            push_row(&mut out, row, &widths);
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "{} records as of {} ({} rows dropped)",
        metadata.records_processed, metadata.today, metadata.rows_dropped
    );
    out
}

/// Category and period left-aligned, value right-aligned.
fn push_row(out: &mut String, row: &[String; 3], widths: &[usize; 3]) {
    let pad = |cell: &str, width: usize| " ".repeat(width.saturating_sub(cell.width()));
    let _ = writeln!(
        out,
        "{}{}  {}{}  {}{}",
        row[0],
        pad(&row[0], widths[0]),
        row[1],
        pad(&row[1], widths[1]),
        pad(&row[2], widths[2]),
        row[2],
    );
}

// ── CSV ───────────────────────────────────────────────────────────────────────

/// A single table is written as `category,period,value`; several tables get
/// a leading `table` column naming each row's table.
fn render_csv(tables: &[TidyTable]) -> Result<String> {
    let labelled = tables.len() > 1;
    let mut writer = csv::Writer::from_writer(Vec::new());

    if labelled {
        writer.write_record(["table", HEADERS[0], HEADERS[1], HEADERS[2]])?;
    } else {
        writer.write_record(HEADERS)?;
    }

    for table in tables {
        for row in &table.rows {
            let value = row.value.map(|v| v.to_string()).unwrap_or_default();
            if labelled {
                writer.write_record([
                    table.name.as_str(),
                    row.category.as_str(),
                    row.period.as_str(),
                    value.as_str(),
                ])?;
            } else {
                writer.write_record([row.category.as_str(), row.period.as_str(), value.as_str()])?;
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush CSV output: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use tracker_core::settings::DashboardConfig;
    use tracker_data::analysis::analyze;
    use tracker_data::reader::{read_records, ReaderOptions};

    const SHEET: &str = "\
No,Job,Date,Inbound,Dialogue,Declined,Accepted,Date_US,Platform,Notes
1,Backend,25/06/2024,Yes,,,,06/25/2024,LinkedIn,
2,Frontend,20/06/2024,,Yes,,,06/20/2024,Indeed,
3,Data,01/01/2024,,,,Yes,01/01/2024,Slack,
";

    fn report() -> DashboardReport {
        let config = DashboardConfig::default();
        let load = read_records(SHEET.as_bytes(), ReaderOptions::from(&config)).unwrap();
        analyze(load, &config, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()).unwrap()
    }

    // ── OutputFormat ──────────────────────────────────────────────────────────

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    // ── Text ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_text_aligns_columns() {
        let text = render(&report(), View::Status, OutputFormat::Table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "status_percentages");
        assert!(lines[1].starts_with("category"));
        assert!(lines[2].starts_with("--------"));
        // Every data row has the same display width as the header.
        let width = lines[1].len();
        for line in &lines[3..15] {
            assert_eq!(line.len(), width, "misaligned row: {line:?}");
        }
        assert!(text.contains("Last 30 Days"));
        assert!(text.trim_end().ends_with("3 records as of 2024-06-30 (0 rows dropped)"));
    }

    #[test]
    fn test_render_text_marks_insufficient_data() {
        let config = DashboardConfig::default();
        let load = read_records(SHEET.as_bytes(), ReaderOptions::from(&config)).unwrap();
        let today = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let report = analyze(load, &config, today).unwrap();
        let text = render(&report, View::Status, OutputFormat::Table).unwrap();
        assert!(text.contains("n/a"));
    }

    // ── CSV ───────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_csv_single_table() {
        let csv = render(&report(), View::Status, OutputFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("category,period,value"));
        assert_eq!(lines.next(), Some("Inbound,Last 30 Days,50"));
    }

    #[test]
    fn test_render_csv_multiple_tables_labelled() {
        let csv = render(&report(), View::All, OutputFormat::Csv).unwrap();
        assert!(csv.starts_with("table,category,period,value\n"));
        assert!(csv.contains("platform_counts,Slack,Last 30 Days,0\n"));
        assert!(csv.contains("platform_ranking,LinkedIn,All Records,1\n"));
    }

    // ── JSON ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_json_nulls_for_insufficient() {
        let json = render(&report(), View::Status, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["records_processed"], 3);
        let rows = value["tables"][0]["rows"].as_array().unwrap();
        assert_eq!(rows[0]["category"], "Inbound");
        assert_eq!(rows[0]["value"], 50.0);
    }

    // ── write_output ──────────────────────────────────────────────────────────

    #[test]
    fn test_write_output_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        write_output("a,b\n", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
    }
}
