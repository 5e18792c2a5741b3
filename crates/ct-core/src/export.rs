//! Exporters: console tables, JSON, and CSV.
//!
//! Renders either the combined summary or a single provider report.
//! stdout is reserved for these payloads; all logging goes to stderr.

use crate::aggregate::CombinedSummary;
use crate::scan::ProviderReport;
use chrono::Utc;
use comfy_table::{presets, Table};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors producing or writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV writer error: {0}")]
    CsvWriter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Simple ANSI accents, matching the console conventions used elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.paint("32", text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint("33", text)
    }

    fn red(&self, text: &str) -> String {
        self.paint("31", text)
    }
}

/// Render the combined summary for the console.
pub fn render_summary(
    summary: &CombinedSummary,
    errors: &[String],
    style: Style,
) -> String {
    let mut out = String::new();

    if !errors.is_empty() {
        out.push_str(&style.yellow("Errors encountered:"));
        out.push('\n');
        for error in errors {
            out.push_str(&format!("  {} {}\n", style.red("•"), error));
        }
        out.push('\n');
    }

    if summary.rows.is_empty() {
        out.push_str(&style.yellow("No compute resources found across any provider."));
        out.push('\n');
        return out;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_header(["Provider", "Resource Type", "Count"]);
    for row in &summary.rows {
        table.add_row([
            row.provider.clone(),
            row.resource.clone(),
            row.count.to_string(),
        ]);
    }
    out.push_str(&style.green("Detailed Breakdown:"));
    out.push('\n');
    out.push_str(&table.to_string());
    out.push('\n');

    let mut totals = Table::new();
    totals.load_preset(presets::UTF8_BORDERS_ONLY);
    totals.set_header(["Provider", "Total Nodes"]);
    for (provider, total) in &summary.provider_totals {
        totals.add_row([provider.clone(), total.to_string()]);
    }
    out.push('\n');
    out.push_str(&style.green("Provider Totals:"));
    out.push('\n');
    out.push_str(&totals.to_string());
    out.push('\n');

    out.push('\n');
    out.push_str(&style.green(&format!(
        "Grand Total Across All Clouds: {} compute nodes",
        summary.grand_total
    )));
    out.push('\n');
    out
}

/// Render the per-scope failures of all reports for the console.
///
/// These are the fine-grained tier of the failure model; they never affect
/// the exit code but are surfaced so partial results are recognizable.
pub fn render_failures(reports: &BTreeMap<String, ProviderReport>, style: Style) -> String {
    let failure_count: usize = reports.values().map(|r| r.failures.len()).sum();
    if failure_count == 0 {
        return String::new();
    }
    let mut out = String::new();
    out.push('\n');
    out.push_str(&style.yellow(&format!(
        "{} scope(s) could not be scanned:",
        failure_count
    )));
    out.push('\n');
    for report in reports.values() {
        for failure in &report.failures {
            out.push_str(&format!(
                "  {} {} [{}/{}] {}\n",
                style.red("•"),
                failure.provider,
                failure.kind.as_deref().unwrap_or("-"),
                failure.scope.as_deref().unwrap_or("-"),
                failure.message
            ));
        }
    }
    out
}

/// Render a single provider report for the console.
pub fn render_provider(report: &ProviderReport, style: Style) -> String {
    let mut out = String::new();

    if report.counts.is_empty() {
        out.push_str(&style.yellow("No compute resources found."));
        out.push('\n');
    } else {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_BORDERS_ONLY);
        table.set_header(["Resource Type", "Count", "Scopes"]);
        for (kind, total) in report.summarize() {
            let scopes = report.counts[&kind]
                .iter()
                .map(|(scope, count)| format!("{} ({})", scope, count))
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row([
                crate::aggregate::display_name(&kind).to_string(),
                total.to_string(),
                scopes,
            ]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
        out.push_str(&style.green(&format!("Total Compute Nodes: {}", report.total())));
        out.push('\n');
    }

    if !report.failures.is_empty() {
        out.push('\n');
        out.push_str(&style.yellow(&format!(
            "{} scope(s) could not be scanned:",
            report.failures.len()
        )));
        out.push('\n');
        for failure in &report.failures {
            out.push_str(&format!(
                "  {} [{}/{}] {}\n",
                style.red("•"),
                failure.kind.as_deref().unwrap_or("-"),
                failure.scope.as_deref().unwrap_or("-"),
                failure.message
            ));
        }
    }
    out
}

/// Combined summary JSON document.
pub fn summary_json(
    summary: &CombinedSummary,
    reports: &BTreeMap<String, ProviderReport>,
    errors: &[String],
) -> Value {
    json!({
        "generated_at": Utc::now(),
        "providers": summary.provider_totals,
        "grand_total": summary.grand_total,
        "detailed_results": reports,
        "errors": errors,
    })
}

/// Combined summary CSV: flat (provider, resource, count) rows.
pub fn summary_csv(summary: &CombinedSummary) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["Provider", "Resource Type", "Count"])?;
    for row in &summary.rows {
        writer.write_record([
            row.provider.as_str(),
            row.resource.as_str(),
            &row.count.to_string(),
        ])?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| ExportError::CsvWriter(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::CsvWriter(e.to_string()))
}

/// Single provider CSV: (resource, scope, count) rows.
pub fn provider_csv(report: &ProviderReport) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["Resource Type", "Scope", "Count"])?;
    for (kind, scopes) in &report.counts {
        for (scope, count) in scopes {
            writer.write_record([kind.as_str(), scope.as_str(), &count.to_string()])?;
        }
    }
    let data = writer
        .into_inner()
        .map_err(|e| ExportError::CsvWriter(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::CsvWriter(e.to_string()))
}

/// Write a payload to a file (atomically) or to stdout when no path is
/// given.
pub fn write_payload(path: Option<&Path>, payload: &str) -> Result<(), ExportError> {
    match path {
        Some(path) => {
            crate::orchestrate::handoff::write_atomic(path, payload.as_bytes())?;
            Ok(())
        }
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(payload.as_bytes())?;
            if !payload.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}
