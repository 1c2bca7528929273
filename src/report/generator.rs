//! Report generation.
//!
//! Renders engine output as Markdown, JSON or CSV. Empty results get a
//! neutral "no data" message instead of a table.

use crate::analysis::{AggregateTable, ChartData, MedalSummary, PivotTable};
use crate::models::{MedalType, Report, ReportMetadata};
use anyhow::{Context, Result};
use std::path::Path;

/// Message shown when the filters leave nothing to chart.
pub const NO_DATA_MESSAGE: &str = "No data matches the selected filters.";

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Medalboard Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_results_section(&report.chart));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref view) = metadata.view {
        section.push_str(&format!("- **View:** `{}`\n", view));
    }
    section.push_str(&format!("- **Filters:** {}\n", metadata.filters));

    let group_by: Vec<&str> = metadata.group_by.iter().map(|d| d.label()).collect();
    section.push_str(&format!("- **Grouped By:** {}\n", group_by.join(", ")));
    section.push_str(&format!("- **Aggregation:** {}\n", metadata.aggregation));
    section.push_str(&format!(
        "- **Records:** {} matched of {}\n",
        metadata.records_matched, metadata.records_loaded
    ));
    if metadata.rows_skipped > 0 {
        section.push_str(&format!(
            "- **Rows Skipped:** {}\n",
            metadata.rows_skipped
        ));
    }
    section.push('\n');

    section
}

/// Generate the medal tally section.
fn generate_summary_section(summary: &MedalSummary) -> String {
    let mut section = String::new();

    section.push_str("## Medal Summary\n\n");
    section.push_str(&format!(
        "| {} Gold | {} Silver | {} Bronze | **Total** |\n",
        MedalType::Gold.emoji(),
        MedalType::Silver.emoji(),
        MedalType::Bronze.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.gold, summary.silver, summary.bronze, summary.total
    ));

    let leaders = summary.leaders(5);
    if !leaders.is_empty() {
        section.push_str("### Top Countries\n\n");
        section.push_str("| Country | Medals |\n");
        section.push_str("|:---|:---:|\n");

        for (country, count) in leaders {
            section.push_str(&format!("| {} | {} |\n", country, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the results table, or the "no data" state.
fn generate_results_section(chart: &ChartData) -> String {
    let mut section = String::new();

    section.push_str("## Results\n\n");

    if chart.is_empty() {
        section.push_str(&format!("_{}_\n\n", NO_DATA_MESSAGE));
        return section;
    }

    let (header, rows) = table_cells(chart);

    section.push_str(&format!("| {} |\n", header.join(" | ")));
    section.push_str(&format!(
        "|{}\n",
        header
            .iter()
            .enumerate()
            .map(|(i, _)| if i == 0 { ":---|" } else { ":---:|" })
            .collect::<String>()
    ));
    for row in rows {
        section.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    section.push('\n');

    section
}

/// Header and body cells shared by the Markdown and CSV renderers.
fn table_cells(chart: &ChartData) -> (Vec<String>, Vec<Vec<String>>) {
    match chart {
        ChartData::Long(table) => long_cells(table),
        ChartData::Wide(pivot) => wide_cells(pivot),
    }
}

fn long_cells(table: &AggregateTable) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header: Vec<String> = table
        .group_by()
        .iter()
        .map(|d| d.label().to_string())
        .collect();
    header.push(table.aggregation().to_string());

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let mut cells = row.key.clone();
            cells.push(row.value.to_string());
            cells
        })
        .collect();

    (header, rows)
}

fn wide_cells(pivot: &PivotTable) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec![pivot.row_dimension.label().to_string()];
    header.extend(pivot.column_keys.iter().cloned());
    header.push("Total".to_string());

    let rows = pivot
        .row_keys
        .iter()
        .zip(&pivot.values)
        .zip(pivot.row_totals())
        .map(|((key, values), total)| {
            let mut cells = vec![key.clone()];
            cells.extend(values.iter().map(ToString::to_string));
            cells.push(total.to_string());
            cells
        })
        .collect();

    (header, rows)
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by Medalboard*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the results table as CSV. An empty result is a header-only file.
pub fn generate_csv_report(chart: &ChartData) -> Result<String> {
    let (header, rows) = table_cells(chart);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
