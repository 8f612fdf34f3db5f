//! Terminal output formatting for sqlbatch commands.
//! Uses comfy-table for tabular output and colored for
//! status-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use sqlbatch_core::results::ResultSet;
use sqlbatch_core::{RunReport, SplitReport, StatementOutcome, StatementStatus};

/// Longest statement text shown in a table cell before truncation.
const STATEMENT_PREVIEW_CHARS: usize = 80;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", head)
}

/// Print the statements found by `split` as a numbered table.
pub fn print_split_report(report: &SplitReport) {
    if let Some(anomaly) = &report.anomaly {
        println!("{} {}", "WARNING:".yellow().bold(), anomaly);
    }

    if report.statements.is_empty() {
        println!("{}", "No statements found.".yellow());
        return;
    }

    let mut table = new_table();
    table.set_header(vec![Cell::new("#"), Cell::new("Statement")]);
    for (i, statement) in report.statements.iter().enumerate() {
        table.add_row(vec![Cell::new(i + 1), Cell::new(statement)]);
    }
    println!("{table}");

    println!(
        "{}",
        format!(
            "{} statement(s) in {} (checksum {})",
            report.statements.len(),
            report.source,
            report.checksum
        )
        .dimmed()
    );
}

/// Return a colored string representation of a statement status.
fn format_status(status: StatementStatus) -> String {
    match status {
        StatementStatus::Succeeded => "Succeeded".green().to_string(),
        StatementStatus::Failed => "Failed".red().bold().to_string(),
        StatementStatus::Skipped => "Skipped".dimmed().to_string(),
    }
}

fn format_rows(outcome: &StatementOutcome) -> String {
    match outcome.status {
        StatementStatus::Succeeded if !outcome.columns.is_empty() => outcome.row_count.to_string(),
        StatementStatus::Succeeded => outcome
            .rows_affected
            .map(|n| format!("{} affected", n))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Print the per-statement table, previews, and totals of a run.
pub fn print_run_report(report: &RunReport, preview_rows: usize) {
    if let Some(anomaly) = &report.anomaly {
        println!("{} {}", "WARNING:".yellow().bold(), anomaly);
    }

    let batch = &report.batch;
    if batch.outcomes.is_empty() {
        println!("{}", "No statements to run.".yellow());
        return;
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Statement"),
        Cell::new("Status"),
        Cell::new("Rows"),
        Cell::new("Execution Time"),
        Cell::new("Output"),
    ]);

    for outcome in &batch.outcomes {
        let exec_time = match outcome.status {
            StatementStatus::Skipped => String::new(),
            _ => format!("{}ms", outcome.execution_time_ms),
        };
        let artifact = outcome
            .artifact
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(outcome.index),
            Cell::new(truncate(&outcome.statement, STATEMENT_PREVIEW_CHARS)),
            Cell::new(format_status(outcome.status)),
            Cell::new(format_rows(outcome)),
            Cell::new(exec_time),
            Cell::new(artifact),
        ]);
    }
    println!("{table}");

    for outcome in &batch.outcomes {
        if let Some(error) = &outcome.error {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if preview_rows > 0 {
        for outcome in &batch.outcomes {
            if let Some(result) = outcome.result.as_ref().filter(|r| r.has_columns()) {
                println!();
                println!(
                    "{}",
                    format!("Statement {} result:", outcome.index).bold()
                );
                print_result_preview(result, preview_rows);
            }
        }
    }

    println!();
    print_run_totals(report);
}

/// Print only the summary lines of a run.
pub fn print_run_totals(report: &RunReport) {
    let batch = &report.batch;
    let started = report
        .started_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");

    let summary = format!(
        "Ran {} statement(s) from {} at {}: {} succeeded, {} failed, {} skipped ({}ms)",
        batch.statements_total,
        report.source,
        started,
        batch.succeeded,
        batch.failed,
        batch.skipped,
        batch.total_time_ms
    );
    if batch.all_succeeded() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.yellow().bold());
    }

    println!(
        "  {} Results in {}",
        "→".green(),
        report.output_directory.display()
    );
    if let Some(path) = &batch.final_artifact {
        println!("  {} Final result {}", "→".green(), path.display());
    }
}

/// Print the first `max_rows` rows of a result set.
pub fn print_result_preview(result: &ResultSet, max_rows: usize) {
    let mut table = new_table();
    table.set_header(result.columns.iter().map(Cell::new).collect::<Vec<_>>());

    for row in result.rows.iter().take(max_rows) {
        table.add_row(
            row.iter()
                .map(|v| match v {
                    Some(value) => Cell::new(value),
                    None => Cell::new("NULL".dimmed()),
                })
                .collect::<Vec<_>>(),
        );
    }
    println!("{table}");

    if result.rows.len() > max_rows {
        println!(
            "{}",
            format!("... {} more row(s)", result.rows.len() - max_rows).dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate("SELECT 1", 80), "SELECT 1");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "SELECT ".repeat(20);
        let cut = truncate(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }
}
