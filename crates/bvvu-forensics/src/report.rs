//! Plain-text and JSON rendering of analysis outcomes.

use std::fmt::Write as _;

use forensics_core::data_processors::TimestampProcessor;
use forensics_core::formatting::{format_number, format_ratio, format_size_mb};
use forensics_core::models::SkippedRecord;
use forensics_data::analysis::{ContinuityOutcome, FlakinessOutcome};
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

/// Serialize an outcome as pretty-printed JSON.
pub fn render_json<T: Serialize>(outcome: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

// ── Continuity ────────────────────────────────────────────────────────────────

pub fn render_continuity_text(outcome: &ContinuityOutcome) -> String {
    let mut out = String::new();

    let _ = write!(out, "Journal record losses: {}", outcome.source);
    if let Some(device) = &outcome.device_name {
        let _ = write!(out, " (BVVU {})", device);
    }
    out.push('\n');
    if let Some(date) = &outcome.start_date {
        let _ = writeln!(out, "Start date: {}", date);
    }
    out.push('\n');

    let rows: Vec<Vec<String>> = outcome
        .reports
        .iter()
        .zip(&outcome.losses)
        .map(|(report, losses)| {
            vec![
                report.category.clone(),
                report.snapshot_count.to_string(),
                report.checked_count.to_string(),
                report.loss_count.to_string(),
                format_ratio(losses.lost, losses.total),
            ]
        })
        .collect();
    out.push_str(&render_table(
        &["Category", "Snapshots", "Checked", "Lost", "Share of run"],
        &rows,
    ));

    let _ = writeln!(
        out,
        "\nSnapshots without losses: {}",
        format_ratio(outcome.summary.clean_count, outcome.summary.total_checkable)
    );

    let points: Vec<Vec<String>> = outcome
        .losses
        .iter()
        .flat_map(|losses| {
            losses.points.iter().map(move |p| {
                vec![
                    losses.category.clone(),
                    TimestampProcessor::format_log_stamp(&p.timestamp),
                    format_size_mb(p.size_hint),
                ]
            })
        })
        .collect();
    if !points.is_empty() {
        out.push_str("\nLoss points:\n");
        out.push_str(&render_table(&["Category", "Captured", "Journal size"], &points));
    }

    for failure in &outcome.failures {
        let _ = writeln!(out, "\nCategory '{}' not analysed: {}", failure.category, failure.reason);
    }
    render_skipped(&mut out, "Skipped files", &outcome.skipped);

    out
}

// ── Flakiness ─────────────────────────────────────────────────────────────────

pub fn render_flakiness_text(outcome: &FlakinessOutcome) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Module availability: {}", outcome.source);
    if let Some(date) = &outcome.start_date {
        let _ = writeln!(out, "Start date: {}", date);
    }

    if outcome.reports.is_empty() {
        out.push_str("\nNo status records found.\n");
    }

    for report in outcome.reports.values() {
        let _ = writeln!(
            out,
            "\n[{}] {} polls ({}), without missing modules: {}",
            report.tag,
            report.polls,
            report.dialect,
            format_ratio(report.summary.clean_count, report.summary.total_checkable)
        );

        let rows: Vec<Vec<String>> = report
            .identifiers
            .iter()
            .map(|h| {
                vec![
                    h.identifier.clone(),
                    h.present.len().to_string(),
                    h.missing.len().to_string(),
                    format!("{}%", format_number(h.dropout_percent, 2)),
                ]
            })
            .collect();
        out.push_str(&render_table(&["Module", "Present", "Missing", "Dropout"], &rows));
    }

    render_skipped(&mut out, "Skipped lines", &outcome.skipped);
    render_skipped(&mut out, "Warnings", &outcome.warnings);

    out
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn render_skipped(out: &mut String, title: &str, records: &[SkippedRecord]) {
    if records.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{} ({}):", title, records.len());
    for record in records {
        let _ = writeln!(out, "  {}: {}", record.source, record.reason);
    }
}

/// Left-aligned columns padded to their widest cell in terminal columns.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &header_cells, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(cell.width())));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

// ── Tests ─────────────────────────────────────────────────────────────────────
