//! Top-level analysis pipelines.
//!
//! Orchestrates ingestion, continuity checking and aggregation, returning
//! outcomes ready for the report renderers.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use forensics_core::error::Result;
use forensics_core::formatting::{format_start_date, percentage};
use forensics_core::models::{CategoryFailure, CategoryReport, RunSummary, SkippedRecord};
use forensics_core::settings::{ContinuityRequest, FlakinessRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregator::{FlakinessAggregator, FlakinessReport, RunAggregator};
use crate::analyzer::ContinuityAnalyzer;
use crate::reader::{ingest_directory, NamingConvention, TimestampedFileName};
use crate::status_log::StatusLogParser;

// ── Public types ──────────────────────────────────────────────────────────────

/// One point of a size-over-time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    /// Journal size in megabytes, when the file name carried one.
    pub size_hint: Option<f64>,
}

/// Loss points of one category and its share of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLosses {
    pub category: String,
    pub points: Vec<SeriesPoint>,
    pub lost: usize,
    /// Aligned indices of the run ([`RunSummary::total_checkable`]).
    pub total: usize,
    /// `100 * lost / total`, one decimal.
    pub percent: f64,
}

/// Everything the continuity pipeline produced for one directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityOutcome {
    pub source: String,
    pub device_name: Option<String>,
    /// Earliest snapshot date as `dd.mm.YYYY`.
    pub start_date: Option<String>,
    /// Reports in request order; categories without snapshots are absent.
    pub reports: Vec<CategoryReport>,
    pub summary: RunSummary,
    /// Reference category used for [`ContinuityOutcome::size_over_time`].
    pub reference_category: Option<String>,
    pub size_over_time: Vec<SeriesPoint>,
    pub losses: Vec<CategoryLosses>,
    pub skipped: Vec<SkippedRecord>,
    pub failures: Vec<CategoryFailure>,
}

impl ContinuityOutcome {
    /// Run-wide clean share, one decimal.
    pub fn clean_percent(&self) -> f64 {
        percentage(
            self.summary.clean_count as f64,
            self.summary.total_checkable as f64,
            1,
        )
    }
}

/// Everything the flakiness pipeline produced for one status log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakinessOutcome {
    pub source: String,
    /// Earliest poll date as `dd.mm.YYYY`.
    pub start_date: Option<String>,
    pub reports: BTreeMap<String, FlakinessReport>,
    pub skipped: Vec<SkippedRecord>,
    pub warnings: Vec<SkippedRecord>,
}

// ── Continuity ────────────────────────────────────────────────────────────────

/// Run the continuity pipeline with the default file-name convention.
pub fn analyze_continuity(request: &ContinuityRequest) -> Result<ContinuityOutcome> {
    analyze_continuity_with(request, &TimestampedFileName)
}

/// Run the continuity pipeline.
///
/// 1. Ingest every requested category from the directory.
/// 2. Check each category's snapshots pairwise.
/// 3. Align categories by index into a [`RunSummary`].
/// 4. Collect the size series and loss points for reporting.
///
/// Only a missing directory is an error; everything else is reported in the
/// outcome.
pub fn analyze_continuity_with(
    request: &ContinuityRequest,
    convention: &dyn NamingConvention,
) -> Result<ContinuityOutcome> {
    let ingestion = ingest_directory(&request.dir, &request.categories, convention)?;

    let mut by_category = ContinuityAnalyzer::new().analyze(&ingestion.sequences);
    let reports: Vec<CategoryReport> = request
        .categories
        .iter()
        .filter_map(|category| by_category.remove(category))
        .collect();

    let summary = RunAggregator::summarize(&reports);

    let reference_category = reports.first().map(|r| r.category.clone());
    let size_over_time = reference_category
        .as_ref()
        .and_then(|category| ingestion.sequences.get(category))
        .map(|snapshots| {
            snapshots
                .iter()
                .map(|s| SeriesPoint {
                    timestamp: s.timestamp,
                    size_hint: s.size_hint,
                })
                .collect()
        })
        .unwrap_or_default();

    let losses = reports
        .iter()
        .map(|report| category_losses(report, summary.total_checkable))
        .collect();

    let start_date = format_start_date(
        ingestion
            .sequences
            .values()
            .flat_map(|snapshots| snapshots.iter().map(|s| &s.timestamp)),
    );

    info!(
        "Continuity of {}: {} of {} snapshots without losses",
        request.dir.display(),
        summary.clean_count,
        summary.total_checkable
    );
    if !ingestion.skipped.is_empty() {
        warn!("{} files skipped", ingestion.skipped.len());
    }

    Ok(ContinuityOutcome {
        source: request.dir.display().to_string(),
        device_name: request.device_name.clone(),
        start_date,
        reports,
        summary,
        reference_category,
        size_over_time,
        losses,
        skipped: ingestion.skipped,
        failures: ingestion.failures,
    })
}

// ── Flakiness ─────────────────────────────────────────────────────────────────

/// Run the flakiness pipeline over the request's status log.
///
/// Only a missing or unreadable log is an error.
pub fn analyze_flakiness(request: &FlakinessRequest) -> Result<FlakinessOutcome> {
    let log = StatusLogParser::new(request).read()?;
    Ok(flakiness_outcome(
        request.status_log.display().to_string(),
        log,
        request,
    ))
}

/// Same as [`analyze_flakiness`] over in-memory log text.
pub fn analyze_flakiness_text(
    request: &FlakinessRequest,
    text: &str,
    label: &str,
) -> FlakinessOutcome {
    let log = StatusLogParser::new(request).parse_text(text, label);
    flakiness_outcome(label.to_string(), log, request)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn category_losses(report: &CategoryReport, total: usize) -> CategoryLosses {
    let points: Vec<SeriesPoint> = report
        .results
        .iter()
        .filter(|r| r.lost())
        .map(|r| SeriesPoint {
            timestamp: r.timestamp,
            size_hint: r.size_hint,
        })
        .collect();

    CategoryLosses {
        category: report.category.clone(),
        lost: points.len(),
        total,
        percent: percentage(points.len() as f64, total as f64, 1),
        points,
    }
}

fn flakiness_outcome(
    source: String,
    log: crate::status_log::StatusLog,
    request: &FlakinessRequest,
) -> FlakinessOutcome {
    let reports = FlakinessAggregator::aggregate(&log.records, request);
    let start_date = format_start_date(log.records.iter().map(|r| &r.timestamp));

    for report in reports.values() {
        info!(
            "[{}] {} polls, {} without missing identifiers",
            report.tag, report.polls, report.summary.clean_count
        );
    }

    FlakinessOutcome {
        source,
        start_date,
        reports,
        skipped: log.skipped,
        warnings: log.warnings,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
