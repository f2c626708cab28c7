//! Cross-category and per-identifier aggregation.
//!
//! Continuity reports are folded into a run-wide [`RunSummary`]; status
//! records are folded into per-identifier dropout histories.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use forensics_core::formatting::percentage;
use forensics_core::identifiers::IdentifierDialect;
use forensics_core::models::{CategoryReport, RunSummary};
use forensics_core::settings::FlakinessRequest;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::status_log::StatusRecord;

// ── RunAggregator ─────────────────────────────────────────────────────────────

/// Stateless helper that aligns categories by snapshot index.
pub struct RunAggregator;

impl RunAggregator {
    /// Build the run summary from per-category reports.
    ///
    /// Categories are aligned by snapshot index; index `k` is clean when no
    /// category lost records at `k`. Sequences are expected to be co-indexed;
    /// when they differ in length the longest one sets the number of indices.
    pub fn summarize<'a, I>(reports: I) -> RunSummary
    where
        I: IntoIterator<Item = &'a CategoryReport>,
    {
        let reports: Vec<&CategoryReport> = reports.into_iter().collect();

        let total = reports.iter().map(|r| r.snapshot_count).max().unwrap_or(0);
        if reports.iter().any(|r| r.snapshot_count != total) {
            warn!(
                "Categories are not co-indexed: snapshot counts {:?}",
                reports
                    .iter()
                    .map(|r| (r.category.as_str(), r.snapshot_count))
                    .collect::<Vec<_>>()
            );
        }

        Self::summarize_losses(total, reports.iter().flat_map(|r| r.loss_indices()))
    }

    /// Summary over `total` indices given every index at which something lost.
    ///
    /// Indices outside `0..total` are ignored.
    pub fn summarize_losses<I>(total: usize, loss_indices: I) -> RunSummary
    where
        I: IntoIterator<Item = usize>,
    {
        let mut clean = vec![true; total];
        for index in loss_indices {
            if let Some(flag) = clean.get_mut(index) {
                *flag = false;
            }
        }

        let clean_count = clean.iter().filter(|c| **c).count();
        let clean_ratio = if total == 0 {
            0.0
        } else {
            clean_count as f64 / total as f64
        };

        RunSummary {
            total_checkable: total,
            clean_count,
            clean_ratio,
            clean,
        }
    }
}

// ── Flakiness ─────────────────────────────────────────────────────────────────

/// Availability history of one module or slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierHistory {
    pub identifier: String,
    /// Poll times at which the identifier was present.
    pub present: Vec<NaiveDateTime>,
    /// Poll times at which the identifier was missing.
    pub missing: Vec<NaiveDateTime>,
    /// `100 * missing / (present + missing)`, two decimals.
    pub dropout_percent: f64,
}

impl IdentifierHistory {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            present: Vec::new(),
            missing: Vec::new(),
            dropout_percent: 0.0,
        }
    }

    pub fn observations(&self) -> usize {
        self.present.len() + self.missing.len()
    }
}

/// Dropout statistics for one status-log tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakinessReport {
    pub tag: String,
    pub dialect: IdentifierDialect,
    /// Number of status records (polls) seen for this tag.
    pub polls: usize,
    /// Observed identifiers in universe order.
    pub identifiers: Vec<IdentifierHistory>,
    /// Poll-aligned summary: a poll is clean when nothing was missing.
    pub summary: RunSummary,
}

/// Groups status records by tag and builds [`FlakinessReport`]s.
pub struct FlakinessAggregator;

impl FlakinessAggregator {
    pub fn aggregate(
        records: &[StatusRecord],
        request: &FlakinessRequest,
    ) -> BTreeMap<String, FlakinessReport> {
        let mut by_tag: BTreeMap<&str, Vec<&StatusRecord>> = BTreeMap::new();
        for record in records {
            by_tag.entry(record.tag.as_str()).or_default().push(record);
        }

        by_tag
            .into_iter()
            .map(|(tag, polls)| (tag.to_string(), Self::aggregate_tag(tag, &polls, request)))
            .collect()
    }

    fn aggregate_tag(
        tag: &str,
        polls: &[&StatusRecord],
        request: &FlakinessRequest,
    ) -> FlakinessReport {
        let spec = request.spec_for(tag);

        let mut histories: Vec<IdentifierHistory> =
            spec.universe.iter().map(IdentifierHistory::new).collect();
        let mut loss_indices = Vec::new();

        for (index, poll) in polls.iter().enumerate() {
            if poll.has_missing() {
                loss_indices.push(index);
            }
            for history in histories.iter_mut() {
                if poll.missing.contains(&history.identifier) {
                    history.missing.push(poll.timestamp);
                } else {
                    history.present.push(poll.timestamp);
                }
            }
        }

        histories.retain(|h| h.observations() > 0);
        for history in histories.iter_mut() {
            history.dropout_percent = percentage(
                history.missing.len() as f64,
                history.observations() as f64,
                2,
            );
        }

        FlakinessReport {
            tag: tag.to_string(),
            dialect: spec.dialect,
            polls: polls.len(),
            identifiers: histories,
            summary: RunAggregator::summarize_losses(polls.len(), loss_indices),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forensics_core::identifiers::Universe;
    use forensics_core::models::{ContinuityResult, PairStatus};
    use forensics_core::settings::TagSpec;
    use std::path::PathBuf;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 5, 17)
            .unwrap()
            .and_hms_opt(14, minute, 0)
            .unwrap()
    }

    fn report(category: &str, snapshot_count: usize, lost: &[usize]) -> CategoryReport {
        let results: Vec<ContinuityResult> = (1..snapshot_count)
            .map(|index| ContinuityResult {
                index,
                anchor_line: Some("x".to_string()),
                status: if lost.contains(&index) {
                    PairStatus::Lost
                } else {
                    PairStatus::Retained
                },
                timestamp: ts(index as u32),
                size_hint: None,
                previous_source: String::new(),
                source: String::new(),
            })
            .collect();
        CategoryReport {
            category: category.to_string(),
            loss_count: lost.len(),
            checked_count: results.len(),
            results,
            snapshot_count,
        }
    }

    fn request() -> FlakinessRequest {
        FlakinessRequest {
            status_log: PathBuf::from("rig.log"),
            tags: BTreeMap::from([(
                "SSH".to_string(),
                TagSpec {
                    dialect: IdentifierDialect::TtyAcm,
                    universe: Universe::tty_slots(3),
                },
            )]),
            fallback: TagSpec {
                dialect: IdentifierDialect::ModuleNumber,
                universe: Universe::modules(2),
            },
        }
    }

    fn record(tag: &str, minute: u32, missing: &[&str]) -> StatusRecord {
        StatusRecord {
            timestamp: ts(minute),
            tag: tag.to_string(),
            missing: missing.iter().map(|m| m.to_string()).collect(),
        }
    }

    // ── RunAggregator ─────────────────────────────────────────────────────────

    #[test]
    fn test_summarize_cross_category_alignment() {
        let a = report("general", 3, &[2]);
        let b = report("urmc", 3, &[1]);

        let summary = RunAggregator::summarize([&a, &b]);

        assert_eq!(summary.total_checkable, 3);
        assert_eq!(summary.clean_count, 1);
        assert_eq!(summary.clean, vec![true, false, false]);
        assert!((summary.clean_ratio - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_same_index_counts_once() {
        let a = report("general", 4, &[2]);
        let b = report("urmc", 4, &[2]);

        let summary = RunAggregator::summarize([&a, &b]);
        assert_eq!(summary.clean_count, 3);
    }

    #[test]
    fn test_summarize_no_reports() {
        let summary = RunAggregator::summarize(std::iter::empty::<&CategoryReport>());
        assert_eq!(summary.total_checkable, 0);
        assert_eq!(summary.clean_count, 0);
        assert_eq!(summary.clean_ratio, 0.0);
    }

    #[test]
    fn test_summarize_unequal_lengths_uses_longest() {
        let a = report("general", 4, &[3]);
        let b = report("xinet", 2, &[]);

        let summary = RunAggregator::summarize([&a, &b]);
        assert_eq!(summary.total_checkable, 4);
        assert_eq!(summary.clean_count, 3);
    }

    #[test]
    fn test_summarize_losses_ignores_out_of_range() {
        let summary = RunAggregator::summarize_losses(2, [1, 7]);
        assert_eq!(summary.clean, vec![true, false]);
    }

    // ── FlakinessAggregator ───────────────────────────────────────────────────

    #[test]
    fn test_flakiness_dropout_percentages() {
        let records = vec![
            record("SSH", 0, &["ttyACM1"]),
            record("SSH", 1, &[]),
            record("SSH", 2, &["ttyACM1", "ttyACM2"]),
            record("SSH", 3, &[]),
        ];

        let reports = FlakinessAggregator::aggregate(&records, &request());
        let ssh = &reports["SSH"];

        assert_eq!(ssh.polls, 4);
        assert_eq!(ssh.dialect, IdentifierDialect::TtyAcm);
        let by_id: BTreeMap<&str, &IdentifierHistory> = ssh
            .identifiers
            .iter()
            .map(|h| (h.identifier.as_str(), h))
            .collect();
        assert_eq!(by_id["ttyACM0"].dropout_percent, 0.0);
        assert_eq!(by_id["ttyACM1"].dropout_percent, 50.0);
        assert_eq!(by_id["ttyACM2"].dropout_percent, 25.0);
        assert_eq!(by_id["ttyACM1"].missing, vec![ts(0), ts(2)]);
        assert_eq!(by_id["ttyACM1"].present, vec![ts(1), ts(3)]);
    }

    #[test]
    fn test_flakiness_poll_summary() {
        let records = vec![
            record("SSH", 0, &["ttyACM1"]),
            record("SSH", 1, &[]),
            record("SSH", 2, &[]),
        ];

        let reports = FlakinessAggregator::aggregate(&records, &request());
        let summary = &reports["SSH"].summary;
        assert_eq!(summary.total_checkable, 3);
        assert_eq!(summary.clean_count, 2);
    }

    #[test]
    fn test_flakiness_groups_by_tag_with_fallback_universe() {
        let records = vec![
            record("SSH", 0, &[]),
            record("UIOB", 0, &["2"]),
            record("UIOB", 1, &[]),
        ];

        let reports = FlakinessAggregator::aggregate(&records, &request());
        assert_eq!(reports.len(), 2);

        let uiob = &reports["UIOB"];
        assert_eq!(uiob.polls, 2);
        assert_eq!(uiob.identifiers.len(), 2);
        assert_eq!(uiob.identifiers[0].identifier, "1");
        assert_eq!(uiob.identifiers[1].dropout_percent, 50.0);
    }

    #[test]
    fn test_flakiness_no_records() {
        let reports = FlakinessAggregator::aggregate(&[], &request());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_flakiness_round_to_two_decimals() {
        let records = vec![
            record("SSH", 0, &["ttyACM0"]),
            record("SSH", 1, &[]),
            record("SSH", 2, &[]),
        ];
        let reports = FlakinessAggregator::aggregate(&records, &request());
        assert_eq!(reports["SSH"].identifiers[0].dropout_percent, 33.33);
    }
}
