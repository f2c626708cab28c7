//! Journal continuity analyser.
//!
//! Journals on the device are append-only and rotate between captures, so the
//! only reliable witness of lost records is the anchor: the last line of one
//! snapshot must still be present somewhere in the next one.

use std::collections::BTreeMap;

use forensics_core::models::{CategoryReport, ContinuityResult, PairStatus, Snapshot};
use tracing::{debug, error, info};

// ── ContinuityAnalyzer ────────────────────────────────────────────────────────

/// Stateless pairwise checker over time-ordered snapshot sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuityAnalyzer;

impl ContinuityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyse every category independently.
    pub fn analyze(
        &self,
        sequences: &BTreeMap<String, Vec<Snapshot>>,
    ) -> BTreeMap<String, CategoryReport> {
        sequences
            .iter()
            .map(|(category, snapshots)| {
                (category.clone(), self.analyze_category(category, snapshots))
            })
            .collect()
    }

    /// Walk one category's snapshots pairwise.
    ///
    /// For each pair `(i, i + 1)`:
    /// 1. an empty snapshot `i` has no anchor, the pair is `NotChecked`;
    /// 2. otherwise the anchor is the last line of snapshot `i`;
    /// 3. the pair is `Lost` when no line of snapshot `i + 1` equals the
    ///    anchor exactly, `Retained` otherwise.
    ///
    /// The outcome is attributed to snapshot `i + 1`.
    pub fn analyze_category(&self, category: &str, snapshots: &[Snapshot]) -> CategoryReport {
        info!("{} log checking...", category);

        let mut results = Vec::with_capacity(snapshots.len().saturating_sub(1));
        let mut loss_count = 0usize;
        let mut checked_count = 0usize;

        for (i, pair) in snapshots.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);

            let anchor = prev.anchor_line();
            let status = match anchor {
                None => {
                    debug!("File '{}' is empty", prev.source);
                    PairStatus::NotChecked
                }
                Some(anchor) if next.content.iter().any(|line| line == anchor) => {
                    debug!("Last record from '{}' found in '{}'", prev.source, next.source);
                    PairStatus::Retained
                }
                Some(anchor) => {
                    error!(
                        "Last record '{}' from '{}' not found in '{}'",
                        anchor, prev.source, next.source
                    );
                    PairStatus::Lost
                }
            };

            match status {
                PairStatus::Lost => {
                    loss_count += 1;
                    checked_count += 1;
                }
                PairStatus::Retained => checked_count += 1,
                PairStatus::NotChecked => {}
            }

            results.push(ContinuityResult {
                index: i + 1,
                anchor_line: anchor.map(str::to_string),
                status,
                timestamp: next.timestamp,
                size_hint: next.size_hint,
                previous_source: prev.source.clone(),
                source: next.source.clone(),
            });
        }

        info!(
            "Checking {} log completed: {} of {} checked pairs lost records",
            category, loss_count, checked_count
        );

        CategoryReport {
            category: category.to_string(),
            results,
            loss_count,
            checked_count,
            snapshot_count: snapshots.len(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
