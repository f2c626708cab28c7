use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One artifact captured at one point in time for one category.
///
/// Snapshots are immutable once ingested; all reports are derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Logical channel, e.g. `"general"`, `"urmc"`, `"xinet"` or a module id.
    pub category: String,
    /// Wall-clock capture time as written by the test rig.
    pub timestamp: NaiveDateTime,
    /// Non-empty content lines in file order.
    pub content: Vec<String>,
    /// Journal size in megabytes at capture time, when known.
    #[serde(default)]
    pub size_hint: Option<f64>,
    /// File name (or other origin label) the snapshot was read from.
    #[serde(default)]
    pub source: String,
}

impl Snapshot {
    pub fn new(
        category: impl Into<String>,
        timestamp: NaiveDateTime,
        content: Vec<String>,
    ) -> Self {
        Self {
            category: category.into(),
            timestamp,
            content,
            size_hint: None,
            source: String::new(),
        }
    }

    /// The continuity witness: the last line of the snapshot.
    pub fn anchor_line(&self) -> Option<&str> {
        self.content.last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Outcome of comparing one snapshot with its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// The anchor line was found in the later snapshot.
    Retained,
    /// The anchor line vanished from the later snapshot.
    Lost,
    /// The earlier snapshot was empty, so there was nothing to look for.
    NotChecked,
}

/// Continuity outcome attributed to the later snapshot of a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityResult {
    /// Index of the later snapshot within its category sequence.
    pub index: usize,
    /// Last line of the earlier snapshot; `None` when it was empty.
    pub anchor_line: Option<String>,
    pub status: PairStatus,
    /// Capture time of the later snapshot.
    pub timestamp: NaiveDateTime,
    /// Size hint of the later snapshot.
    pub size_hint: Option<f64>,
    /// Origin of the earlier snapshot.
    pub previous_source: String,
    /// Origin of the later snapshot.
    pub source: String,
}

impl ContinuityResult {
    pub fn lost(&self) -> bool {
        self.status == PairStatus::Lost
    }

    pub fn checked(&self) -> bool {
        self.status != PairStatus::NotChecked
    }
}

/// Per-category aggregate of continuity results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: String,
    /// One result per consecutive pair, ordered by `index`.
    pub results: Vec<ContinuityResult>,
    /// Pairs whose anchor line went missing.
    pub loss_count: usize,
    /// Pairs that had an anchor to check.
    pub checked_count: usize,
    /// Number of snapshots in the category sequence.
    pub snapshot_count: usize,
}

impl CategoryReport {
    /// Indices of snapshots that lost content.
    pub fn loss_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .filter(|r| r.lost())
            .map(|r| r.index)
            .collect()
    }

    /// `true` when the snapshot at `index` was reported as lost.
    pub fn lost_at(&self, index: usize) -> bool {
        self.results.iter().any(|r| r.index == index && r.lost())
    }
}

/// Cross-category aggregate over index-aligned snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of aligned snapshot indices considered.
    pub total_checkable: usize,
    /// Indices at which no category reported a loss.
    pub clean_count: usize,
    /// `clean_count / total_checkable`, or `0.0` when there is nothing to check.
    pub clean_ratio: f64,
    /// Per-index cleanliness, `clean[i]` for index `i`.
    pub clean: Vec<bool>,
}

/// A record that was skipped during ingestion, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// File name or `"{file}:{line}"` of the offending record.
    pub source: String,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: reason.into(),
        }
    }
}

/// A category that could not be analysed, reported next to the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFailure {
    pub category: String,
    pub reason: String,
}
