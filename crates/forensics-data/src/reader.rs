//! Snapshot discovery and loading.
//!
//! Reads the journal dumps a reboot run leaves behind, one file per category
//! and capture, and turns them into time-ordered [`Snapshot`] sequences.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use forensics_core::data_processors::{SizeHintProcessor, TimestampProcessor};
use forensics_core::error::{ForensicsError, Result};
use forensics_core::models::{CategoryFailure, SkippedRecord, Snapshot};
use tracing::{debug, info, warn};

// ── Naming conventions ────────────────────────────────────────────────────────

/// Metadata recovered from a snapshot file name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    pub category: String,
    pub timestamp: NaiveDateTime,
    pub size_hint: Option<f64>,
}

/// Strategy for extracting category, timestamp and size from a file name.
pub trait NamingConvention {
    /// Parse `file_name` as a snapshot of `category`.
    ///
    /// Returns `None` when the file does not belong to `category` at all, and
    /// `Some(Err(_))` when it does but its metadata is malformed.
    fn parse(&self, file_name: &str, category: &str) -> Option<Result<ParsedName>>;
}

/// `"{category} {YYYY-MM-DD_HH-MM-SS}[ {size}].txt"`, the rig's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampedFileName;

impl NamingConvention for TimestampedFileName {
    fn parse(&self, file_name: &str, category: &str) -> Option<Result<ParsedName>> {
        let rest = file_name
            .strip_prefix(category)?
            .strip_prefix(' ')?
            .strip_suffix(".txt")?;

        let parse_error = |reason: String| ForensicsError::Parse {
            source_name: file_name.to_string(),
            reason,
        };

        let mut tokens = rest.split(' ');
        let stamp = tokens.next().unwrap_or_default();
        let size = tokens.next();
        if tokens.next().is_some() {
            return Some(Err(parse_error("unexpected extra tokens".to_string())));
        }

        let parsed = TimestampProcessor::parse_file_stamp(stamp)
            .map_err(|e| parse_error(e.to_string()))
            .and_then(|timestamp| {
                let size_hint = size
                    .map(SizeHintProcessor::normalize)
                    .transpose()
                    .map_err(|e| parse_error(e.to_string()))?;
                Ok(ParsedName {
                    category: category.to_string(),
                    timestamp,
                    size_hint,
                })
            });
        Some(parsed)
    }
}

// ── Ingestion result ──────────────────────────────────────────────────────────

/// Everything recovered from one source directory.
#[derive(Debug, Clone, Default)]
pub struct Ingestion {
    /// Non-empty, time-ordered sequences keyed by category.
    pub sequences: BTreeMap<String, Vec<Snapshot>>,
    /// Files that were recognised but could not be used.
    pub skipped: Vec<SkippedRecord>,
    /// Requested categories that yielded no snapshots.
    pub failures: Vec<CategoryFailure>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// List regular files directly inside `dir`, sorted by file name.
pub fn find_snapshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ForensicsError::NotFound(dir.to_path_buf()));
    }

    let files = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    Ok(files)
}

/// Read a snapshot file into its non-empty lines.
///
/// Line endings (`\n` or `\r\n`) are stripped; nothing else is trimmed.
pub fn read_snapshot_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| ForensicsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Ingest every requested category from `dir`.
///
/// A missing directory fails the whole source. Unreadable or malformed files
/// are recorded in [`Ingestion::skipped`]; categories left without snapshots
/// are recorded in [`Ingestion::failures`]. Neither aborts the others.
///
/// A file recognised under several requested categories (`urmc` and
/// `urmc old`) belongs to the longest of them.
pub fn ingest_directory(
    dir: &Path,
    categories: &[String],
    convention: &dyn NamingConvention,
) -> Result<Ingestion> {
    let files = find_snapshot_files(dir)?;
    info!("Found {} files in {}", files.len(), dir.display());

    let mut ingestion = Ingestion::default();

    for (position, category) in categories.iter().enumerate() {
        if categories[..position].contains(category) {
            continue;
        }
        let mut snapshots: Vec<Snapshot> = Vec::new();

        for path in &files {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(parsed) = convention.parse(file_name, category) else {
                continue;
            };
            if claimed_by_longer_category(file_name, category, categories, convention) {
                continue;
            }

            match parsed.and_then(|name| load_snapshot(path, file_name, name)) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!("Skipping {}: {}", file_name, e);
                    ingestion.skipped.push(SkippedRecord::new(file_name, e.to_string()));
                }
            }
        }

        if snapshots.is_empty() {
            warn!("No snapshots found for category '{}'", category);
            ingestion.failures.push(CategoryFailure {
                category: category.clone(),
                reason: ForensicsError::EmptyCategory(category.clone()).to_string(),
            });
            continue;
        }

        // Stable: equal timestamps keep file-name order.
        snapshots.sort_by_key(|s| s.timestamp);
        debug!("Category '{}': {} snapshots", category, snapshots.len());
        ingestion.sequences.insert(category.clone(), snapshots);
    }

    Ok(ingestion)
}

/// Ingest a single file whose category is known up front.
pub fn ingest_file(
    path: &Path,
    category: &str,
    convention: &dyn NamingConvention,
) -> Result<Snapshot> {
    if !path.is_file() {
        return Err(ForensicsError::NotFound(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let parsed = convention
        .parse(file_name, category)
        .unwrap_or_else(|| {
            Err(ForensicsError::Parse {
                source_name: file_name.to_string(),
                reason: format!("name does not describe a '{}' snapshot", category),
            })
        })?;

    load_snapshot(path, file_name, parsed)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn claimed_by_longer_category(
    file_name: &str,
    category: &str,
    categories: &[String],
    convention: &dyn NamingConvention,
) -> bool {
    categories
        .iter()
        .filter(|other| other.len() > category.len())
        .any(|other| convention.parse(file_name, other).is_some())
}

fn load_snapshot(path: &Path, file_name: &str, name: ParsedName) -> Result<Snapshot> {
    let content = read_snapshot_lines(path)?;
    if content.is_empty() {
        debug!("File '{}' is empty", file_name);
    }
    Ok(Snapshot {
        category: name.category,
        timestamp: name.timestamp,
        content,
        size_hint: name.size_hint,
        source: file_name.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
