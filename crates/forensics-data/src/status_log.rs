//! Module/slot status records in rig log files.
//!
//! Every poll of the rig writes one line such as
//!
//! ```text
//! [2023-05-17 14:03:59 INFO] [SSH] Number of missing modules: 2, missing modules: ['ttyACM3', 'ttyACM7']
//! ```
//!
//! Older rig revisions omit the tag and say "disabled" instead of "missing":
//!
//! ```text
//! [2023-05-17 14:03:59 INFO] Number of disabled modules: 1, disabled modules: [4]
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use forensics_core::data_processors::TimestampProcessor;
use forensics_core::error::{ForensicsError, Result};
use forensics_core::models::SkippedRecord;
use forensics_core::settings::{FlakinessRequest, UNTAGGED};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ── StatusRecord ──────────────────────────────────────────────────────────────

/// One poll of module/slot availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub timestamp: NaiveDateTime,
    pub tag: String,
    /// Canonical identifiers reported missing, sorted.
    pub missing: BTreeSet<String>,
}

impl StatusRecord {
    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Render the record in the rig's log-line format.
    pub fn to_log_line(&self) -> String {
        let list = self
            .missing
            .iter()
            .map(|id| format!("'{}'", id))
            .collect::<Vec<_>>()
            .join(", ");
        let tag = if self.tag == UNTAGGED {
            String::new()
        } else {
            format!("[{}] ", self.tag)
        };
        format!(
            "[{} INFO] {}Number of missing modules: {}, missing modules: [{}]",
            TimestampProcessor::format_log_stamp(&self.timestamp),
            tag,
            self.missing.len(),
            list
        )
    }
}

// ── Line parsing ──────────────────────────────────────────────────────────────

/// A status line split into its fields, identifiers still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatusLine {
    pub timestamp: NaiveDateTime,
    pub tag: String,
    /// Missing count as written in the line.
    pub declared_count: String,
    pub tokens: Vec<String>,
}

fn status_line_regex() -> &'static Regex {
    static STATUS_RE: OnceLock<Regex> = OnceLock::new();
    STATUS_RE.get_or_init(|| {
        Regex::new(
            r"^\[(?P<ts>[^\]]+?) INFO\] (?:\[(?P<tag>[^\]]+)\] )?Number of (?:missing|disabled) modules: (?P<count>\d+), (?:missing|disabled) modules: \[(?P<list>.*)\]$",
        )
        .expect("regex is valid")
    })
}

/// Split a log line into status fields.
///
/// Returns `None` for ordinary log lines and `Some(Err(_))` for status lines
/// whose timestamp cannot be parsed.
pub fn parse_status_line(line: &str) -> Option<Result<RawStatusLine>> {
    let caps = status_line_regex().captures(line.trim_end_matches('\r'))?;

    let timestamp = match TimestampProcessor::parse_log_stamp(&caps["ts"]) {
        Ok(ts) => ts,
        Err(e) => return Some(Err(e)),
    };
    let tag = caps
        .name("tag")
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNTAGGED.to_string());
    let declared_count = caps["count"].to_string();
    let tokens = caps["list"]
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    Some(Ok(RawStatusLine {
        timestamp,
        tag,
        declared_count,
        tokens,
    }))
}

// ── StatusLog ─────────────────────────────────────────────────────────────────

/// All status records recovered from one log file.
#[derive(Debug, Clone, Default)]
pub struct StatusLog {
    /// Records in file order.
    pub records: Vec<StatusRecord>,
    /// Status lines dropped entirely.
    pub skipped: Vec<SkippedRecord>,
    /// Problems inside records that were still used.
    pub warnings: Vec<SkippedRecord>,
}

/// Turns rig log text into [`StatusRecord`]s using per-tag dialects.
pub struct StatusLogParser<'a> {
    request: &'a FlakinessRequest,
}

impl<'a> StatusLogParser<'a> {
    pub fn new(request: &'a FlakinessRequest) -> Self {
        Self { request }
    }

    /// Read and parse the file named by the request.
    pub fn read(&self) -> Result<StatusLog> {
        let path = self.request.status_log.as_path();
        if !path.is_file() {
            return Err(ForensicsError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| ForensicsError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let log = self.parse_bytes(&bytes, &source_label(path));
        info!(
            "Parsed {} status records from {} ({} skipped, {} warnings)",
            log.records.len(),
            path.display(),
            log.skipped.len(),
            log.warnings.len()
        );
        Ok(log)
    }

    /// Parse log text; `label` prefixes line numbers in skip reports.
    pub fn parse_text(&self, text: &str, label: &str) -> StatusLog {
        self.parse_bytes(text.as_bytes(), label)
    }

    /// Parse raw log bytes line by line.
    ///
    /// A line that is not valid UTF-8 is a skipped record; the other lines
    /// are still used.
    pub fn parse_bytes(&self, bytes: &[u8], label: &str) -> StatusLog {
        let mut log = StatusLog::default();

        for (idx, chunk) in bytes.split(|b| *b == b'\n').enumerate() {
            let origin = format!("{}:{}", label, idx + 1);
            let line = match std::str::from_utf8(chunk) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Skipping status line {}: {}", origin, e);
                    log.skipped
                        .push(SkippedRecord::new(origin, format!("invalid UTF-8: {}", e)));
                    continue;
                }
            };
            let raw = match parse_status_line(line) {
                None => continue,
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    warn!("Skipping status line {}: {}", origin, e);
                    log.skipped.push(SkippedRecord::new(origin, e.to_string()));
                    continue;
                }
            };
            let record = self.resolve(raw, &origin, &mut log.warnings);
            log.records.push(record);
        }

        log
    }

    /// Canonicalise raw tokens against the tag's dialect and universe.
    fn resolve(
        &self,
        raw: RawStatusLine,
        origin: &str,
        warnings: &mut Vec<SkippedRecord>,
    ) -> StatusRecord {
        let spec = self.request.spec_for(&raw.tag);

        if raw.declared_count.parse::<usize>().ok() != Some(raw.tokens.len()) {
            let reason = format!(
                "declared {} missing identifiers but listed {}",
                raw.declared_count,
                raw.tokens.len()
            );
            debug!("{}: {}", origin, reason);
            warnings.push(SkippedRecord::new(origin, reason));
        }

        let mut missing = BTreeSet::new();
        for token in &raw.tokens {
            match spec.dialect.canonicalize(token) {
                Ok(id) if spec.universe.contains(&id) => {
                    missing.insert(id);
                }
                Ok(id) => {
                    warnings.push(SkippedRecord::new(
                        origin,
                        format!("identifier '{}' is outside the expected set", id),
                    ));
                }
                Err(e) => warnings.push(SkippedRecord::new(origin, e.to_string())),
            }
        }

        StatusRecord {
            timestamp: raw.timestamp,
            tag: raw.tag,
            missing,
        }
    }
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
