use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::debug;

use crate::error::{ForensicsError, Result};

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses and formats the two timestamp spellings used by the test rig.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Timestamp embedded in snapshot file names, e.g. `2023-05-17_14-03-59`.
    pub const FILE_NAME_FORMAT: &'static str = "%Y-%m-%d_%H-%M-%S";
    /// Timestamp at the start of rig log lines, e.g. `2023-05-17 14:03:59`.
    pub const LOG_LINE_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Parse a file-name timestamp.
    pub fn parse_file_stamp(s: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, Self::FILE_NAME_FORMAT)
            .map_err(|_| ForensicsError::Timestamp(s.to_string()))
    }

    /// Parse a log-line timestamp.
    ///
    /// Fractional seconds (`,123` or `.123`) written by some logger
    /// configurations are accepted and dropped.
    pub fn parse_log_stamp(s: &str) -> Result<NaiveDateTime> {
        let trimmed = s.trim();
        let whole_seconds = trimmed
            .split_once([',', '.'])
            .map(|(head, _)| head)
            .unwrap_or(trimmed);
        NaiveDateTime::parse_from_str(whole_seconds, Self::LOG_LINE_FORMAT)
            .map_err(|_| ForensicsError::Timestamp(s.to_string()))
    }

    pub fn format_file_stamp(ts: &NaiveDateTime) -> String {
        ts.format(Self::FILE_NAME_FORMAT).to_string()
    }

    pub fn format_log_stamp(ts: &NaiveDateTime) -> String {
        ts.format(Self::LOG_LINE_FORMAT).to_string()
    }
}

// ── SizeHintProcessor ─────────────────────────────────────────────────────────

/// Normalises journal size tokens (`"500K"`, `"10M"`, `"1.5G"`) to megabytes.
pub struct SizeHintProcessor;

impl SizeHintProcessor {
    /// Convert a size token with a `K`/`M`/`G` suffix into megabytes.
    ///
    /// The suffix is case-insensitive. Anything else is an error.
    pub fn normalize(token: &str) -> Result<f64> {
        let token = token.trim();
        let invalid = || ForensicsError::SizeToken(token.to_string());

        let unit = token.chars().last().ok_or_else(invalid)?;
        let multiplier = match unit.to_ascii_uppercase() {
            'K' => 1.0 / 1024.0,
            'M' => 1.0,
            'G' => 1024.0,
            _ => return Err(invalid()),
        };

        let number = &token[..token.len() - unit.len_utf8()];
        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        Ok(value * multiplier)
    }

    /// Extract the size token from `journalctl --disk-usage` output.
    ///
    /// The command prints a sentence like
    /// `"Archived and active journals take up 1.5G in the file system."`,
    /// possibly surrounded by shell prompt noise. Lines are scanned from the
    /// end so the most recent report wins.
    pub fn from_disk_usage(output: &str) -> Option<String> {
        static SIZE_RE: OnceLock<Regex> = OnceLock::new();
        let re = SIZE_RE.get_or_init(|| {
            Regex::new(r"\s(\d+(?:\.\d+)?[A-Za-z])\s").expect("regex is valid")
        });

        let token = output
            .lines()
            .rev()
            .map(|line| line.trim_end_matches('\r'))
            .find_map(|line| re.captures(line).map(|c| c[1].to_string()));

        if token.is_none() {
            debug!("No size token found in disk usage output");
        }
        token
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
