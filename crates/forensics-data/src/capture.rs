//! Status capture boundary.
//!
//! The rig asks the device which modules or slots are currently missing and
//! appends one status line per poll to its log. The device side is an
//! injected [`StatusProvider`]; [`StatusRecorder`] owns the output sink.

use std::collections::BTreeSet;
use std::io::Write;

use chrono::NaiveDateTime;
use forensics_core::error::{ForensicsError, Result};
use forensics_core::identifiers::IdentifierDialect;
use tracing::{debug, warn};

use crate::status_log::StatusRecord;

/// Source of module/slot availability, e.g. an SSH session or a device API.
pub trait StatusProvider {
    /// Tag written in front of every status line (`"SSH"`, `"UIOB"`, ...).
    fn tag(&self) -> &str;

    /// Identifier dialect of the tokens returned by
    /// [`StatusProvider::missing_identifiers`].
    fn dialect(&self) -> IdentifierDialect;

    /// Identifiers that are missing right now.
    fn missing_identifiers(&mut self) -> Result<Vec<String>>;
}

/// Writes one canonical status line per poll to `sink`.
pub struct StatusRecorder<W: Write> {
    sink: W,
}

impl<W: Write> StatusRecorder<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Poll `provider` once and record the result as taken at `at`.
    ///
    /// Tokens are canonicalized with the provider's dialect; a token that
    /// does not fit the dialect fails the poll.
    pub fn poll(
        &mut self,
        provider: &mut dyn StatusProvider,
        at: NaiveDateTime,
    ) -> Result<StatusRecord> {
        let tag = provider.tag().to_string();
        let dialect = provider.dialect();
        let missing = provider
            .missing_identifiers()
            .map_err(|e| ForensicsError::Capture(format!("[{}] {}", tag, e)))?
            .iter()
            .map(|token| dialect.canonicalize(token))
            .collect::<Result<BTreeSet<String>>>()?;

        let record = StatusRecord {
            timestamp: at,
            tag,
            missing,
        };

        writeln!(self.sink, "{}", record.to_log_line())?;
        self.sink.flush()?;

        if record.has_missing() {
            warn!(
                "[{}] {} missing: {:?}",
                record.tag,
                record.missing.len(),
                record.missing
            );
        } else {
            debug!("[{}] all present", record.tag);
        }

        Ok(record)
    }

    /// [`StatusRecorder::poll`] stamped with the local wall clock.
    pub fn poll_now(&mut self, provider: &mut dyn StatusProvider) -> Result<StatusRecord> {
        let now = chrono::Local::now().naive_local();
        self.poll(provider, now)
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_log::{parse_status_line, StatusLogParser};
    use chrono::NaiveDate;
    use forensics_core::identifiers::Universe;
    use forensics_core::settings::{FlakinessRequest, TagSpec};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    struct FakeProvider {
        tag: &'static str,
        dialect: IdentifierDialect,
        polls: Vec<Result<Vec<String>>>,
    }

    impl FakeProvider {
        fn new(tag: &'static str, dialect: IdentifierDialect, polls: Vec<Vec<&str>>) -> Self {
            Self {
                tag,
                dialect,
                polls: polls
                    .into_iter()
                    .rev()
                    .map(|p| Ok(p.iter().map(|s| s.to_string()).collect()))
                    .collect(),
            }
        }
    }

    impl StatusProvider for FakeProvider {
        fn tag(&self) -> &str {
            self.tag
        }

        fn dialect(&self) -> IdentifierDialect {
            self.dialect
        }

        fn missing_identifiers(&mut self) -> Result<Vec<String>> {
            self.polls
                .pop()
                .unwrap_or_else(|| Err(ForensicsError::Capture("device gone".to_string())))
        }
    }

    fn ts(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 5, 17)
            .unwrap()
            .and_hms_opt(14, 3, second)
            .unwrap()
    }

    #[test]
    fn test_poll_writes_canonical_line() {
        let mut provider = FakeProvider::new(
            "SSH",
            IdentifierDialect::TtyAcm,
            vec![vec!["ttyACM7", "'ttyACM03'"]],
        );
        let mut recorder = StatusRecorder::new(Vec::new());

        let record = recorder.poll(&mut provider, ts(59)).unwrap();
        assert!(record.has_missing());

        let out = String::from_utf8(recorder.into_inner()).unwrap();
        assert_eq!(
            out,
            "[2023-05-17 14:03:59 INFO] [SSH] Number of missing modules: 2, missing modules: ['ttyACM3', 'ttyACM7']\n"
        );
    }

    #[test]
    fn test_poll_nothing_missing() {
        let mut provider = FakeProvider::new("UIOB", IdentifierDialect::ModuleNumber, vec![vec![]]);
        let mut recorder = StatusRecorder::new(Vec::new());

        let record = recorder.poll(&mut provider, ts(0)).unwrap();
        assert!(!record.has_missing());
    }

    #[test]
    fn test_poll_provider_failure_is_capture_error() {
        let mut provider = FakeProvider::new("SSH", IdentifierDialect::TtyAcm, vec![]);
        let mut recorder = StatusRecorder::new(Vec::new());

        let err = recorder.poll(&mut provider, ts(0)).unwrap_err();
        assert!(matches!(err, ForensicsError::Capture(_)));
        assert!(recorder.into_inner().is_empty());
    }

    #[test]
    fn test_poll_bad_token_writes_nothing() {
        let mut provider =
            FakeProvider::new("UIOB", IdentifierDialect::ModuleNumber, vec![vec!["x1"]]);
        let mut recorder = StatusRecorder::new(Vec::new());

        assert!(recorder.poll(&mut provider, ts(0)).is_err());
        assert!(recorder.into_inner().is_empty());
    }

    #[test]
    fn test_recorded_lines_parse_back() {
        let mut provider = FakeProvider::new(
            "UIOB",
            IdentifierDialect::ModuleNumber,
            vec![vec!["04", "12"], vec![]],
        );
        let mut recorder = StatusRecorder::new(Vec::new());
        let first = recorder.poll(&mut provider, ts(1)).unwrap();
        let second = recorder.poll(&mut provider, ts(2)).unwrap();

        let text = String::from_utf8(recorder.into_inner()).unwrap();
        let raw = parse_status_line(text.lines().next().unwrap()).unwrap().unwrap();
        assert_eq!(raw.tag, "UIOB");
        assert_eq!(raw.declared_count, "2");

        let request = FlakinessRequest {
            status_log: PathBuf::from("rig.log"),
            tags: BTreeMap::new(),
            fallback: TagSpec {
                dialect: IdentifierDialect::ModuleNumber,
                universe: Universe::modules(16),
            },
        };
        let log = StatusLogParser::new(&request).parse_text(&text, "rig.log");
        assert_eq!(log.records, vec![first, second]);
        assert!(log.warnings.is_empty());
    }
}
