use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the directory that will hold `log_file` exists.
pub fn ensure_directories(log_file: Option<&Path>) -> anyhow::Result<()> {
    if let Some(parent) = log_file.and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a rig log-level name to an [`EnvFilter`] directive.
///
/// Unknown names are passed through so that full directives such as
/// `"forensics_data=debug"` keep working.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Diagnostics go to stderr so stdout carries only the report. With
/// `log_file` the same events are appended to that file without colors.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    ensure_directories(Some(path))?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── level_directive ───────────────────────────────────────────────────────

    #[test]
    fn test_level_directive_maps_rig_names() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
        assert_eq!(level_directive("CRITICAL"), "error");
    }

    #[test]
    fn test_level_directive_passes_through_directives() {
        assert_eq!(level_directive("forensics_data=trace"), "forensics_data=trace");
    }

    // ── ensure_directories ────────────────────────────────────────────────────

    #[test]
    fn test_ensure_directories_creates_log_parent() {
        let tmp = TempDir::new().expect("tempdir");
        let log = tmp.path().join("runs").join("today").join("forensics.log");

        ensure_directories(Some(&log)).expect("ensure_directories should succeed");

        assert!(tmp.path().join("runs").join("today").is_dir());
        assert!(!log.exists(), "only the directory is created");
    }

    #[test]
    fn test_ensure_directories_without_log_file() {
        ensure_directories(None).expect("nothing to create");
        ensure_directories(Some(Path::new("forensics.log"))).expect("bare file name");
    }

    #[test]
    fn test_open_log_file_appends() {
        let tmp = TempDir::new().expect("tempdir");
        let log = tmp.path().join("logs").join("forensics.log");
        std::fs::create_dir_all(log.parent().unwrap()).unwrap();
        std::fs::write(&log, "first\n").unwrap();

        {
            use std::io::Write;
            let mut file = open_log_file(&log).expect("open");
            writeln!(file, "second").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    }
}
