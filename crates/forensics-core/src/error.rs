use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the reboot forensics crates.
#[derive(Error, Debug)]
pub enum ForensicsError {
    /// The requested source (directory or log file) does not exist.
    #[error("Source not found: {0}")]
    NotFound(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file name or log line does not follow the expected convention.
    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    /// A timestamp string did not match the expected format.
    #[error("Invalid timestamp format: {0}")]
    Timestamp(String),

    /// A size token such as `"1.5G"` could not be normalised.
    #[error("Invalid size token: {0}")]
    SizeToken(String),

    /// A requested category produced no snapshots at all.
    #[error("No snapshots found for category '{0}'")]
    EmptyCategory(String),

    /// An identifier dialect name is not one of the recognised dialects.
    #[error("Unknown identifier dialect: {0}")]
    UnknownDialect(String),

    /// A status provider failed to report the current module state.
    #[error("Status capture failed: {0}")]
    Capture(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ForensicsError {
    /// `true` for errors that invalidate a whole source rather than a
    /// single record.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::FileRead { .. } | Self::Io(_))
    }
}

/// Convenience alias used throughout the forensics crates.
pub type Result<T> = std::result::Result<T, ForensicsError>;
