//! Shared types for BVVU reboot forensics.
//!
//! Snapshot and report models, the error type, CLI settings and the small
//! parsing and formatting helpers used by the ingestion and analysis crates.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod identifiers;
pub mod models;
pub mod settings;

pub use error::{ForensicsError, Result};
