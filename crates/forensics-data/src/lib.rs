//! Data layer for BVVU reboot forensics.
//!
//! Discovers and reads journal snapshots and rig status logs, checks log
//! continuity across reboots, aggregates dropout statistics and runs the
//! top-level analysis pipelines.

pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod capture;
pub mod reader;
pub mod status_log;

pub use forensics_core as core;
