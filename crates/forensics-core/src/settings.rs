use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::identifiers::{IdentifierDialect, Universe};

/// Journal categories downloaded by the reboot rig.
pub const DEFAULT_CATEGORIES: [&str; 3] = ["general", "urmc", "xinet"];
/// Number of module slots on a BVVU blade.
pub const DEFAULT_MODULE_COUNT: usize = 16;
/// Number of `ttyACM` devices expected over ssh.
pub const DEFAULT_SLOT_COUNT: usize = 16;
/// Tag assigned to status lines written without a `[TAG]`.
pub const UNTAGGED: &str = "default";

/// Tag → dialect mapping used when neither the CLI nor the profile has one.
pub fn default_tag_dialects() -> BTreeMap<String, IdentifierDialect> {
    BTreeMap::from([
        ("UIOB".to_string(), IdentifierDialect::ModuleNumber),
        ("SSH".to_string(), IdentifierDialect::TtyAcm),
        (UNTAGGED.to_string(), IdentifierDialect::ModuleNumber),
    ])
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Offline forensics for BVVU reboot test runs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bvvu-forensics",
    about = "Offline forensics for BVVU reboot test runs",
    version
)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Command,

    /// Report format
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Logging level
    #[arg(
        long,
        global = true,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Also write diagnostics to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Analysis profile (defaults to ~/.bvvu-forensics/profile.json)
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,

    /// Persist the effective analysis settings to the profile
    #[arg(long, global = true)]
    pub save_profile: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Detect journal records lost across reboot snapshots
    Continuity {
        /// Directory holding "{category} {YYYY-MM-DD_HH-MM-SS} {size}.txt" files
        dir: PathBuf,

        /// Journal category to check (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Name of the device the journals were collected from
        #[arg(long)]
        device_name: Option<String>,
    },

    /// Module and slot dropout statistics from a rig status log
    Flakiness {
        /// Rig log file containing "Number of missing modules" records
        status_log: PathBuf,

        /// Identifier dialect for a tag, e.g. SSH=tty-acm (repeatable)
        #[arg(long = "dialect", value_parser = parse_tag_dialect)]
        dialects: Vec<(String, IdentifierDialect)>,

        /// Number of modules on the blade
        #[arg(long)]
        modules: Option<usize>,

        /// Number of ttyACM slots expected over ssh
        #[arg(long)]
        slots: Option<usize>,
    },
}

/// Parse a `TAG=DIALECT` pair.
fn parse_tag_dialect(s: &str) -> Result<(String, IdentifierDialect), String> {
    let (tag, dialect) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TAG=DIALECT, got '{}'", s))?;
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(format!("empty tag in '{}'", s));
    }
    let dialect = dialect.parse::<IdentifierDialect>().map_err(|e| e.to_string())?;
    Ok((tag.to_string(), dialect))
}

// ── AnalysisProfile ────────────────────────────────────────────────────────────

/// Persisted analysis defaults saved to `~/.bvvu-forensics/profile.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct AnalysisProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_dialects: Option<BTreeMap<String, IdentifierDialect>>,
    /// Explicit identifier sets per tag, overriding the dialect default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_identifiers: Option<BTreeMap<String, Vec<String>>>,
}

impl AnalysisProfile {
    /// Default profile location, `~/.bvvu-forensics/profile.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Profile location rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".bvvu-forensics").join("profile.json")
    }

    /// Load a profile; `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring malformed profile {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Atomically write the profile, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}

// ── Resolved requests ──────────────────────────────────────────────────────────

/// Fully resolved continuity analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuityRequest {
    pub dir: PathBuf,
    pub categories: Vec<String>,
    pub device_name: Option<String>,
}

/// Fully resolved flakiness analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FlakinessRequest {
    pub status_log: PathBuf,
    /// Dialect and expected identifiers per status-log tag.
    pub tags: BTreeMap<String, TagSpec>,
    /// Used for tags that appear in the log without an explicit spec.
    pub fallback: TagSpec,
}

/// How one status-log tag is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSpec {
    pub dialect: IdentifierDialect,
    pub universe: Universe,
}

impl FlakinessRequest {
    pub fn spec_for(&self, tag: &str) -> &TagSpec {
        self.tags.get(tag).unwrap_or(&self.fallback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisRequest {
    Continuity(ContinuityRequest),
    Flakiness(FlakinessRequest),
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Profile path in effect: `--profile` or the default location.
    pub fn profile_path(&self) -> PathBuf {
        self.profile.clone().unwrap_or_else(AnalysisProfile::config_path)
    }

    /// Merge CLI values with the profile at [`Settings::profile_path`].
    ///
    /// Explicit CLI values always win. With `--save-profile` the merged
    /// values are written back.
    pub fn resolve(&self) -> AnalysisRequest {
        self.resolve_with_profile(&self.profile_path())
    }

    /// Full implementation with an explicit profile path.
    pub fn resolve_with_profile(&self, profile_path: &Path) -> AnalysisRequest {
        let mut profile = AnalysisProfile::load_from(profile_path);

        let request = match &self.command {
            Command::Continuity {
                dir,
                categories,
                device_name,
            } => {
                if !categories.is_empty() {
                    profile.categories = Some(unique_in_order(categories));
                }
                if device_name.is_some() {
                    profile.device_name = device_name.clone();
                }
                AnalysisRequest::Continuity(ContinuityRequest {
                    dir: dir.clone(),
                    categories: profile
                        .categories
                        .as_deref()
                        .map(unique_in_order)
                        .unwrap_or_else(|| {
                            DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
                        }),
                    device_name: profile.device_name.clone(),
                })
            }
            Command::Flakiness {
                status_log,
                dialects,
                modules,
                slots,
            } => {
                if modules.is_some() {
                    profile.module_count = *modules;
                }
                if slots.is_some() {
                    profile.slot_count = *slots;
                }
                if !dialects.is_empty() {
                    let mut merged = profile.tag_dialects.clone().unwrap_or_default();
                    merged.extend(dialects.iter().cloned());
                    profile.tag_dialects = Some(merged);
                }
                AnalysisRequest::Flakiness(build_flakiness_request(status_log, &profile))
            }
        };

        if self.save_profile {
            if let Err(e) = profile.save_to(profile_path) {
                warn!("Failed to save profile {}: {}", profile_path.display(), e);
            }
        }

        request
    }
}

/// Drop repeated names, keeping the first occurrence.
fn unique_in_order(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(name) {
            out.push(name.clone());
        }
    }
    out
}

fn build_flakiness_request(status_log: &Path, profile: &AnalysisProfile) -> FlakinessRequest {
    let module_count = profile.module_count.unwrap_or(DEFAULT_MODULE_COUNT);
    let slot_count = profile.slot_count.unwrap_or(DEFAULT_SLOT_COUNT);

    let mut dialects = default_tag_dialects();
    if let Some(custom) = &profile.tag_dialects {
        dialects.extend(custom.iter().map(|(k, v)| (k.clone(), *v)));
    }

    let expected = profile.expected_identifiers.clone().unwrap_or_default();
    // Tags known only by their identifier set take the tokens verbatim.
    for tag in expected.keys() {
        dialects
            .entry(tag.clone())
            .or_insert(IdentifierDialect::Opaque);
    }

    let universe_for = |tag: &str, dialect: IdentifierDialect| match expected.get(tag) {
        Some(ids) => Universe::from_ids(ids.iter().cloned()),
        None => Universe::for_dialect(dialect, module_count, slot_count),
    };

    let tags = dialects
        .iter()
        .map(|(tag, dialect)| {
            let spec = TagSpec {
                dialect: *dialect,
                universe: universe_for(tag, *dialect),
            };
            (tag.clone(), spec)
        })
        .collect();

    FlakinessRequest {
        status_log: status_log.to_path_buf(),
        tags,
        fallback: TagSpec {
            dialect: IdentifierDialect::ModuleNumber,
            universe: Universe::modules(module_count),
        },
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn tmp_profile_path(tmp: &TempDir) -> PathBuf {
        AnalysisProfile::config_path_in(tmp.path())
    }

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["bvvu-forensics"];
        argv.extend_from_slice(args);
        Settings::load_from_args(argv.into_iter().map(Into::into).collect())
    }

    fn continuity(request: AnalysisRequest) -> ContinuityRequest {
        match request {
            AnalysisRequest::Continuity(r) => r,
            other => panic!("expected continuity request, got {:?}", other),
        }
    }

    fn flakiness(request: AnalysisRequest) -> FlakinessRequest {
        match request {
            AnalysisRequest::Flakiness(r) => r,
            other => panic!("expected flakiness request, got {:?}", other),
        }
    }

    // ── AnalysisProfile ───────────────────────────────────────────────────────

    #[test]
    fn test_profile_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);
        let profile = AnalysisProfile {
            categories: Some(vec!["general".to_string()]),
            device_name: Some("bvvu-7".to_string()),
            module_count: Some(8),
            slot_count: Some(4),
            tag_dialects: Some(BTreeMap::from([(
                "SSH".to_string(),
                IdentifierDialect::Opaque,
            )])),
            expected_identifiers: None,
        };

        profile.save_to(&path).expect("save");
        assert_eq!(AnalysisProfile::load_from(&path), profile);
    }

    #[test]
    fn test_profile_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = AnalysisProfile::load_from(&tmp_profile_path(&tmp));
        assert_eq!(loaded, AnalysisProfile::default());
    }

    #[test]
    fn test_profile_default_when_malformed() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(AnalysisProfile::load_from(&path), AnalysisProfile::default());
    }

    // ── CLI parsing ───────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let s = settings(&["continuity", "logs"]);
        assert_eq!(s.format, "text");
        assert_eq!(s.log_level, "INFO");
        assert!(s.log_file.is_none());
        assert!(!s.debug);
        assert!(!s.save_profile);
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let s = settings(&["--debug", "continuity", "logs"]);
        assert_eq!(s.log_level, "DEBUG");
    }

    #[test]
    fn test_settings_global_flags_after_subcommand() {
        let s = settings(&["flakiness", "rig.log", "--format", "json"]);
        assert_eq!(s.format, "json");
    }

    #[test]
    fn test_parse_tag_dialect() {
        assert_eq!(
            parse_tag_dialect("SSH=tty-acm").unwrap(),
            ("SSH".to_string(), IdentifierDialect::TtyAcm)
        );
        assert!(parse_tag_dialect("SSH").is_err());
        assert!(parse_tag_dialect("=opaque").is_err());
        assert!(parse_tag_dialect("SSH=hex").is_err());
    }

    // ── resolve: continuity ───────────────────────────────────────────────────

    #[test]
    fn test_resolve_continuity_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let s = settings(&["continuity", "logs"]);
        let r = continuity(s.resolve_with_profile(&tmp_profile_path(&tmp)));
        assert_eq!(r.dir, PathBuf::from("logs"));
        assert_eq!(r.categories, vec!["general", "urmc", "xinet"]);
        assert!(r.device_name.is_none());
    }

    #[test]
    fn test_resolve_continuity_profile_then_cli() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);
        AnalysisProfile {
            categories: Some(vec!["urmc".to_string()]),
            device_name: Some("rack-2".to_string()),
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");

        let from_profile =
            continuity(settings(&["continuity", "logs"]).resolve_with_profile(&path));
        assert_eq!(from_profile.categories, vec!["urmc"]);
        assert_eq!(from_profile.device_name.as_deref(), Some("rack-2"));

        let from_cli = continuity(
            settings(&["continuity", "logs", "--category", "xinet"]).resolve_with_profile(&path),
        );
        assert_eq!(from_cli.categories, vec!["xinet"]);
        assert_eq!(from_cli.device_name.as_deref(), Some("rack-2"));
    }

    #[test]
    fn test_resolve_continuity_repeated_category_once() {
        let tmp = TempDir::new().expect("tempdir");
        let s = settings(&[
            "continuity",
            "logs",
            "--category",
            "urmc",
            "--category",
            "general",
            "--category",
            "urmc",
        ]);
        let r = continuity(s.resolve_with_profile(&tmp_profile_path(&tmp)));
        assert_eq!(r.categories, vec!["urmc", "general"]);
    }

    #[test]
    fn test_resolve_save_profile_persists_cli_values() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);

        settings(&["--save-profile", "continuity", "logs", "--device-name", "bench"])
            .resolve_with_profile(&path);

        assert!(path.exists(), "profile must be persisted");
        let loaded = AnalysisProfile::load_from(&path);
        assert_eq!(loaded.device_name.as_deref(), Some("bench"));
    }

    #[test]
    fn test_resolve_without_save_leaves_no_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);
        settings(&["continuity", "logs"]).resolve_with_profile(&path);
        assert!(!path.exists());
    }

    // ── resolve: flakiness ────────────────────────────────────────────────────

    #[test]
    fn test_resolve_flakiness_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let r = flakiness(
            settings(&["flakiness", "rig.log"]).resolve_with_profile(&tmp_profile_path(&tmp)),
        );

        assert_eq!(r.status_log, PathBuf::from("rig.log"));
        let uiob = r.spec_for("UIOB");
        assert_eq!(uiob.dialect, IdentifierDialect::ModuleNumber);
        assert_eq!(uiob.universe, Universe::modules(16));
        let ssh = r.spec_for("SSH");
        assert_eq!(ssh.dialect, IdentifierDialect::TtyAcm);
        assert_eq!(ssh.universe, Universe::tty_slots(16));
        assert_eq!(r.spec_for("UNKNOWN").universe, Universe::modules(16));
    }

    #[test]
    fn test_resolve_flakiness_cli_dialect_and_counts() {
        let tmp = TempDir::new().expect("tempdir");
        let r = flakiness(
            settings(&[
                "flakiness",
                "rig.log",
                "--dialect",
                "SSH=opaque",
                "--modules",
                "4",
                "--slots",
                "2",
            ])
            .resolve_with_profile(&tmp_profile_path(&tmp)),
        );

        assert_eq!(r.spec_for("SSH").dialect, IdentifierDialect::Opaque);
        assert_eq!(r.spec_for("SSH").universe, Universe::modules(4));
        assert_eq!(r.spec_for("UIOB").universe, Universe::modules(4));
    }

    #[test]
    fn test_resolve_flakiness_expected_identifiers_override() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);
        AnalysisProfile {
            expected_identifiers: Some(BTreeMap::from([(
                "SSH".to_string(),
                vec!["ttyACM0".to_string(), "ttyACM1".to_string()],
            )])),
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");

        let r = flakiness(settings(&["flakiness", "rig.log"]).resolve_with_profile(&path));
        assert_eq!(r.spec_for("SSH").universe.len(), 2);
    }

    #[test]
    fn test_resolve_flakiness_expected_identifiers_without_dialect() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_profile_path(&tmp);
        AnalysisProfile {
            expected_identifiers: Some(BTreeMap::from([(
                "USB".to_string(),
                vec!["hub-a".to_string(), "hub-b".to_string()],
            )])),
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");

        let r = flakiness(settings(&["flakiness", "rig.log"]).resolve_with_profile(&path));
        let usb = r.spec_for("USB");
        assert_eq!(usb.dialect, IdentifierDialect::Opaque);
        assert_eq!(usb.universe, Universe::from_ids(["hub-a", "hub-b"]));
        assert_eq!(r.spec_for("SSH").dialect, IdentifierDialect::TtyAcm);
    }
}
