//! Module and slot identifiers as they appear in rig status logs.
//!
//! Different rig revisions spell the same thing differently: plain 1-based
//! integers (`[3, 7]`), zero-padded ids (`['03', '07']`) or device names
//! (`['ttyACM2']`). An [`IdentifierDialect`] maps a raw token to its canonical
//! spelling, which is then looked up in a caller-supplied [`Universe`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ForensicsError, Result};

// ── IdentifierDialect ─────────────────────────────────────────────────────────

/// How raw identifier tokens are canonicalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierDialect {
    /// Integers, optionally zero-padded: `"03"` → `"3"`.
    ModuleNumber,
    /// Serial device names: `"'ttyACM2'"` → `"ttyACM2"`.
    TtyAcm,
    /// Any token, compared verbatim once quotes are stripped.
    Opaque,
}

impl IdentifierDialect {
    pub const ALL: [IdentifierDialect; 3] = [Self::ModuleNumber, Self::TtyAcm, Self::Opaque];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModuleNumber => "module-number",
            Self::TtyAcm => "tty-acm",
            Self::Opaque => "opaque",
        }
    }

    /// Canonical spelling of `token`, or a parse error naming the token.
    pub fn canonicalize(self, token: &str) -> Result<String> {
        let bare = strip_quotes(token);
        let reject = |reason: &str| ForensicsError::Parse {
            source_name: format!("identifier '{}'", token.trim()),
            reason: format!("{} ({})", reason, self),
        };

        match self {
            Self::ModuleNumber => bare
                .parse::<u32>()
                .map(|n| n.to_string())
                .map_err(|_| reject("not an integer")),
            Self::TtyAcm => bare
                .strip_prefix("ttyACM")
                .and_then(|digits| digits.parse::<u32>().ok())
                .map(|n| format!("ttyACM{}", n))
                .ok_or_else(|| reject("not a ttyACM device name")),
            Self::Opaque => {
                if bare.is_empty() {
                    Err(reject("empty token"))
                } else {
                    Ok(bare.to_string())
                }
            }
        }
    }
}

impl fmt::Display for IdentifierDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierDialect {
    type Err = ForensicsError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| ForensicsError::UnknownDialect(s.to_string()))
    }
}

fn strip_quotes(token: &str) -> &str {
    token.trim().trim_matches(|c| c == '\'' || c == '"').trim()
}

// ── Universe ──────────────────────────────────────────────────────────────────

/// The ordered set of identifiers a status record is expected to cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    ids: Vec<String>,
}

impl Universe {
    /// Module numbers `1..=count` (modules are numbered from one).
    pub fn modules(count: usize) -> Self {
        Self::from_ids((1..=count).map(|n| n.to_string()))
    }

    /// Slot devices `ttyACM0..ttyACM{count-1}`.
    pub fn tty_slots(count: usize) -> Self {
        Self::from_ids((0..count).map(|n| format!("ttyACM{}", n)))
    }

    /// Explicit identifiers; duplicates are dropped, first occurrence wins.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self { ids: out }
    }

    /// Default universe for a dialect.
    ///
    /// Opaque identifiers have no natural range, so they fall back to
    /// module numbering.
    pub fn for_dialect(dialect: IdentifierDialect, module_count: usize, slot_count: usize) -> Self {
        match dialect {
            IdentifierDialect::TtyAcm => Self::tty_slots(slot_count),
            IdentifierDialect::ModuleNumber | IdentifierDialect::Opaque => {
                Self::modules(module_count)
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
