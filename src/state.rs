use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Incremental-fetch cursor plus the hash of the rules that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing stored yet.
    Fresh,
    /// Stored hash matches the current rules; the cursor can be trusted.
    Valid,
    /// Rules changed since the cursor was stored.
    Stale,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fresh => "fresh",
            Self::Valid => "valid",
            Self::Stale => "stale",
        })
    }
}

impl SyncPhase {
    /// Why a full resync is needed, or `None` when the cursor can be reused.
    pub fn restart_reason(&self) -> Option<&'static str> {
        match self {
            Self::Fresh => Some("no previous sync, starting from scratch"),
            Self::Valid => None,
            Self::Stale => Some("rules changed since last sync, starting from scratch"),
        }
    }
}

impl SyncState {
    /// A missing file is an empty state, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Written to a sibling temp file and renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = temp_path(path);
        std::fs::write(&tmp, format!("{json}\n"))?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn phase(&self, rules_hash: &str) -> SyncPhase {
        match self.rules_hash.as_deref() {
            Some(stored) if stored == rules_hash => SyncPhase::Valid,
            _ if *self == Self::default() => SyncPhase::Fresh,
            _ => SyncPhase::Stale,
        }
    }

    /// Bring the state in line with the current rules. Any hash mismatch
    /// drops the cursor so the next fetch covers the whole range.
    pub fn resolve(mut self, rules_hash: &str) -> Self {
        if let Some(reason) = self.phase(rules_hash).restart_reason() {
            tracing::info!("{reason}");
            self.since = None;
            self.rules_hash = Some(rules_hash.to_string());
        }
        self
    }

    /// Move the cursor to the server's watermark; no watermark keeps the old one.
    pub fn advance(&mut self, watermark: Option<String>) {
        if let Some(watermark) = watermark {
            self.since = Some(watermark);
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
