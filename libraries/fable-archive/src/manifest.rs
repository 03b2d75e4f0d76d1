//! Archive manifest

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manifest describing an archive's contents.
///
/// Written last during export so the declared counts reflect what was
/// actually streamed. Declared counts and feature flags must match the
/// archive body; `BackupManager::validate` checks this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version; must equal [`crate::FORMAT_VERSION`] exactly
    pub version: String,

    /// Creation time, RFC 3339
    pub created_at: String,

    /// Identity of the exporting server
    pub server_id: String,
    pub server_name: String,

    /// Record count per stream
    pub counts: BTreeMap<String, u64>,

    /// Whether binary image assets are included
    pub includes_images: bool,

    /// Whether the listening history (events + sessions) is included
    pub includes_events: bool,

    /// Whether server identity/settings are included
    pub includes_settings: bool,
}

impl Manifest {
    /// Count for one stream, zero when the stream was not exported
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}
