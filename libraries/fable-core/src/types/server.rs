/// Server identity and settings
use super::now_ms;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server identity plus admin-configured settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Stable server identifier, generated once at first boot
    pub server_id: String,

    /// Human-readable server name
    pub server_name: String,

    /// Flat key/value settings map
    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    pub updated_at: i64,
}

impl ServerSettings {
    /// Create a fresh identity with a generated server ID
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_id: uuid::Uuid::new_v4().to_string(),
            server_name: server_name.into(),
            settings: BTreeMap::new(),
            updated_at: now_ms(),
        }
    }
}
