//! Foreign backup model
//!
//! The shape of a migration-source export, loaded from a JSON file handle.
//! Positions and durations are seconds (`f64`) in the foreign system;
//! conversion to native milliseconds happens in the orchestrator.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Everything extractable from a foreign system's backup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForeignBackup {
    #[serde(default)]
    pub users: Vec<ForeignUser>,
    #[serde(default)]
    pub books: Vec<ForeignBook>,
    #[serde(default)]
    pub sessions: Vec<ForeignSession>,
    #[serde(default)]
    pub progress: Vec<ForeignProgress>,
}

impl ForeignBackup {
    /// Load a foreign backup from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// A foreign user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A foreign catalog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignBook {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub narrators: Vec<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// ASIN/ISBN-equivalent catalog identifier
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub duration_sec: f64,
}

/// One foreign listening session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignSession {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_sec: f64,
    #[serde(default)]
    pub playback_rate: Option<f64>,
    /// Wall-clock start (unix ms)
    pub started_at: i64,
    /// Last update; treated as the wall-clock end of the span (unix ms)
    pub updated_at: i64,
}

/// A foreign progress snapshot, for items that have no session history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignProgress {
    pub user_id: String,
    pub book_id: String,
    pub position_sec: f64,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub finished_at: Option<i64>,
    pub updated_at: i64,
}
