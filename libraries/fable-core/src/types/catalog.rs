/// Catalog taxonomy types: libraries, contributors, series, tags, genres
use super::{now_ms, LibraryEntity};
use serde::{Deserialize, Serialize};

/// A library: one root folder of audiobooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    pub name: String,
    pub root_path: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LibraryEntity for Library {
    const COLLECTION: &'static str = "libraries";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Role a contributor plays on a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributorRole {
    Author,
    Narrator,
}

/// An author or narrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
    pub role: ContributorRole,
    /// External catalog identifier for the person, if known
    pub external_id: Option<String>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Contributor {
    pub fn new(name: impl Into<String>, role: ContributorRole) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            sort_name: None,
            role,
            external_id: None,
            updated_at: now_ms(),
            deleted_at: None,
        }
    }
}

impl LibraryEntity for Contributor {
    const COLLECTION: &'static str = "contributors";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A book series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub name: String,
    pub contributor_ids: Vec<String>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl LibraryEntity for Series {
    const COLLECTION: &'static str = "series";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A free-form tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub updated_at: i64,
}

impl LibraryEntity for Tag {
    const COLLECTION: &'static str = "tags";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Genre taxonomy node. The taxonomy is a tree and is exported as a single
/// `genres.json` document rather than a JSONL stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Genre>,
}

impl Genre {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Total number of nodes in this subtree, including self
    pub fn node_count(&self) -> u64 {
        1 + self.children.iter().map(Genre::node_count).sum::<u64>()
    }
}
