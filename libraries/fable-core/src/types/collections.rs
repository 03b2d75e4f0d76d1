/// User-facing grouping types: collections, shelves, activities, profiles
use super::LibraryEntity;
use serde::{Deserialize, Serialize};

/// Extra data carried by an entity.
///
/// Either a shape this version of the engine understands, or opaque JSON
/// preserved byte-for-byte for round-trip. Never an untyped map accessed by
/// convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Key/value pairs with string values, the shape current clients write
    Known(std::collections::BTreeMap<String, String>),
    /// Anything else, preserved as-is
    Opaque(serde_json::Value),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Known(std::collections::BTreeMap::new())
    }
}

/// A curated, ordered set of books
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub library_id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub book_ids: Vec<String>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl LibraryEntity for Collection {
    const COLLECTION: &'static str = "collections";

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

/// A grant of a collection to another user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionShare {
    pub id: String,
    pub collection_id: String,
    pub user_id: String,
    pub updated_at: i64,
}

impl LibraryEntity for CollectionShare {
    const COLLECTION: &'static str = "collection_shares";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// A personal shelf (per-user book list)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub book_ids: Vec<String>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl LibraryEntity for Shelf {
    const COLLECTION: &'static str = "shelves";

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

/// One feed entry (rating, review, status change)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub book_id: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub payload: Payload,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LibraryEntity for Activity {
    const COLLECTION: &'static str = "activities";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Per-user preferences and client state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub settings: Payload,
    pub updated_at: i64,
}

impl LibraryEntity for Profile {
    const COLLECTION: &'static str = "profiles";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}
