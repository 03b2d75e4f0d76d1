/// User domain type
use super::{now_ms, LibraryEntity, UserId};
use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: UserId,

    /// Login / contact email, unique per server
    pub email: String,

    /// Display name shown in clients
    pub display_name: String,

    /// Whether this is the root (admin) account
    pub is_root: bool,

    /// Relative path of the avatar image inside the assets root
    pub avatar_path: Option<String>,

    /// Account creation timestamp (unix ms)
    pub created_at: i64,

    /// Last modification timestamp (unix ms)
    pub updated_at: i64,

    /// Soft-delete timestamp; `Some` means the account is a tombstone
    pub deleted_at: Option<i64>,
}

impl User {
    /// Create a new user with a generated ID
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: UserId::generate(),
            email: email.into(),
            display_name: display_name.into(),
            is_root: false,
            avatar_path: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl LibraryEntity for User {
    const COLLECTION: &'static str = "users";

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
