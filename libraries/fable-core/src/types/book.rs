/// Book (library item) domain type
use super::{now_ms, BookId, LibraryEntity};
use serde::{Deserialize, Serialize};

/// One audiobook in a library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Unique book identifier
    pub id: BookId,

    /// Library this book belongs to
    pub library_id: String,

    /// Title
    pub title: String,

    /// Subtitle, if any
    pub subtitle: Option<String>,

    /// Contributor IDs credited as authors
    pub author_ids: Vec<String>,

    /// Contributor IDs credited as narrators
    pub narrator_ids: Vec<String>,

    /// Series this book belongs to, with its position in the series
    pub series_id: Option<String>,
    pub series_sequence: Option<f64>,

    /// Filesystem path of the book's folder
    pub path: String,

    /// External catalog identifier (ASIN/ISBN-equivalent)
    pub external_id: Option<String>,

    /// Total duration of the audio in milliseconds
    pub duration_ms: i64,

    /// Relative path of the cover image inside the assets root
    pub cover_path: Option<String>,

    /// Year of publication
    pub published_year: Option<i32>,

    /// Creation timestamp (unix ms)
    pub created_at: i64,

    /// Last modification timestamp (unix ms)
    pub updated_at: i64,

    /// Soft-delete timestamp
    pub deleted_at: Option<i64>,
}

impl Book {
    /// Create a new book with a generated ID
    pub fn new(library_id: impl Into<String>, title: impl Into<String>, path: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: BookId::generate(),
            library_id: library_id.into(),
            title: title.into(),
            subtitle: None,
            author_ids: Vec::new(),
            narrator_ids: Vec::new(),
            series_id: None,
            series_sequence: None,
            path: path.into(),
            external_id: None,
            duration_ms: 0,
            cover_path: None,
            published_year: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl LibraryEntity for Book {
    const COLLECTION: &'static str = "books";

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
