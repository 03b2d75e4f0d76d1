/// Core error types for Fable
use thiserror::Error;

/// Result type alias using `FableError`
pub type Result<T> = std::result::Result<T, FableError>;

/// Core error type for Fable.
///
/// This is the error contract of the store traits: the engine ships only an
/// in-memory reference store, so most variants exist for external backend
/// implementations to construct.
#[derive(Error, Debug)]
pub enum FableError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
