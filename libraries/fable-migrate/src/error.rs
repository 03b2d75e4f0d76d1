use thiserror::Error;

/// Errors that abort a migration operation.
///
/// "No confident match" is never an error: it is the normal, expected outcome
/// requiring human input, and surfaces in the analysis report instead.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid foreign backup: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Core(#[from] fable_core::FableError),
}
