//! Error types for deckmend-builder.

use thiserror::Error;

/// Result type for deckmend-builder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while writing card packages.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A note lacks a field its note type requires.
    #[error("missing required field '{field}' in model '{model}'")]
    MissingField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
    },

    /// SQLite error (apkg feature).
    #[cfg(feature = "apkg")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// ZIP error (apkg feature).
    #[cfg(feature = "apkg")]
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
