//! Error types for deckmend-engine.
//!
//! Errors from engine workflows fall into two categories:
//!
//! 1. **Client errors**: Wrapped from the underlying [`deckmend::Error`] type
//! 2. **Pipeline errors**: Configuration, schema, and source problems
//!
//! Per-note problems never surface here. Batch workflows record them in
//! their reports ([`RepairReport::failures`](crate::repair::RepairReport),
//! [`ExtractStats::rejected`](crate::extract::ExtractStats)) and carry on.
//!
//! # Example
//!
//! ```no_run
//! use deckmend_engine::{AnkiStore, Error, Normalizer, RepairEngine};
//!
//! # async fn example() {
//! let store = AnkiStore::new(deckmend::AnkiClient::new());
//! let engine = RepairEngine::new(&store, Normalizer::default());
//!
//! match engine.repair("deck:\"PSYC 2240\"").await {
//!     Ok(report) => println!("repaired {}", report.repaired),
//!     Err(Error::Client(deckmend::Error::ConnectionRefused)) => {
//!         eprintln!("Is Anki running?");
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

/// Result type for deckmend-engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during engine operations.
#[derive(Debug)]
pub enum Error {
    /// An error from the underlying AnkiConnect client.
    Client(deckmend::Error),

    /// A source file could not be read at all.
    SourceUnreadable {
        /// The file path.
        path: PathBuf,
        /// Why it could not be read.
        reason: String,
    },

    /// A note type lacks a field the pipeline needs.
    MissingField {
        /// The model name.
        model: String,
        /// The missing field role or name.
        field: String,
    },

    /// A validation error occurred.
    Validation(String),

    /// The configuration file is malformed.
    Config(String),

    /// An I/O error occurred.
    Io(std::io::Error),

    /// A JSON document could not be read or written.
    Json(serde_json::Error),

    /// A note store failed for a reason other than the AnkiConnect client.
    Store(String),

    /// A review spreadsheet could not be read or written.
    Csv(csv::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Client(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Client(e) => write!(f, "{}", e),
            Error::SourceUnreadable { path, reason } => {
                write!(f, "cannot read source {}: {}", path.display(), reason)
            }
            Error::MissingField { model, field } => {
                write!(f, "missing field '{}' for model '{}'", field, model)
            }
            Error::Validation(msg) => write!(f, "validation error: {}", msg),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Store(msg) => write!(f, "store error: {}", msg),
            Error::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl Error {
    /// Whether a retry of the same store call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Client(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<deckmend::Error> for Error {
    fn from(err: deckmend::Error) -> Self {
        Error::Client(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
