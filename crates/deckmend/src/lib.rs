//! Async client for the AnkiConnect actions that deckmend's repair and
//! import workflows rely on.
//!
//! AnkiConnect speaks a small JSON envelope over local HTTP:
//! `{"action": ..., "version": 6, "params": {...}}`, answered by
//! `{"result": ..., "error": ...}`. This crate wraps the note, deck and
//! note-type actions behind typed methods.
//!
//! # Quick Start
//!
//! ```no_run
//! use deckmend::AnkiClient;
//!
//! # async fn example() -> deckmend::Result<()> {
//! // Create a client with default settings (127.0.0.1:8765)
//! let client = AnkiClient::new();
//!
//! // Check that AnkiConnect is running
//! let version = client.misc().version().await?;
//! println!("AnkiConnect version: {}", version);
//!
//! // Find notes in a course deck
//! let ids = client.notes().find("deck:\"PSYC 2240*\"").await?;
//! println!("{} notes", ids.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Client Configuration
//!
//! ```no_run
//! use std::time::Duration;
//! use deckmend::AnkiClient;
//!
//! let client = AnkiClient::builder()
//!     .url("http://localhost:8765")
//!     .api_key("your-api-key")
//!     .timeout(Duration::from_secs(10))
//!     .build();
//! ```
//!
//! # Action Groups
//!
//! - [`AnkiClient::notes()`] - Add, find, inspect, update, and delete notes
//! - [`AnkiClient::decks()`] - List and create decks
//! - [`AnkiClient::models()`] - Note type names and field names
//! - [`AnkiClient::misc()`] - AnkiConnect version
//!
//! # Requirements
//!
//! - Anki must be running with the AnkiConnect add-on installed
//! - By default, the client connects to `http://127.0.0.1:8765`

pub mod actions;
pub mod client;
pub mod error;
mod request;
pub mod types;

pub use client::{AnkiClient, ClientBuilder};
pub use error::{Error, Result};
pub use types::{DuplicateScope, Note, NoteBuilder, NoteField, NoteInfo, NoteOptions};
