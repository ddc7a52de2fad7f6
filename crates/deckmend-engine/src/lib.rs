//! Flashcard extraction and repair pipeline for Anki.
//!
//! This crate sits on top of the [`deckmend`] AnkiConnect client and runs
//! course material through three stages:
//!
//! 1. [`source`] reads PDF, DOCX, and transcript files into normalized text.
//! 2. [`extract`] pulls learning objectives and definitions out of that text
//!    as scored, deduplicated [`CandidatePair`]s; [`cards`] turns them into notes.
//! 3. [`normalize`] detects and repairs card defects, and [`repair`] runs it
//!    over a [`NoteStore`] with batching, retries, and idempotent upserts.
//!
//! [`review`] round-trips notes through a spreadsheet for hand editing, and
//! [`transcript`] flags low-quality lecture transcripts.
//!
//! # Quick Start
//!
//! ```no_run
//! use deckmend_engine::{AnkiStore, Normalizer, RepairEngine};
//!
//! # async fn example() -> deckmend_engine::Result<()> {
//! let store = AnkiStore::new(deckmend_engine::AnkiClient::new());
//! let engine = RepairEngine::new(&store, Normalizer::default());
//!
//! let report = engine.repair("deck:\"PSYC 2240\"").await?;
//! println!("{} repaired, {} flagged", report.repaired, report.flagged);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `pdf` - PDF text extraction via `pdf-extract` (default)
//! - `docx` - DOCX text extraction via `zip` (default)
//!
//! Without them the matching formats read as [`SourceText::Unreadable`].

mod error;

pub mod analysis;
pub mod cards;
pub mod config;
pub mod defects;
pub mod extract;
pub mod markup;
pub mod normalize;
pub mod note;
pub mod repair;
pub mod review;
pub mod rules;
pub mod schema;
pub mod source;
pub mod store;
pub mod text;
pub mod transcript;

pub use analysis::AnalysisDocument;
pub use config::Config;
pub use defects::DefectTag;
pub use error::{Error, Result};
pub use extract::{CandidatePair, Extractor};
pub use normalize::{CardState, Normalized, Normalizer};
pub use note::{Fields, Note, Priority};
pub use repair::{RepairEngine, RepairReport, RetryPolicy};
pub use review::{ReviewReport, ReviewRow};
pub use schema::{FieldRole, NoteSchema};
pub use source::SourceText;
pub use store::{AnkiStore, MemoryStore, NoteStore, UpsertStatus};
pub use transcript::TranscriptStats;

// Re-export client types for convenience
pub use deckmend::{AnkiClient, ClientBuilder};
