//! Package writers for deckmend flashcards.
//!
//! Turns [`deckmend_engine::Note`]s into files Anki can import without a
//! running AnkiConnect:
//!
//! - [`CsvExporter`] writes `Front,Back,Tags` and cloze `Text,Tags` CSV.
//! - [`ApkgWriter`] writes an `.apkg` package for one deck and note type.
//! - [`cloze`] turns definition cards into cloze deletions and validates them.
//!
//! # Quick Start
//!
//! ```no_run
//! use deckmend_builder::{ApkgWriter, CsvExporter};
//! use deckmend_engine::AnalysisDocument;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let analysis = AnalysisDocument::read_from("analysis.json")?;
//! let schema = deckmend_engine::NoteSchema::memory_optimized("PSYC 2240");
//!
//! let csv = CsvExporter::new().export_basic(&analysis.candidate_cards, &schema)?;
//! std::fs::write("psyc2240.csv", csv)?;
//!
//! ApkgWriter::new("PSYC 2240", &schema).write(&analysis.candidate_cards, "psyc2240.apkg")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `apkg` - `.apkg` generation via SQLite and ZIP (default)

pub mod cloze;
pub mod error;

mod export;

#[cfg(feature = "apkg")]
mod sql;

#[cfg(feature = "apkg")]
mod apkg;

pub use error::{Error, Result};
pub use export::{CLOZE_TAG, CsvExporter};

#[cfg(feature = "apkg")]
pub use apkg::ApkgWriter;
