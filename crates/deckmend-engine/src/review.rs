//! Spreadsheet review round-trip.
//!
//! [`RepairEngine::review_export`] writes one row per note with markup-free
//! question and answer text and the defects still present. A reviewer edits
//! the `Question` and `Answer` columns in any spreadsheet program, and
//! [`RepairEngine::apply_review`] writes the edits back by note ID.
//!
//! ```text
//! Note_ID,Model,Question,Answer,Issues
//! 1712345,Basic,What is GABA?,Needs review,placeholder_text
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::defects::DefectTag;
use crate::error::{Error, Result};
use crate::markup::strip_markup;
use crate::note::Note;
use crate::repair::{FlaggedNote, ItemFailure, ProblemItem, RepairEngine};
use crate::schema::{FieldRole, NoteSchema};
use crate::store::NoteStore;

const HEADER: [&str; 5] = ["Note_ID", "Model", "Question", "Answer", "Issues"];

/// One spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRow {
    #[serde(rename = "Note_ID")]
    pub note_id: i64,
    #[serde(rename = "Model", default)]
    pub model: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer", default)]
    pub answer: String,
    /// Defect tags joined with `"; "`. Informational; ignored on import.
    #[serde(rename = "Issues", default)]
    pub issues: String,
}

impl ReviewRow {
    pub fn new(note_id: i64, note: &Note, schema: &NoteSchema, issues: &[DefectTag]) -> Self {
        Self {
            note_id,
            model: note.model.clone(),
            question: strip_markup(note.question(schema)),
            answer: strip_markup(note.answer(schema)),
            issues: issue_list(issues),
        }
    }

    /// `note` with this row's question and answer in place.
    ///
    /// An empty question is rejected, and so is an empty answer unless the
    /// note type is cloze, whose `Extra` field is optional.
    pub fn apply_to(&self, note: &Note, schema: &NoteSchema) -> Result<Note> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(Error::Validation(format!("note {}: empty question", self.note_id)));
        }
        let answer = self.answer.trim();
        if answer.is_empty() && !schema.is_cloze() {
            return Err(Error::Validation(format!("note {}: empty answer", self.note_id)));
        }
        let mut edited = note.clone();
        edited.set_role(schema, FieldRole::Question, question);
        edited.set_role(schema, FieldRole::Answer, answer);
        Ok(edited)
    }
}

/// Defect tags as a `"; "`-separated list.
pub fn issue_list(tags: &[DefectTag]) -> String {
    tags.iter()
        .map(|tag| tag.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Rows as CSV text. The header is written even when there are no rows.
pub fn write_rows(rows: &[ReviewRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse CSV text saved by a spreadsheet program.
///
/// A leading byte-order mark is skipped and cells are trimmed. Columns are
/// matched by header name, so extra or reordered columns are fine.
pub fn read_rows(text: &str) -> Result<Vec<ReviewRow>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<ReviewRow>, _>>()
        .map_err(Error::from)
}

/// Rows from [`RepairEngine::review_export`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewExport {
    pub rows: Vec<ReviewRow>,
    /// Notes that could not be read.
    pub failures: Vec<ItemFailure>,
}

/// Report from [`RepairEngine::apply_review`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewReport {
    /// Rows read; each one counts once as updated, unchanged, or failed.
    pub rows: usize,
    /// Notes written (or that would be, in a dry run).
    pub updated: usize,
    /// Rows identical to the stored note.
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    /// Updated notes that still have defects after the edit.
    pub flagged_notes: Vec<FlaggedNote>,
}

impl ReviewReport {
    pub fn samples(&self, n: usize) -> Vec<ProblemItem<'_>> {
        self.failures
            .iter()
            .map(ProblemItem::Failed)
            .chain(self.flagged_notes.iter().map(ProblemItem::Flagged))
            .take(n)
            .collect()
    }

    fn fail(&mut self, note_id: i64, error: &Error) {
        warn!(note_id, error = %error, "review row failed");
        self.failed += 1;
        self.failures.push(ItemFailure {
            note_id: Some(note_id),
            error: error.to_string(),
        });
    }
}

impl<S: NoteStore> RepairEngine<'_, S> {
    /// One review row per note matching `query`, with its current defects.
    pub async fn review_export(&self, query: &str) -> Result<ReviewExport> {
        let ids = self.retry.run(|| self.store.find(query)).await?;
        let mut export = ReviewExport::default();
        let mut schemas = HashMap::new();

        for chunk in ids.chunks(self.batch_size) {
            let notes = match self.retry.run(|| self.store.fetch(chunk)).await {
                Ok(notes) => notes,
                Err(e) => {
                    for id in chunk {
                        export.failures.push(ItemFailure {
                            note_id: Some(*id),
                            error: e.to_string(),
                        });
                    }
                    continue;
                }
            };
            for note in notes {
                let Some(note_id) = note.id else { continue };
                let schema = match self.schema_for(&note.model, &mut schemas).await {
                    Ok(schema) => schema,
                    Err(e) => {
                        export.failures.push(ItemFailure {
                            note_id: Some(note_id),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };
                let issues = self.normalizer.inspect(&note, &schema);
                export.rows.push(ReviewRow::new(note_id, &note, &schema, &issues));
            }
        }

        info!(query, rows = export.rows.len(), failed = export.failures.len(), "review export finished");
        Ok(export)
    }

    /// Write reviewed question and answer text back to the store.
    pub async fn apply_review(&self, rows: &[ReviewRow]) -> ReviewReport {
        let mut report = ReviewReport {
            rows: rows.len(),
            ..Default::default()
        };
        info!(rows = rows.len(), dry_run = self.dry_run, "applying review");
        let mut schemas = HashMap::new();

        for chunk in rows.chunks(self.batch_size) {
            let ids: Vec<i64> = chunk.iter().map(|row| row.note_id).collect();
            let stored: HashMap<i64, Note> = match self.retry.run(|| self.store.fetch(&ids)).await {
                Ok(notes) => notes
                    .into_iter()
                    .filter_map(|note| note.id.map(|id| (id, note)))
                    .collect(),
                Err(e) => {
                    for row in chunk {
                        report.fail(row.note_id, &e);
                    }
                    continue;
                }
            };

            for row in chunk {
                let Some(note) = stored.get(&row.note_id) else {
                    report.fail(row.note_id, &Error::Store(format!("note {} not found", row.note_id)));
                    continue;
                };
                let schema = match self.schema_for(&note.model, &mut schemas).await {
                    Ok(schema) => schema,
                    Err(e) => {
                        report.fail(row.note_id, &e);
                        continue;
                    }
                };
                let edited = match row.apply_to(note, &schema) {
                    Ok(edited) => edited,
                    Err(e) => {
                        report.fail(row.note_id, &e);
                        continue;
                    }
                };
                if edited == *note {
                    report.unchanged += 1;
                    continue;
                }
                if !self.dry_run {
                    if let Err(e) = self.retry.run(|| self.store.update(&edited)).await {
                        report.fail(row.note_id, &e);
                        continue;
                    }
                }
                report.updated += 1;

                let remaining = self.normalizer.inspect(&edited, &schema);
                if !remaining.is_empty() {
                    report.flagged_notes.push(FlaggedNote {
                        note_id: Some(row.note_id),
                        question: edited.question(&schema).to_string(),
                        unrepaired: remaining,
                    });
                }
            }
        }

        info!(
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            flagged = report.flagged_notes.len(),
            "review applied"
        );
        report
    }
}
