//! CSV export for Anki's text importer.
//!
//! Basic cards export as `Front,Back,Tags`, cloze cards as `Text,Tags`.
//! Fields are quoted when needed, with internal quotes doubled, and tags
//! are joined with spaces the way Anki's importer expects them.
//!
//! # Example
//!
//! ```
//! use deckmend_builder::CsvExporter;
//! use deckmend_engine::{Note, NoteSchema};
//!
//! let schema = NoteSchema::basic();
//! let notes = vec![
//!     Note::new("Neuro", &schema)
//!         .with_field("Front", "What is GABA?")
//!         .with_field("Back", "The main \"inhibitory\" neurotransmitter.")
//!         .with_tag("PSYC2240"),
//! ];
//!
//! let csv = CsvExporter::new().export_basic(&notes, &schema).unwrap();
//! assert_eq!(
//!     csv,
//!     "Front,Back,Tags\nWhat is GABA?,\"The main \"\"inhibitory\"\" neurotransmitter.\",PSYC2240\n"
//! );
//! ```

use deckmend_engine::text::question_subject;
use deckmend_engine::{FieldRole, Note, NoteSchema};
use tracing::debug;

use crate::cloze::{cloze_from_definition, validate_cloze};
use crate::error::{Error, Result};

/// Tag added to every exported cloze row.
pub const CLOZE_TAG: &str = "cloze";

/// Writes notes as CSV text.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    cloze_tag: Option<String>,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self {
            cloze_tag: Some(CLOZE_TAG.to_string()),
        }
    }

    /// Use a different tag for cloze rows, or none.
    pub fn with_cloze_tag(mut self, tag: Option<&str>) -> Self {
        self.cloze_tag = tag.map(str::to_string);
        self
    }

    /// One `Front,Back,Tags` row per note.
    pub fn export_basic(&self, notes: &[Note], schema: &NoteSchema) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Front", "Back", "Tags"])?;
        for note in notes {
            writer.write_record([
                note.question(schema),
                note.answer(schema),
                note.tags.join(" ").as_str(),
            ])?;
        }
        finish(writer)
    }

    /// One `Text,Tags` row per note that yields a valid cloze.
    ///
    /// Notes of a cloze note type export their `Text` field as is. Other notes
    /// become clozes by hiding the subject of a "What is X?" question inside
    /// the answer. Notes with no usable cloze are skipped.
    pub fn export_cloze(&self, notes: &[Note], schema: &NoteSchema) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Text", "Tags"])?;
        for note in notes {
            let Some(text) = cloze_text(note, schema) else {
                debug!(question = note.question(schema), "no cloze for note");
                continue;
            };
            if let Err(issue) = validate_cloze(&text) {
                debug!(text = %text, issue = %issue, "skipping invalid cloze");
                continue;
            }
            let mut tags = note.tags.clone();
            if let Some(tag) = &self.cloze_tag {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
            writer.write_record([text.as_str(), tags.join(" ").as_str()])?;
        }
        finish(writer)
    }
}

fn cloze_text(note: &Note, schema: &NoteSchema) -> Option<String> {
    if schema.field(FieldRole::Text).is_some() {
        let text = note.role(schema, FieldRole::Text);
        return (!text.is_empty()).then(|| text.to_string());
    }
    let subject = question_subject(note.question(schema))?;
    let term = ["the ", "a ", "an "]
        .iter()
        .find_map(|article| {
            subject
                .get(..article.len())
                .filter(|head| head.eq_ignore_ascii_case(article))
                .map(|_| &subject[article.len()..])
        })
        .unwrap_or(subject);
    cloze_from_definition(term, note.answer(schema))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(question: &str, answer: &str) -> Note {
        Note::new("Neuro", &NoteSchema::basic())
            .with_field("Front", question)
            .with_field("Back", answer)
            .with_tag("PSYC2240")
            .with_tag("high-priority")
    }

    #[test]
    fn test_export_basic_three_notes() {
        let schema = NoteSchema::basic();
        let notes = vec![
            basic("What is the thalamus?", "A relay station for sensory signals."),
            basic("What is myelin?", "A fatty sheath, \"insulation\", around axons."),
            basic("Define soma.", "The cell body of a neuron."),
        ];
        let csv = CsvExporter::new().export_basic(&notes, &schema).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Front,Back,Tags");
        assert_eq!(
            lines[1],
            "What is the thalamus?,A relay station for sensory signals.,PSYC2240 high-priority"
        );
        assert_eq!(
            lines[2],
            "What is myelin?,\"A fatty sheath, \"\"insulation\"\", around axons.\",PSYC2240 high-priority"
        );
    }

    #[test]
    fn test_export_basic_uses_schema_roles() {
        let schema = NoteSchema::memory_optimized("PSYC 2240");
        let note = Note::new("Neuro", &schema)
            .with_field("Question", "What is GABA?")
            .with_field("Answer", "An inhibitory neurotransmitter.");
        let csv = CsvExporter::new().export_basic(&[note], &schema).unwrap();
        assert!(csv.ends_with("What is GABA?,An inhibitory neurotransmitter.,\n"));
    }

    #[test]
    fn test_export_cloze_from_definitions() {
        let schema = NoteSchema::basic();
        let notes = vec![
            basic(
                "What is the cerebellum?",
                "The cerebellum coordinates movement and motor learning in the brain.",
            ),
            basic("What is myelin?", "A fatty sheath."),
            basic("How do synapses work?", "Signals cross the synaptic cleft by chemical transmission."),
        ];
        let csv = CsvExporter::new().export_cloze(&notes, &schema).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Text,Tags");
        assert_eq!(
            lines[1],
            "The {{c1::cerebellum}} coordinates movement and motor learning in the brain.,PSYC2240 high-priority cloze"
        );
    }

    #[test]
    fn test_export_cloze_note_type_passes_text_through() {
        let schema = NoteSchema::cloze();
        let notes = vec![
            Note::new("Neuro", &schema).with_field("Text", "The {{c1::pons}} relays signals."),
            Note::new("Neuro", &schema).with_field("Text", "No deletion here."),
        ];
        let csv = CsvExporter::new()
            .with_cloze_tag(None)
            .export_cloze(&notes, &schema)
            .unwrap();
        assert_eq!(csv, "Text,Tags\nThe {{c1::pons}} relays signals.,\n");
    }
}
