//! Note type descriptors.
//!
//! A [`NoteSchema`] says which field of a note type plays which role, so the
//! rest of the pipeline asks for "the question" instead of guessing between
//! `Front` and `Question` on every note.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The part a field plays in a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Question,
    Answer,
    Priority,
    Source,
    Chapter,
    Clinical,
    Text,
}

const QUESTION_ALIASES: &[&str] = &["Question", "Front", "Text"];
const ANSWER_ALIASES: &[&str] = &["Answer", "Back", "Extra"];
const EXACT_ROLES: &[(FieldRole, &str)] = &[
    (FieldRole::Priority, "Priority"),
    (FieldRole::Source, "Source"),
    (FieldRole::Chapter, "Chapter"),
    (FieldRole::Clinical, "Clinical"),
    (FieldRole::Text, "Text"),
];

/// Field layout and role assignment for one note type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSchema {
    /// The note type name.
    pub model: String,
    /// Field names in the note type's order.
    pub fields: Vec<String>,
    /// Role assignments; a field may hold more than one role.
    pub roles: Vec<(FieldRole, String)>,
}

impl NoteSchema {
    /// Resolve roles for a note type from its field names.
    ///
    /// Question and answer roles take the first field matching their alias
    /// lists (case-insensitive); the remaining roles need an exact name.
    /// Fails with [`Error::MissingField`] when no question or answer field exists.
    pub fn resolve(model: impl Into<String>, field_names: &[String]) -> Result<Self> {
        let model = model.into();
        let find = |alias: &str| {
            field_names
                .iter()
                .find(|name| name.eq_ignore_ascii_case(alias))
                .cloned()
        };

        let mut roles = Vec::new();
        for (role, aliases) in [
            (FieldRole::Question, QUESTION_ALIASES),
            (FieldRole::Answer, ANSWER_ALIASES),
        ] {
            let name = aliases
                .iter()
                .find_map(|alias| find(alias))
                .ok_or_else(|| Error::MissingField {
                    model: model.clone(),
                    field: format!("{:?}", role).to_lowercase(),
                })?;
            roles.push((role, name));
        }
        for (role, name) in EXACT_ROLES {
            if let Some(found) = find(name) {
                roles.push((*role, found));
            }
        }

        Ok(Self {
            model,
            fields: field_names.to_vec(),
            roles,
        })
    }

    /// The stock `Basic` note type (`Front`, `Back`).
    pub fn basic() -> Self {
        Self::builtin("Basic", &["Front", "Back"])
    }

    /// The course note type with priority, source, chapter, and clinical fields.
    pub fn memory_optimized(model: impl Into<String>) -> Self {
        Self::builtin(
            model,
            &["Question", "Answer", "Priority", "Source", "Chapter", "Clinical"],
        )
    }

    /// The stock `Cloze` note type (`Text`, `Extra`).
    pub fn cloze() -> Self {
        Self::builtin("Cloze", &["Text", "Extra"])
    }

    fn builtin(model: impl Into<String>, fields: &[&str]) -> Self {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        // Built-in layouts always carry a question and an answer alias.
        match Self::resolve(model, &fields) {
            Ok(schema) => schema,
            Err(_) => unreachable!("built-in schema lacks question or answer"),
        }
    }

    /// The field holding `role`, if the note type has one.
    pub fn field(&self, role: FieldRole) -> Option<&str> {
        self.roles
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, name)| name.as_str())
    }

    /// The question field name.
    pub fn question_field(&self) -> &str {
        self.field(FieldRole::Question).unwrap_or_default()
    }

    /// The answer field name.
    pub fn answer_field(&self) -> &str {
        self.field(FieldRole::Answer).unwrap_or_default()
    }

    /// Whether cards come from cloze deletions in a `Text` field.
    ///
    /// The answer field of such a type (usually `Extra`) is optional notes,
    /// not an answer the card depends on.
    pub fn is_cloze(&self) -> bool {
        self.field(FieldRole::Text).is_some()
    }
}
