//! Note-related AnkiConnect actions.
//!
//! # Example
//!
//! ```no_run
//! use deckmend::{AnkiClient, NoteBuilder};
//!
//! # async fn example() -> deckmend::Result<()> {
//! let client = AnkiClient::new();
//!
//! let note = NoteBuilder::new("PSYC 2240", "Basic")
//!     .field("Front", "What is the cerebellum?")
//!     .field("Back", "The hindbrain structure that coordinates fine motor movement.")
//!     .tag("PSYC2240")
//!     .build();
//!
//! let note_id = client.notes().add(&note).await?;
//! let found = client.notes().find("deck:\"PSYC 2240\"").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use serde::Serialize;

use crate::client::AnkiClient;
use crate::error::Result;
use crate::types::{Note, NoteInfo};

/// Provides access to note-related AnkiConnect operations.
///
/// Obtained via [`AnkiClient::notes()`].
#[derive(Debug)]
pub struct NoteActions<'a> {
    pub(crate) client: &'a AnkiClient,
}

#[derive(Serialize)]
struct AddNoteParams<'a> {
    note: &'a Note,
}

#[derive(Serialize)]
struct FindNotesParams<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct NoteIdsParams<'a> {
    notes: &'a [i64],
}

#[derive(Serialize)]
struct UpdateNoteFieldsParams<'a> {
    note: UpdateNoteFieldsInner<'a>,
}

#[derive(Serialize)]
struct UpdateNoteFieldsInner<'a> {
    id: i64,
    fields: &'a HashMap<String, String>,
}

impl<'a> NoteActions<'a> {
    /// Add a new note, returning its ID.
    ///
    /// AnkiConnect rejects duplicates unless the note allows them
    /// (see [`NoteBuilder::allow_duplicate`](crate::NoteBuilder::allow_duplicate)).
    pub async fn add(&self, note: &Note) -> Result<i64> {
        self.client.invoke("addNote", AddNoteParams { note }).await
    }

    /// Find notes matching an Anki search query.
    ///
    /// Returns note IDs; use [`info()`](Self::info) for contents.
    pub async fn find(&self, query: &str) -> Result<Vec<i64>> {
        self.client
            .invoke("findNotes", FindNotesParams { query })
            .await
    }

    /// Fetch field values, tags, and note type for the given notes.
    pub async fn info(&self, note_ids: &[i64]) -> Result<Vec<NoteInfo>> {
        self.client
            .invoke("notesInfo", NoteIdsParams { notes: note_ids })
            .await
    }

    /// Replace the values of the named fields.
    ///
    /// If the note is open in Anki's browser the change may not persist.
    pub async fn update_fields(
        &self,
        note_id: i64,
        fields: &HashMap<String, String>,
    ) -> Result<()> {
        self.client
            .invoke_void(
                "updateNoteFields",
                UpdateNoteFieldsParams {
                    note: UpdateNoteFieldsInner {
                        id: note_id,
                        fields,
                    },
                },
            )
            .await
    }

    /// Delete notes and every card generated from them.
    pub async fn delete(&self, note_ids: &[i64]) -> Result<()> {
        self.client
            .invoke_void("deleteNotes", NoteIdsParams { notes: note_ids })
            .await
    }
}
