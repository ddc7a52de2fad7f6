//! Types exchanged with AnkiConnect.

mod note;

pub use note::{DuplicateScope, Note, NoteBuilder, NoteField, NoteInfo, NoteOptions};
