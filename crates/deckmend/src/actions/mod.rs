//! AnkiConnect action groups.
//!
//! Each group borrows the client and exposes one method per action.

mod decks;
mod misc;
mod models;
mod notes;

pub use decks::DeckActions;
pub use misc::MiscActions;
pub use models::ModelActions;
pub use notes::NoteActions;
