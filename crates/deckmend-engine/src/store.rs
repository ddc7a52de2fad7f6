//! Note storage backends.
//!
//! [`NoteStore`] is the seam between the pipeline and wherever notes live.
//! [`AnkiStore`] talks to a running Anki through AnkiConnect;
//! [`MemoryStore`] keeps notes in process for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use deckmend::{AnkiClient, NoteBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::note::{Fields, Note};

/// Where notes are found, read, and written.
pub trait NoteStore: Sync {
    /// Ids of notes matching `query`.
    fn find(&self, query: &str) -> impl Future<Output = Result<Vec<i64>>> + Send;

    /// Notes for `ids`. Unknown ids are skipped.
    fn fetch(&self, ids: &[i64]) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// Create a note and return its id.
    fn create(&self, note: &Note) -> impl Future<Output = Result<i64>> + Send;

    /// Replace every field of an existing note.
    fn update(&self, note: &Note) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, ids: &[i64]) -> impl Future<Output = Result<()>> + Send;

    fn deck_names(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Field names of a note type, in order.
    fn field_names(&self, model: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Outcome of [`upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Created(i64),
    Updated(i64),
}

impl UpsertStatus {
    pub fn id(self) -> i64 {
        match self {
            UpsertStatus::Created(id) | UpsertStatus::Updated(id) => id,
        }
    }
}

/// Create `note` if it has no id, otherwise replace its fields.
pub async fn upsert<S: NoteStore>(store: &S, note: &Note) -> Result<UpsertStatus> {
    match note.id {
        Some(id) => {
            store.update(note).await?;
            Ok(UpsertStatus::Updated(id))
        }
        None => Ok(UpsertStatus::Created(store.create(note).await?)),
    }
}

/// [`NoteStore`] backed by AnkiConnect.
///
/// Per-call timeouts come from the client; build it with
/// [`deckmend::ClientBuilder::timeout`].
#[derive(Debug, Clone)]
pub struct AnkiStore {
    client: AnkiClient,
}

impl AnkiStore {
    pub fn new(client: AnkiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AnkiClient {
        &self.client
    }
}

impl NoteStore for AnkiStore {
    async fn find(&self, query: &str) -> Result<Vec<i64>> {
        Ok(self.client.notes().find(query).await?)
    }

    async fn fetch(&self, ids: &[i64]) -> Result<Vec<Note>> {
        let infos = self.client.notes().info(ids).await?;
        Ok(infos
            .into_iter()
            .map(|info| {
                let fields: Fields = info.ordered_fields().into_iter().collect();
                Note {
                    id: Some(info.note_id),
                    deck: String::new(),
                    model: info.model_name,
                    fields,
                    tags: info.tags,
                }
            })
            .collect())
    }

    async fn create(&self, note: &Note) -> Result<i64> {
        let mut builder = NoteBuilder::new(&note.deck, &note.model).tags(note.tags.iter().cloned());
        for (name, value) in note.fields.iter() {
            builder = builder.field(name, value);
        }
        let id = self.client.notes().add(&builder.build()).await?;
        debug!(note_id = id, deck = %note.deck, "created note");
        Ok(id)
    }

    async fn update(&self, note: &Note) -> Result<()> {
        let id = note
            .id
            .ok_or_else(|| Error::Validation("cannot update a note without an id".to_string()))?;
        let fields: HashMap<String, String> = note
            .fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.client.notes().update_fields(id, &fields).await?;
        Ok(())
    }

    async fn delete(&self, ids: &[i64]) -> Result<()> {
        Ok(self.client.notes().delete(ids).await?)
    }

    async fn deck_names(&self) -> Result<Vec<String>> {
        Ok(self.client.decks().names().await?)
    }

    async fn field_names(&self, model: &str) -> Result<Vec<String>> {
        Ok(self.client.models().field_names(model).await?)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    notes: BTreeMap<i64, Note>,
    models: HashMap<String, Vec<String>>,
    decks: BTreeSet<String>,
    last_id: i64,
}

/// In-process [`NoteStore`].
///
/// Queries understand `*`, `deck:<name>` (also matching subdecks), and
/// otherwise a case-insensitive substring of any field.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a note type.
    pub fn with_model(self, model: impl Into<String>, fields: &[&str]) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .models
                .insert(model.into(), fields.iter().map(|f| f.to_string()).collect());
        }
        self
    }

    /// Insert a note directly, assigning an id.
    pub fn insert(&self, note: Note) -> Result<i64> {
        let mut inner = self.lock()?;
        Ok(inner.add(note))
    }

    pub fn get(&self, id: i64) -> Option<Note> {
        self.lock().ok()?.notes.get(&id).cloned()
    }

    /// Every stored note in id order.
    pub fn notes(&self) -> Vec<Note> {
        self.lock()
            .map(|inner| inner.notes.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.notes.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl MemoryInner {
    fn add(&mut self, mut note: Note) -> i64 {
        self.last_id += 1;
        let id = self.last_id;
        note.id = Some(id);
        self.models
            .entry(note.model.clone())
            .or_insert_with(|| note.fields.iter().map(|(name, _)| name.to_string()).collect());
        if !note.deck.is_empty() {
            self.decks.insert(note.deck.clone());
        }
        self.notes.insert(id, note);
        id
    }
}

fn matches_query(note: &Note, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() || query == "*" {
        return true;
    }
    if let Some(deck) = query.strip_prefix("deck:") {
        let deck = deck.trim_matches('"');
        return note.deck == deck || note.deck.starts_with(&format!("{}::", deck));
    }
    let needle = query.to_lowercase();
    note.fields
        .iter()
        .any(|(_, value)| value.to_lowercase().contains(&needle))
}

impl NoteStore for MemoryStore {
    async fn find(&self, query: &str) -> Result<Vec<i64>> {
        let inner = self.lock()?;
        Ok(inner
            .notes
            .iter()
            .filter(|(_, note)| matches_query(note, query))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn fetch(&self, ids: &[i64]) -> Result<Vec<Note>> {
        let inner = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.notes.get(id).cloned())
            .collect())
    }

    async fn create(&self, note: &Note) -> Result<i64> {
        let mut inner = self.lock()?;
        Ok(inner.add(note.clone()))
    }

    async fn update(&self, note: &Note) -> Result<()> {
        let id = note
            .id
            .ok_or_else(|| Error::Validation("cannot update a note without an id".to_string()))?;
        let mut inner = self.lock()?;
        let stored = inner
            .notes
            .get_mut(&id)
            .ok_or_else(|| Error::Store(format!("note {} not found", id)))?;
        stored.fields = note.fields.clone();
        Ok(())
    }

    async fn delete(&self, ids: &[i64]) -> Result<()> {
        let mut inner = self.lock()?;
        for id in ids {
            inner.notes.remove(id);
        }
        Ok(())
    }

    async fn deck_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.decks.iter().cloned().collect())
    }

    async fn field_names(&self, model: &str) -> Result<Vec<String>> {
        self.lock()?
            .models
            .get(model)
            .cloned()
            .ok_or_else(|| Error::Store(format!("unknown note type '{}'", model)))
    }
}
