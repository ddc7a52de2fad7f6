//! Batch repair, import, and content-matched deletion over a [`NoteStore`].
//!
//! Every workflow is an idempotent pass: running it twice over the same
//! notes writes nothing the second time. Per-note failures are collected in
//! the report and never stop the batch.
//!
//! # Example
//!
//! ```no_run
//! use deckmend_engine::{MemoryStore, Normalizer, RepairEngine};
//!
//! # async fn example() -> deckmend_engine::Result<()> {
//! let store = MemoryStore::new();
//! let engine = RepairEngine::new(&store, Normalizer::default()).with_batch_size(25);
//!
//! let report = engine.repair("deck:Neuro").await?;
//! println!("{} repaired, {} flagged", report.repaired, report.flagged);
//! for item in report.samples(5) {
//!     println!("  {}", item);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::defects::DefectTag;
use crate::error::{Error, Result};
use crate::markup::strip_markup;
use crate::normalize::{CardState, Normalizer};
use crate::note::Note;
use crate::schema::NoteSchema;
use crate::store::{NoteStore, upsert};

/// Tag added to imported notes that still need human review.
pub const REVIEW_TAG: &str = "needs-review";

/// Bounded retries with linear backoff for transient store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure; the n-th retry waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl From<&BatchConfig> for RetryPolicy {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "transient store error, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A note that could not be read or written.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// The note ID, or `None` for notes that were never created.
    pub note_id: Option<i64>,
    pub error: String,
}

/// A note left with defects the rules could not repair.
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedNote {
    pub note_id: Option<i64>,
    pub question: String,
    pub unrepaired: Vec<DefectTag>,
}

/// A problem item from a report, for display.
#[derive(Debug, Clone, Copy)]
pub enum ProblemItem<'a> {
    Failed(&'a ItemFailure),
    Flagged(&'a FlaggedNote),
}

fn fmt_id(id: Option<i64>) -> String {
    id.map_or_else(|| "new note".to_string(), |id| format!("note {}", id))
}

impl fmt::Display for ProblemItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemItem::Failed(item) => write!(f, "{} failed: {}", fmt_id(item.note_id), item.error),
            ProblemItem::Flagged(item) => {
                let tags: Vec<&str> = item.unrepaired.iter().map(|t| t.as_str()).collect();
                write!(
                    f,
                    "{} flagged [{}]: {:?}",
                    fmt_id(item.note_id),
                    tags.join(", "),
                    item.question
                )
            }
        }
    }
}

fn samples<'a>(
    failures: &'a [ItemFailure],
    flagged: &'a [FlaggedNote],
    n: usize,
) -> Vec<ProblemItem<'a>> {
    failures
        .iter()
        .map(ProblemItem::Failed)
        .chain(flagged.iter().map(ProblemItem::Flagged))
        .take(n)
        .collect()
}

/// Report from [`RepairEngine::repair`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    /// Notes examined, including ones whose fetch failed.
    pub processed: usize,
    /// Notes fully repaired and written (or that would be, in a dry run).
    pub repaired: usize,
    /// Notes that could not be read or written.
    pub failed: usize,
    /// Notes with no defects.
    pub unchanged: usize,
    /// Notes left with unrepaired defects.
    pub flagged: usize,
    /// Placeholder notes skipped under the drop policy.
    pub dropped: usize,
    /// How many notes carried each defect before repair.
    pub by_defect: BTreeMap<DefectTag, usize>,
    pub failures: Vec<ItemFailure>,
    pub flagged_notes: Vec<FlaggedNote>,
}

impl RepairReport {
    /// The first `n` failures and flagged notes, failures first.
    pub fn samples(&self, n: usize) -> Vec<ProblemItem<'_>> {
        samples(&self.failures, &self.flagged_notes, n)
    }

    fn fail(&mut self, note_id: Option<i64>, error: &Error) {
        warn!(note_id = ?note_id, error = %error, "note failed");
        self.failed += 1;
        self.failures.push(ItemFailure {
            note_id,
            error: error.to_string(),
        });
    }
}

/// Report from [`RepairEngine::import`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    /// Notes that already had an id and were updated.
    pub updated: usize,
    pub failed: usize,
    /// Notes written with unrepaired defects, tagged [`REVIEW_TAG`].
    pub flagged: usize,
    pub dropped: usize,
    pub failures: Vec<ItemFailure>,
    pub flagged_notes: Vec<FlaggedNote>,
}

impl ImportReport {
    pub fn samples(&self, n: usize) -> Vec<ProblemItem<'_>> {
        samples(&self.failures, &self.flagged_notes, n)
    }
}

/// What [`RepairEngine::delete_matching`] deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    /// Case-insensitive text to look for in the question or answer.
    pub needle: String,
}

impl ContentMatch {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }

    /// Whether the markup-free question or answer contains the needle.
    pub fn matches(&self, note: &Note, schema: &NoteSchema) -> bool {
        let needle = self.needle.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        [note.question(schema), note.answer(schema)]
            .iter()
            .any(|text| strip_markup(text).to_lowercase().contains(&needle))
    }
}

/// Report from [`RepairEngine::delete_matching`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    pub scanned: usize,
    pub matched: usize,
    /// Notes deleted (or that would be, in a dry run).
    pub deleted: usize,
    pub failed: usize,
    pub deleted_ids: Vec<i64>,
    pub failures: Vec<ItemFailure>,
}

/// Batch workflows over a note store.
#[derive(Debug)]
pub struct RepairEngine<'a, S> {
    pub(crate) store: &'a S,
    pub(crate) normalizer: Normalizer,
    pub(crate) batch_size: usize,
    pub(crate) retry: RetryPolicy,
    pub(crate) dry_run: bool,
}

impl<'a, S: NoteStore> RepairEngine<'a, S> {
    pub fn new(store: &'a S, normalizer: Normalizer) -> Self {
        Self {
            store,
            normalizer,
            batch_size: 50,
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }

    /// Notes fetched per store call. Zero is treated as one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Count what would change without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub(crate) async fn schema_for(
        &self,
        model: &str,
        cache: &mut HashMap<String, NoteSchema>,
    ) -> Result<NoteSchema> {
        if let Some(schema) = cache.get(model) {
            return Ok(schema.clone());
        }
        let fields = self.retry.run(|| self.store.field_names(model)).await?;
        let schema = NoteSchema::resolve(model, &fields)?;
        debug!(model, question = schema.question_field(), answer = schema.answer_field(), "resolved note type");
        cache.insert(model.to_string(), schema.clone());
        Ok(schema)
    }

    /// Normalize every note matching `query` and write back the ones that changed.
    pub async fn repair(&self, query: &str) -> Result<RepairReport> {
        let ids = self.retry.run(|| self.store.find(query)).await?;
        info!(query, count = ids.len(), dry_run = self.dry_run, "repairing notes");

        let mut report = RepairReport::default();
        let mut schemas = HashMap::new();

        for chunk in ids.chunks(self.batch_size) {
            let notes = match self.retry.run(|| self.store.fetch(chunk)).await {
                Ok(notes) => notes,
                Err(e) => {
                    report.processed += chunk.len();
                    for id in chunk {
                        report.fail(Some(*id), &e);
                    }
                    continue;
                }
            };

            for note in notes {
                report.processed += 1;
                let schema = match self.schema_for(&note.model, &mut schemas).await {
                    Ok(schema) => schema,
                    Err(e) => {
                        report.fail(note.id, &e);
                        continue;
                    }
                };

                let result = self.normalizer.normalize(&note, &schema);
                for tag in &result.defects {
                    *report.by_defect.entry(*tag).or_default() += 1;
                }
                debug!(note_id = ?note.id, state = result.state.as_str(), defects = ?result.defects, "normalized");

                match result.state {
                    CardState::Ok => {
                        report.unchanged += 1;
                        continue;
                    }
                    CardState::Dropped => {
                        report.dropped += 1;
                        continue;
                    }
                    CardState::Flagged | CardState::Repaired => {}
                }

                // A failed write counts only as a failure.
                if result.note != note && !self.dry_run {
                    if let Err(e) = self.retry.run(|| self.store.update(&result.note)).await {
                        report.fail(note.id, &e);
                        continue;
                    }
                }
                if result.state == CardState::Flagged {
                    report.flagged += 1;
                    report.flagged_notes.push(FlaggedNote {
                        note_id: note.id,
                        question: result.note.question(&schema).to_string(),
                        unrepaired: result.unrepaired,
                    });
                } else if result.note != note {
                    report.repaired += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            repaired = report.repaired,
            unchanged = report.unchanged,
            flagged = report.flagged,
            dropped = report.dropped,
            failed = report.failed,
            "repair finished"
        );
        Ok(report)
    }

    /// Normalize `notes` laid out for `schema` and upsert them.
    ///
    /// Dropped notes are skipped. Flagged notes are written with
    /// [`REVIEW_TAG`] so they can be found in the collection.
    pub async fn import(&self, notes: &[Note], schema: &NoteSchema) -> ImportReport {
        let mut report = ImportReport::default();
        info!(count = notes.len(), model = %schema.model, dry_run = self.dry_run, "importing notes");

        for note in notes {
            let result = self.normalizer.normalize(note, schema);
            let mut note = result.note;
            let flagged = match result.state {
                CardState::Dropped => {
                    report.dropped += 1;
                    continue;
                }
                CardState::Flagged => {
                    note.add_tag(REVIEW_TAG);
                    Some(FlaggedNote {
                        note_id: note.id,
                        question: note.question(schema).to_string(),
                        unrepaired: result.unrepaired,
                    })
                }
                CardState::Ok | CardState::Repaired => None,
            };

            let written = if self.dry_run {
                Ok(())
            } else {
                self.retry
                    .run(|| upsert(self.store, &note))
                    .await
                    .map(|status| debug!(note_id = status.id(), "upserted"))
            };
            match written {
                Ok(()) => {
                    match note.id {
                        Some(_) => report.updated += 1,
                        None => report.created += 1,
                    }
                    if let Some(flagged) = flagged {
                        report.flagged += 1;
                        report.flagged_notes.push(flagged);
                    }
                }
                Err(e) => {
                    warn!(note_id = ?note.id, error = %e, "import failed");
                    report.failed += 1;
                    report.failures.push(ItemFailure {
                        note_id: note.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            flagged = report.flagged,
            dropped = report.dropped,
            failed = report.failed,
            "import finished"
        );
        report
    }

    /// Resolve the `model` note type from the store, then [`import`](Self::import).
    ///
    /// If the note type cannot be resolved, every note counts as failed and
    /// the caller moves on to the next note type.
    pub async fn import_into(&self, model: &str, notes: &[Note]) -> ImportReport {
        let mut schemas = HashMap::new();
        match self.schema_for(model, &mut schemas).await {
            Ok(schema) => self.import(notes, &schema).await,
            Err(e) => {
                warn!(model, error = %e, notes = notes.len(), "cannot resolve note type");
                let mut report = ImportReport::default();
                for note in notes {
                    report.failed += 1;
                    report.failures.push(ItemFailure {
                        note_id: note.id,
                        error: e.to_string(),
                    });
                }
                report
            }
        }
    }

    /// Delete notes matching `query` whose question or answer contains the needle.
    ///
    /// Only notes the matcher hits are deleted. An empty needle is rejected.
    pub async fn delete_matching(&self, query: &str, matcher: &ContentMatch) -> Result<DeleteReport> {
        if matcher.needle.trim().is_empty() {
            return Err(Error::Validation("delete needle must not be empty".to_string()));
        }
        let ids = self.retry.run(|| self.store.find(query)).await?;
        info!(query, needle = %matcher.needle, count = ids.len(), "scanning for notes to delete");

        let mut report = DeleteReport::default();
        let mut schemas = HashMap::new();
        let mut doomed = Vec::new();

        for chunk in ids.chunks(self.batch_size) {
            let notes = match self.retry.run(|| self.store.fetch(chunk)).await {
                Ok(notes) => notes,
                Err(e) => {
                    for id in chunk {
                        report.failed += 1;
                        report.failures.push(ItemFailure {
                            note_id: Some(*id),
                            error: e.to_string(),
                        });
                    }
                    continue;
                }
            };
            for note in notes {
                report.scanned += 1;
                let Some(id) = note.id else { continue };
                let schema = match self.schema_for(&note.model, &mut schemas).await {
                    Ok(schema) => schema,
                    Err(e) => {
                        report.failed += 1;
                        report.failures.push(ItemFailure {
                            note_id: Some(id),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };
                if matcher.matches(&note, &schema) {
                    debug!(note_id = id, "matched for deletion");
                    doomed.push(id);
                }
            }
        }
        report.matched = doomed.len();

        for chunk in doomed.chunks(self.batch_size) {
            if !self.dry_run {
                if let Err(e) = self.retry.run(|| self.store.delete(chunk)).await {
                    warn!(error = %e, count = chunk.len(), "delete batch failed");
                    for id in chunk {
                        report.failed += 1;
                        report.failures.push(ItemFailure {
                            note_id: Some(*id),
                            error: e.to_string(),
                        });
                    }
                    continue;
                }
            }
            report.deleted += chunk.len();
            report.deleted_ids.extend_from_slice(chunk);
        }

        info!(matched = report.matched, deleted = report.deleted, failed = report.failed, "delete finished");
        Ok(report)
    }
}
