//! .apkg file generation.
//!
//! Writes a list of notes of one note type into an Anki package that can be
//! imported directly into Anki, without AnkiConnect.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use deckmend_engine::markup::strip_markup;
use deckmend_engine::{FieldRole, Note, NoteSchema};
use rusqlite::Connection;
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::info;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::cloze::cloze_numbers;
use crate::error::{Error, Result};
use crate::sql::{DEFAULT_CONF, DEFAULT_DCONF, FIELD_SEPARATOR, SCHEMA};

/// Anki's model type for cloze note types.
const MODEL_TYPE_CLOZE: i64 = 1;
const MODEL_TYPE_STANDARD: i64 = 0;

/// Writes notes of one note type into a single deck of an `.apkg` file.
///
/// ```no_run
/// use deckmend_builder::ApkgWriter;
/// use deckmend_engine::{Note, NoteSchema};
///
/// # fn example() -> deckmend_builder::Result<()> {
/// let schema = NoteSchema::basic();
/// let notes = vec![
///     Note::new("PSYC 2240", &schema)
///         .with_field("Front", "What is the thalamus?")
///         .with_field("Back", "A relay station for sensory signals."),
/// ];
/// ApkgWriter::new("PSYC 2240", &schema).write(&notes, "psyc2240.apkg")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApkgWriter {
    deck_name: String,
    schema: NoteSchema,
}

impl ApkgWriter {
    pub fn new(deck_name: impl Into<String>, schema: &NoteSchema) -> Self {
        Self {
            deck_name: deck_name.into(),
            schema: schema.clone(),
        }
    }

    fn is_cloze(&self) -> bool {
        self.schema.field(FieldRole::Text).is_some()
    }

    /// Build the package and write it to `path`.
    ///
    /// Every note must carry the question field of the schema.
    pub fn write(&self, notes: &[Note], path: impl AsRef<Path>) -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("collection.anki2");

        {
            let conn = Connection::open(&db_path)?;
            self.create_database(&conn, notes)?;
        }

        let file = std::fs::File::create(path.as_ref())?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("collection.anki2", options)?;
        zip.write_all(&std::fs::read(&db_path)?)?;

        // Cards carry no media; the manifest is still required.
        zip.start_file("media", options)?;
        zip.write_all(b"{}")?;

        zip.finish()?;
        info!(
            path = %path.as_ref().display(),
            notes = notes.len(),
            deck = %self.deck_name,
            "wrote apkg"
        );
        Ok(())
    }

    fn create_database(&self, conn: &Connection, notes: &[Note]) -> Result<()> {
        conn.execute_batch(SCHEMA)?;

        let now = current_timestamp();
        let now_ms = now * 1000;
        let deck_id = generate_id(&self.deck_name);
        let model_id = generate_id(&self.schema.model);

        conn.execute(
            "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
             VALUES (1, ?, ?, ?, 11, 0, -1, 0, ?, ?, ?, ?, '{}')",
            rusqlite::params![
                now,
                now_ms,
                now_ms,
                DEFAULT_CONF,
                self.models_json(model_id, deck_id, now)?,
                self.decks_json(deck_id, now)?,
                DEFAULT_DCONF
            ],
        )?;

        let question_field = self.schema.question_field();
        let mut next_id = now_ms;
        for note in notes {
            let sort_field = note.fields.get(question_field).ok_or_else(|| Error::MissingField {
                model: self.schema.model.clone(),
                field: question_field.to_string(),
            })?;

            let note_id = next_id;
            next_id += 1;
            let flds = self
                .schema
                .fields
                .iter()
                .map(|name| note.fields.get(name).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(&FIELD_SEPARATOR.to_string());

            conn.execute(
                "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
                 VALUES (?, ?, ?, ?, -1, ?, ?, ?, ?, 0, '')",
                rusqlite::params![
                    note_id,
                    generate_guid(note_id),
                    model_id,
                    now,
                    tags_string(&note.tags),
                    flds,
                    sort_field,
                    compute_checksum(sort_field)
                ],
            )?;

            for ord in self.card_ords(sort_field) {
                let card_id = next_id;
                next_id += 1;
                conn.execute(
                    "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps, lapses, left, odue, odid, flags, data)
                     VALUES (?, ?, ?, ?, ?, -1, 0, 0, ?, 0, 0, 0, 0, 0, 0, 0, 0, '')",
                    rusqlite::params![card_id, note_id, deck_id, ord, now, note_id - now_ms + 1],
                )?;
            }
        }

        Ok(())
    }

    /// One card for standard note types, one per cloze number otherwise.
    fn card_ords(&self, text: &str) -> Vec<u32> {
        if !self.is_cloze() {
            return vec![0];
        }
        match cloze_numbers(text) {
            numbers if numbers.is_empty() => vec![0],
            numbers => numbers.into_iter().map(|n| n.saturating_sub(1)).collect(),
        }
    }

    fn models_json(&self, model_id: i64, deck_id: i64, now: i64) -> Result<String> {
        let fields: Vec<Value> = self
            .schema
            .fields
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({
                    "name": name,
                    "ord": i,
                    "sticky": false,
                    "rtl": false,
                    "font": "Arial",
                    "size": 20,
                    "media": []
                })
            })
            .collect();

        let question = self.schema.question_field();
        let answer = self.schema.answer_field();
        let (kind, template) = if self.is_cloze() {
            (
                MODEL_TYPE_CLOZE,
                json!({
                    "name": "Cloze",
                    "ord": 0,
                    "qfmt": format!("{{{{cloze:{}}}}}", question),
                    "afmt": format!("{{{{cloze:{}}}}}<br>{{{{{}}}}}", question, answer),
                    "bqfmt": "",
                    "bafmt": "",
                    "did": null
                }),
            )
        } else {
            (
                MODEL_TYPE_STANDARD,
                json!({
                    "name": "Card 1",
                    "ord": 0,
                    "qfmt": format!("{{{{{}}}}}", question),
                    "afmt": format!("{{{{FrontSide}}}}<hr id=answer>{{{{{}}}}}", answer),
                    "bqfmt": "",
                    "bafmt": "",
                    "did": null
                }),
            )
        };
        let question_ord = self
            .schema
            .fields
            .iter()
            .position(|f| f == question)
            .unwrap_or(0);

        let model = json!({
            "id": model_id,
            "name": self.schema.model,
            "type": kind,
            "mod": now,
            "usn": -1,
            "sortf": question_ord,
            "did": deck_id,
            "tmpls": [template],
            "flds": fields,
            "css": CARD_CSS,
            "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
            "latexPost": "\\end{document}",
            "latexsvg": false,
            "req": [[0, "any", [question_ord]]]
        });

        let models: HashMap<String, Value> = HashMap::from([(model_id.to_string(), model)]);
        Ok(serde_json::to_string(&models)?)
    }

    fn decks_json(&self, deck_id: i64, now: i64) -> Result<String> {
        let deck = |id: i64, name: &str| {
            json!({
                "id": id,
                "mod": now,
                "name": name,
                "usn": -1,
                "lrnToday": [0, 0],
                "revToday": [0, 0],
                "newToday": [0, 0],
                "timeToday": [0, 0],
                "collapsed": false,
                "browserCollapsed": false,
                "desc": "",
                "dyn": 0,
                "conf": 1,
                "extendNew": 10,
                "extendRev": 50
            })
        };
        let decks: HashMap<String, Value> = HashMap::from([
            ("1".to_string(), deck(1, "Default")),
            (deck_id.to_string(), deck(deck_id, &self.deck_name)),
        ]);
        Ok(serde_json::to_string(&decks)?)
    }
}

const CARD_CSS: &str = ".card {
    font-family: arial;
    font-size: 20px;
    text-align: center;
    color: black;
    background-color: white;
}";

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Stable positive ID for a model or deck name.
fn generate_id(name: &str) -> i64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    // Keep clear of the reserved Default deck id
    ((hasher.finish() & 0x7FFF_FFFF_FFFF) as i64).max(2)
}

/// Base91 GUID, as Anki writes them.
fn generate_guid(note_id: i64) -> String {
    const CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+,-./:;<=>?@[]^_`{|}~";
    let mut n = note_id as u64;
    let mut result = String::new();
    while n > 0 {
        result.push(CHARS[(n % 91) as usize] as char);
        n /= 91;
    }
    result
}

fn compute_checksum(sort_field: &str) -> i64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    strip_markup(sort_field).hash(&mut hasher);
    (hasher.finish() & 0xFFFF_FFFF) as i64
}

/// Anki stores tags space-separated with a leading and trailing space.
fn tags_string(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(" {} ", tags.join(" "))
    }
}
