//! Subcommand implementations.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use deckmend_builder::{ApkgWriter, CsvExporter};
use deckmend_engine::analysis::CardTarget;
use deckmend_engine::repair::{ContentMatch, REVIEW_TAG};
use deckmend_engine::review::{read_rows, write_rows};
use deckmend_engine::source::source_paths;
use deckmend_engine::{AnalysisDocument, CardState, Extractor, Note, NoteSchema, NoteStore};
use tracing::{info, warn};

use crate::context::Context;
use crate::report;

type CommandResult = Result<(), Box<dyn Error>>;

pub fn extract(
    ctx: &Context,
    paths: &[PathBuf],
    out: &Path,
    deck: &str,
    course_tag: &str,
    model: Option<&str>,
) -> CommandResult {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(source_paths(path)?);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        warn!("no source files found");
    }

    let schema = match model {
        Some(model) => NoteSchema::memory_optimized(model),
        None => NoteSchema::basic(),
    };
    let extractor = Extractor::new(&ctx.config.extract, &ctx.config.vocabulary)?;
    let target = CardTarget {
        schema: &schema,
        deck,
        course_tag,
    };
    let doc = AnalysisDocument::analyze(&files, &extractor, &ctx.config.extract, &target);
    doc.write_to(out)?;
    info!(path = %out.display(), "wrote analysis document");

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&doc.source_stats)?);
    } else {
        report::print_analysis(&doc, out);
    }
    Ok(())
}

/// Files `build` writes; any may be omitted.
pub struct BuildOutputs {
    pub csv: Option<PathBuf>,
    pub cloze_csv: Option<PathBuf>,
    pub apkg: Option<PathBuf>,
}

pub fn build(ctx: &Context, analysis: &Path, outputs: &BuildOutputs, deck: Option<&str>) -> CommandResult {
    let doc = AnalysisDocument::read_from(analysis)?;
    let schema = match doc.candidate_cards.first() {
        Some(note) => schema_of(note)?,
        None => NoteSchema::basic(),
    };
    let deck = deck
        .map(str::to_string)
        .or_else(|| doc.candidate_cards.first().map(|n| n.deck.clone()))
        .unwrap_or_else(|| "Default".to_string());

    // Packages bypass AnkiConnect, so they get the same normalization an import would.
    let normalizer = ctx.normalizer()?;
    let mut tally = BTreeMap::new();
    let mut notes = Vec::with_capacity(doc.candidate_cards.len());
    for card in &doc.candidate_cards {
        let result = normalizer.normalize(card, &schema);
        *tally.entry(result.state.as_str()).or_insert(0usize) += 1;
        let mut note = result.note;
        match result.state {
            CardState::Dropped => continue,
            CardState::Flagged => note.add_tag(REVIEW_TAG),
            CardState::Ok | CardState::Repaired => {}
        }
        note.deck = deck.clone();
        notes.push(note);
    }

    let exporter = CsvExporter::new();
    if let Some(path) = &outputs.csv {
        std::fs::write(path, exporter.export_basic(&notes, &schema)?)?;
        info!(path = %path.display(), notes = notes.len(), "wrote csv");
    }
    if let Some(path) = &outputs.cloze_csv {
        std::fs::write(path, exporter.export_cloze(&notes, &schema)?)?;
        info!(path = %path.display(), "wrote cloze csv");
    }
    if let Some(path) = &outputs.apkg {
        ApkgWriter::new(&deck, &schema).write(&notes, path)?;
    }
    if outputs.csv.is_none() && outputs.cloze_csv.is_none() && outputs.apkg.is_none() {
        warn!("nothing to build: pass --csv, --cloze-csv, or --apkg");
    }

    report::print_tally("build", &tally);
    Ok(())
}

pub async fn repair(ctx: &Context, query: &str, dry_run: bool) -> CommandResult {
    let report = ctx.engine(dry_run)?.repair(query).await?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_repair(&report, dry_run);
    }
    Ok(())
}

pub async fn import(ctx: &Context, analysis: &Path, deck: &str, dry_run: bool) -> CommandResult {
    let doc = AnalysisDocument::read_from(analysis)?;
    let engine = ctx.engine(dry_run)?;

    if !dry_run && !doc.candidate_cards.is_empty() {
        ctx.store.client().decks().create(deck).await?;
    }

    let mut by_model: BTreeMap<&str, Vec<Note>> = BTreeMap::new();
    for card in &doc.candidate_cards {
        let mut note = card.clone();
        note.deck = deck.to_string();
        by_model.entry(card.model.as_str()).or_default().push(note);
    }

    for (model, notes) in by_model {
        let report = engine.import_into(model, &notes).await;
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            report::print_import(model, &report, dry_run);
        }
    }
    Ok(())
}

pub async fn delete_matching(ctx: &Context, query: &str, needle: &str, dry_run: bool) -> CommandResult {
    let report = ctx
        .engine(dry_run)?
        .delete_matching(query, &ContentMatch::new(needle))
        .await?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_delete(&report, dry_run);
    }
    Ok(())
}

pub async fn review_export(ctx: &Context, query: &str, out: &Path) -> CommandResult {
    let export = ctx.engine(false)?.review_export(query).await?;
    std::fs::write(out, write_rows(&export.rows)?)?;
    info!(path = %out.display(), rows = export.rows.len(), "wrote review spreadsheet");
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&export.failures)?);
    } else {
        report::print_review_export(&export, out);
    }
    Ok(())
}

pub async fn review_import(ctx: &Context, csv: &Path, dry_run: bool) -> CommandResult {
    let rows = read_rows(&std::fs::read_to_string(csv)?)?;
    let report = ctx.engine(dry_run)?.apply_review(&rows).await;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_review(&report, dry_run);
    }
    Ok(())
}

pub async fn decks(ctx: &Context) -> CommandResult {
    let mut names = ctx.store.deck_names().await?;
    names.sort();
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

/// Schema for a card from the analysis document, from its own field layout.
fn schema_of(note: &Note) -> Result<NoteSchema, Box<dyn Error>> {
    let fields: Vec<String> = note.fields.iter().map(|(name, _)| name.to_string()).collect();
    Ok(NoteSchema::resolve(&note.model, &fields)?)
}
