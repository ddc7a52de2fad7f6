//! Human-readable tallies printed at the end of each command.

use std::collections::BTreeMap;
use std::path::Path;

use deckmend_engine::AnalysisDocument;
use deckmend_engine::repair::{DeleteReport, ImportReport, ProblemItem, RepairReport};
use deckmend_engine::review::{ReviewExport, ReviewReport};

/// How many problem items to show after a tally.
const SAMPLE_LIMIT: usize = 5;

fn print_samples(samples: &[ProblemItem<'_>], total: usize) {
    if samples.is_empty() {
        return;
    }
    println!("First {} of {} problem items:", samples.len(), total);
    for item in samples {
        println!("  - {}", item);
    }
}

fn dry_run_note(dry_run: bool) -> &'static str {
    if dry_run { " (dry run, nothing written)" } else { "" }
}

pub fn print_analysis(doc: &AnalysisDocument, out: &Path) {
    let readable = doc.source_stats.iter().filter(|s| s.readable).count();
    println!(
        "Read {} of {} sources, {} candidates ({} rejected, {} merged)",
        readable,
        doc.source_stats.len(),
        doc.extracted_definitions.len(),
        doc.extraction.rejected,
        doc.extraction.merged
    );
    for stat in doc.source_stats.iter().filter(|s| !s.readable) {
        println!(
            "  unreadable: {} ({})",
            stat.path.display(),
            stat.error.as_deref().unwrap_or("unknown error")
        );
    }
    for stat in &doc.source_stats {
        let Some(t) = stat.transcript.as_ref().filter(|t| t.is_transcript()) else {
            continue;
        };
        println!(
            "  transcript {}: {} timestamps, {} filler words, {} all-caps words, {} unclear marks",
            stat.path.display(),
            t.timestamps,
            t.filler_words,
            t.all_caps_words,
            t.unclear_marks
        );
        if !t.technical_terms.is_empty() {
            println!("    verify: {}", t.technical_terms.join(", "));
        }
    }
    println!("Wrote {}", out.display());
}

pub fn print_tally(label: &str, tally: &BTreeMap<&str, usize>) {
    let parts: Vec<String> = tally.iter().map(|(state, n)| format!("{} {}", n, state)).collect();
    if parts.is_empty() {
        println!("{}: no cards", label);
    } else {
        println!("{}: {}", label, parts.join(", "));
    }
}

pub fn print_repair(report: &RepairReport, dry_run: bool) {
    println!(
        "Processed {}: {} repaired, {} unchanged, {} flagged, {} dropped, {} failed{}",
        report.processed,
        report.repaired,
        report.unchanged,
        report.flagged,
        report.dropped,
        report.failed,
        dry_run_note(dry_run)
    );
    if !report.by_defect.is_empty() {
        let parts: Vec<String> = report
            .by_defect
            .iter()
            .map(|(tag, n)| format!("{} {}", n, tag.as_str()))
            .collect();
        println!("Defects found: {}", parts.join(", "));
    }
    print_samples(
        &report.samples(SAMPLE_LIMIT),
        report.failures.len() + report.flagged_notes.len(),
    );
}

pub fn print_import(model: &str, report: &ImportReport, dry_run: bool) {
    println!(
        "{}: {} created, {} updated, {} flagged, {} dropped, {} failed{}",
        model,
        report.created,
        report.updated,
        report.flagged,
        report.dropped,
        report.failed,
        dry_run_note(dry_run)
    );
    print_samples(
        &report.samples(SAMPLE_LIMIT),
        report.failures.len() + report.flagged_notes.len(),
    );
}

pub fn print_delete(report: &DeleteReport, dry_run: bool) {
    println!(
        "Scanned {}: {} matched, {} deleted, {} failed{}",
        report.scanned,
        report.matched,
        report.deleted,
        report.failed,
        dry_run_note(dry_run)
    );
    if !report.deleted_ids.is_empty() {
        let ids: Vec<String> = report.deleted_ids.iter().map(|id| id.to_string()).collect();
        println!("Deleted ids: {}", ids.join(" "));
    }
    for failure in report.failures.iter().take(SAMPLE_LIMIT) {
        println!("  - {}", ProblemItem::Failed(failure));
    }
}

pub fn print_review_export(export: &ReviewExport, out: &Path) {
    let with_issues = export.rows.iter().filter(|row| !row.issues.is_empty()).count();
    println!(
        "Wrote {} rows to {} ({} with issues, {} failed)",
        export.rows.len(),
        out.display(),
        with_issues,
        export.failures.len()
    );
    for failure in export.failures.iter().take(SAMPLE_LIMIT) {
        println!("  - {}", ProblemItem::Failed(failure));
    }
}

pub fn print_review(report: &ReviewReport, dry_run: bool) {
    println!(
        "Read {} rows: {} updated, {} unchanged, {} failed{}",
        report.rows,
        report.updated,
        report.unchanged,
        report.failed,
        dry_run_note(dry_run)
    );
    print_samples(
        &report.samples(SAMPLE_LIMIT),
        report.failures.len() + report.flagged_notes.len(),
    );
}
