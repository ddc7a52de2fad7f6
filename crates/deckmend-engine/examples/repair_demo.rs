//! Repairs a handful of scraped cards in memory and prints the result.
//!
//! Run with: `cargo run -p deckmend-engine --example repair_demo`
//!
//! No Anki needed; swap the [`MemoryStore`] for an [`AnkiStore`] to run the
//! same workflow against a live collection.
//!
//! [`AnkiStore`]: deckmend_engine::AnkiStore

use deckmend_engine::{MemoryStore, Normalizer, Note, NoteSchema, RepairEngine};

#[tokio::main]
async fn main() -> deckmend_engine::Result<()> {
    let schema = NoteSchema::basic();
    let store = MemoryStore::new().with_model("Basic", &["Front", "Back"]);

    for (question, answer) in [
        ("<b>What is the hippocampus</b>", "HIGH Priority: Seahorse-shaped memory structure"),
        ("How do Flow through a Neuron function?", "Dendrites to soma to axon"),
        ("What does the Tower of Hanoi assess?", "Text, 378 Tower of Hanoi test, 59"),
        ("", "An answer whose question was lost during scraping"),
    ] {
        let note = Note::new("PSYC 2240", &schema)
            .with_field("Front", question)
            .with_field("Back", answer);
        store.insert(note)?;
    }

    let report = RepairEngine::new(&store, Normalizer::default())
        .repair("deck:\"PSYC 2240\"")
        .await?;

    println!(
        "{} processed: {} repaired, {} flagged, {} unchanged",
        report.processed, report.repaired, report.flagged, report.unchanged
    );
    for item in report.samples(5) {
        println!("  - {}", item);
    }

    println!("\nAfter repair:");
    for note in store.notes() {
        println!("  Q: {}", note.question(&schema));
        println!("  A: {}\n", note.answer(&schema));
    }
    Ok(())
}
