//! Example: adding a reviewed card through AnkiConnect.
//!
//! Creates a deck, adds one note, reads it back, and fixes a field.
//!
//! Run with: cargo run -p deckmend --example add_notes

use std::collections::HashMap;

use deckmend::{AnkiClient, Error, NoteBuilder};

#[tokio::main]
async fn main() -> deckmend::Result<()> {
    let client = AnkiClient::new();

    match client.misc().version().await {
        Ok(v) => println!("Connected to AnkiConnect v{}", v),
        Err(Error::ConnectionRefused) => {
            eprintln!("Could not connect to Anki. Is it running with AnkiConnect?");
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    }

    let deck = "deckmend Example";
    client.decks().create(deck).await?;
    println!("Using deck: {}", deck);

    let fields = client.models().field_names("Basic").await?;
    println!("Basic fields: {:?}", fields);

    let note = NoteBuilder::new(deck, "Basic")
        .field("Front", "What is the thalamus")
        .field("Back", "A relay station for sensory signals")
        .tag("PSYC2240")
        .build();
    let id = client.notes().add(&note).await?;
    println!("Added note {}", id);

    for info in client.notes().info(&[id]).await? {
        println!("  {} {:?}", info.model_name, info.ordered_fields());
    }

    let fixed = HashMap::from([
        ("Front".to_string(), "What is the thalamus?".to_string()),
        ("Back".to_string(), "A relay station for sensory signals.".to_string()),
    ]);
    client.notes().update_fields(id, &fixed).await?;
    println!("Fixed punctuation on note {}", id);

    let found = client.notes().find(&format!("deck:\"{}\"", deck)).await?;
    println!("Deck now holds {} note(s)", found.len());

    client.notes().delete(&[id]).await?;
    println!("Cleaned up");
    Ok(())
}
