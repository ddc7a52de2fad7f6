//! Command-line front end for the deckmend pipeline.
//!
//! Reads course material into an analysis document, writes CSV and `.apkg`
//! packages from it, and imports, repairs, or prunes notes in a running Anki
//! through AnkiConnect. Notes can also go out to a CSV for hand review and
//! come back with the edits.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

mod commands;
mod context;
mod report;

use context::Context;

// ============================================================================
// CLI Arguments
// ============================================================================

/// Extract, build, and repair Anki flashcards from course material.
#[derive(Parser, Debug)]
#[command(name = "deckmend")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// AnkiConnect host address
    #[arg(long, global = true)]
    host: Option<String>,

    /// AnkiConnect port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// AnkiConnect API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON instead of a tally
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read sources and write an analysis document with candidate cards
    Extract {
        /// Source files or directories (.pdf, .docx, .txt)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Analysis document to write
        #[arg(long, default_value = "analysis.json")]
        out: PathBuf,

        /// Deck the candidate cards belong to
        #[arg(long, default_value = "Default")]
        deck: String,

        /// Course tag added to every card (defaults to the deck name without spaces)
        #[arg(long)]
        course_tag: Option<String>,

        /// Note type with Question/Answer/Priority/Source/Chapter/Clinical fields;
        /// the stock Basic type is used when omitted
        #[arg(long)]
        model: Option<String>,
    },

    /// Write CSV and/or .apkg files from an analysis document
    Build {
        /// Analysis document to read
        #[arg(long)]
        analysis: PathBuf,

        /// Front,Back,Tags CSV to write
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Text,Tags cloze CSV to write
        #[arg(long)]
        cloze_csv: Option<PathBuf>,

        /// Anki package to write
        #[arg(long)]
        apkg: Option<PathBuf>,

        /// Deck name for the package (defaults to the cards' deck)
        #[arg(long)]
        deck: Option<String>,
    },

    /// Detect and repair defects in notes matching a query
    Repair {
        /// Anki search query
        #[arg(long)]
        query: String,

        /// Count what would change without writing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Normalize the cards of an analysis document and add them to Anki
    Import {
        /// Analysis document to read
        #[arg(long)]
        analysis: PathBuf,

        /// Target deck (created if missing)
        #[arg(long)]
        deck: String,

        /// Count what would be written without writing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Delete notes whose question or answer contains a needle
    DeleteMatching {
        /// Anki search query limiting the scan
        #[arg(long)]
        query: String,

        /// Case-insensitive text to look for
        #[arg(long)]
        needle: String,

        /// Report matches without deleting
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Write notes matching a query to a CSV for hand review
    ReviewExport {
        /// Anki search query
        #[arg(long)]
        query: String,

        /// Review spreadsheet to write
        #[arg(long, default_value = "review.csv")]
        out: PathBuf,
    },

    /// Write edited Question and Answer cells from a review CSV back to Anki
    ReviewImport {
        /// Review spreadsheet to read
        #[arg(long)]
        csv: PathBuf,

        /// Count what would change without writing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List deck names
    Decks,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(&args)?;
    info!(anki_url = %ctx.store.client().url(), "starting deckmend");
    debug!(config = ?ctx.config, "loaded configuration");

    match args.command {
        Command::Extract {
            paths,
            out,
            deck,
            course_tag,
            model,
        } => {
            let course_tag = course_tag.unwrap_or_else(|| deck.replace(' ', ""));
            commands::extract(&ctx, &paths, &out, &deck, &course_tag, model.as_deref())?;
        }
        Command::Build {
            analysis,
            csv,
            cloze_csv,
            apkg,
            deck,
        } => {
            let outputs = commands::BuildOutputs {
                csv,
                cloze_csv,
                apkg,
            };
            commands::build(&ctx, &analysis, &outputs, deck.as_deref())?;
        }
        Command::Repair { query, dry_run } => commands::repair(&ctx, &query, dry_run).await?,
        Command::Import {
            analysis,
            deck,
            dry_run,
        } => commands::import(&ctx, &analysis, &deck, dry_run).await?,
        Command::DeleteMatching {
            query,
            needle,
            dry_run,
        } => commands::delete_matching(&ctx, &query, &needle, dry_run).await?,
        Command::ReviewExport { query, out } => commands::review_export(&ctx, &query, &out).await?,
        Command::ReviewImport { csv, dry_run } => commands::review_import(&ctx, &csv, dry_run).await?,
        Command::Decks => commands::decks(&ctx).await?,
    }

    Ok(())
}
