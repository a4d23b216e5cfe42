//! Shelfmark - outline and annotation core for a PDF reader
//!
//! This library extracts and merges table-of-contents data, keeps highlight
//! and note positions independent of zoom, and stores everything per book
//! and reader. The `shelfmark` binary drives it from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};

// Module declarations
pub mod config;
pub mod db;
mod db_schema;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod merge;
pub mod outline;
pub mod pdf;
pub mod reader;
pub mod settings;
pub mod store;
pub mod types;

// Re-export public types
pub use config::ReaderConfig;
pub use db::SqliteStore;
pub use error::{Result, ShelfmarkError};
pub use merge::merge_outline;
pub use outline::{OutlineDocument, extract_outline};
pub use pdf::PdfDocument;
pub use reader::{ReaderController, ReaderMode, SelectionOutcome, TextSelection};
pub use store::AnnotationStore;
pub use types::{
    CustomOutlineItem, Highlight, HighlightColor, MergedOutlineEntry, Note, OutlineNode, Scope,
};

#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(about = "Inspect and edit PDF outlines and annotations")]
#[command(version)]
struct Cli {
    /// SQLite database holding outlines and annotations
    #[arg(long, global = true, default_value = "shelfmark.db")]
    db: PathBuf,

    /// Book id the data belongs to
    #[arg(long, global = true, default_value_t = 1)]
    book: i64,

    /// Reader the data belongs to
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Reader config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the merged outline of a PDF
    Outline {
        pdf: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Add a custom outline item
    Bookmark {
        pdf: PathBuf,
        #[arg(long)]
        page: u32,
        #[arg(long)]
        title: Option<String>,
    },
    /// Replace a top-level PDF outline entry with a custom one
    Override {
        pdf: PathBuf,
        /// Position of the entry among the PDF's top-level outline entries
        #[arg(long)]
        index: usize,
        #[arg(long)]
        title: Option<String>,
    },
    /// List stored highlights
    Highlights {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        json: bool,
    },
}

type CliReader = ReaderController<SqliteStore, SqliteStore>;

/// Run the command line interface
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ReaderConfig::from_path(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    let scope = Scope::new(cli.book, cli.user.clone());

    match cli.command {
        Command::Outline { pdf, json } => {
            let (reader, _) = open_reader(&cli.db, &pdf, config, scope).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(reader.merged_outline())?);
            } else {
                print_outline(reader.merged_outline());
            }
        }
        Command::Bookmark { pdf, page, title } => {
            let (mut reader, num_pages) = open_reader(&cli.db, &pdf, config, scope).await?;
            if page == 0 || page > num_pages {
                anyhow::bail!("page {} is outside 1..={}", page, num_pages);
            }
            reader.go_to_page(i64::from(page));
            let item = reader.add_bookmark(title.as_deref()).await?;
            println!("{}\t{}\t{}", item.id, item.page_number, item.title);
        }
        Command::Override { pdf, index, title } => {
            let (mut reader, _) = open_reader(&cli.db, &pdf, config, scope).await?;
            let item = reader
                .convert_native_to_custom(index, title.as_deref())
                .await?;
            println!("{}\t{}\t{}", item.id, item.page_number, item.title);
        }
        Command::Highlights { page, json } => {
            let store = SqliteStore::open(&cli.db)?;
            let highlights: Vec<Highlight> = store
                .list_highlights(&scope)
                .await?
                .into_iter()
                .filter(|h| page.is_none_or(|p| h.page == p))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&highlights)?);
            } else {
                for h in &highlights {
                    println!("{:>5}  {:<6}  {}", h.page, h.color, h.text);
                }
            }
        }
    }
    Ok(())
}

/// Open the database and PDF, register the book, and load its outline
async fn open_reader(
    db_path: &Path,
    pdf_path: &Path,
    config: ReaderConfig,
    scope: Scope,
) -> anyhow::Result<(CliReader, u32)> {
    let doc = PdfDocument::load(pdf_path)
        .with_context(|| format!("Failed to load PDF {}", pdf_path.display()))?;
    let num_pages = doc.page_count();

    let store = SqliteStore::open(db_path)?;
    let title = doc.title().unwrap_or_else(|| {
        pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    store.ensure_book(scope.book_id, &title)?;
    debug!("book {} is '{}'", scope.book_id, title);

    // Preferences get their own connection to the same file
    let prefs = SqliteStore::open(db_path)?;
    let mut reader = ReaderController::new(store, prefs, config, scope);
    reader.open_document(&doc, num_pages).await?;
    info!(
        "{} outline entries for {}",
        reader.merged_outline().len(),
        pdf_path.display()
    );
    Ok((reader, num_pages))
}

fn print_outline(entries: &[MergedOutlineEntry]) {
    for entry in entries {
        let marker = if entry.is_custom() { '*' } else { ' ' };
        println!("{:>5} {} {}", entry.page, marker, entry.title);
    }
}
