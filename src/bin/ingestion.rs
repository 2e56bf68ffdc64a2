//! Ingestion binary entry point.
//!
//! Loads source material into the knowledge base: splits a delimited text file
//! (or reads a JSON seed file), embeds every passage and appends it to the
//! persistent collection.
//!
//! # Examples
//!
//! Ingest the book text:
//! ```bash
//! ingestion --input data/ladr.txt
//! ```
//!
//! Seed a few hand-written definitions:
//! ```bash
//! ingestion --input seed.json --format json-seed
//! ```

use anyhow::{Context, Result};
use axlerate::{
    config::{init_logging, StoreArgs},
    ingestion::{IngestionPipeline, DEFAULT_BATCH_SIZE},
    provider::{
        DelimitedTextProvider, JsonSeedProvider, PassageProvider, DEFAULT_DELIMITER, DEFAULT_SOURCE,
    },
};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Input file format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Plain text with passages separated by a delimiter (default)
    Text,
    /// JSON array of {"text", "meta"} records
    JsonSeed,
}

/// Ingestion CLI for building and extending the knowledge base
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Load source passages into the proof assistant's knowledge base",
    long_about = "Ingestion pipeline that splits source documents into passages, embeds them \
                  and appends them to the persistent vector store.

EXAMPLES:
  Ingest a delimited text file:
    ingestion --input data/ladr.txt

  Ingest a JSON seed file:
    ingestion --input seed.json --format json-seed

  Use OpenAI embeddings:
    OPENAI_API_KEY=sk-... ingestion --input data/ladr.txt --embedding-provider open-ai

  Custom delimiter, source and batch size:
    ingestion --input notes.txt --delimiter '====' --source 'Lecture notes' --batch-size 50"
)]
struct IngestionArgs {
    /// Input file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Input file format
    #[arg(long, value_enum, default_value = "text")]
    format: InputFormat,

    /// Passage separator for text input
    #[arg(long, value_name = "TEXT", default_value = DEFAULT_DELIMITER)]
    delimiter: String,

    /// Source attribution stored with every text passage
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SOURCE)]
    source: String,

    #[command(flatten)]
    store: StoreArgs,

    /// Number of passages to process per embedding batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

async fn load_provider(args: &IngestionArgs) -> Result<Box<dyn PassageProvider>> {
    let provider: Box<dyn PassageProvider> = match args.format {
        InputFormat::Text => {
            let metadata = DelimitedTextProvider::source_metadata(&args.source);
            Box::new(
                DelimitedTextProvider::from_file(&args.input, &args.delimiter, metadata)
                    .await
                    .with_context(|| format!("Failed to read passages from {:?}", args.input))?,
            )
        }
        InputFormat::JsonSeed => Box::new(
            JsonSeedProvider::from_file(&args.input)
                .await
                .with_context(|| format!("Failed to load seed records from {:?}", args.input))?,
        ),
    };
    Ok(provider)
}

/// Create a progress bar for tracking ingestion
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} passages | Inserted: {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = IngestionArgs::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    info!("Starting knowledge base ingestion");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.input.exists() {
        error!("Input file does not exist: {:?}", args.input);
        anyhow::bail!("Input file not found: {:?}", args.input);
    }
    info!("Input file: {:?}", args.input);

    let provider = load_provider(&args).await?;
    let passages = provider
        .fetch_passages()
        .await
        .with_context(|| format!("Failed to load passages from {}", provider.name()))?;
    info!("Found {} passages in {}", passages.len(), provider.name());

    if passages.is_empty() {
        warn!("No passages found in input file");
        return Ok(());
    }

    let store = args
        .store
        .open_store()
        .await
        .context("Failed to open the knowledge base")?;
    let before = store.count().await.context("Failed to count passages")?;

    let mut pipeline = IngestionPipeline::new(store, Some(args.batch_size));

    let progress = create_progress_bar(passages.len())?;
    progress.set_message("0");

    info!("Processing passages with batch_size={}...", pipeline.batch_size());
    let stats = pipeline
        .ingest_batch_with_progress(&passages, |running| {
            progress.set_position(running.total_processed as u64);
            progress.set_message(format!("{}", running.inserted));
        })
        .await;

    progress.finish_with_message(format!("{}", stats.inserted));

    let after = pipeline
        .store()
        .count()
        .await
        .context("Failed to count passages")?;

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Ingestion Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Collection size:      {:>16} ║", after);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");
    debug!("Collection grew from {} to {} passages", before, after);

    if stats.failed > 0 {
        warn!(
            "{} passages failed to process - check logs for details",
            stats.failed
        );
    }

    info!("Ingestion completed");

    Ok(())
}
