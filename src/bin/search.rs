//! Search binary entry point.
//!
//! Queries the knowledge base directly, without the language model. Useful for
//! checking what the Retrieve step will hand to the drafter. Supports both
//! single-query and interactive REPL modes, with table or JSON output.
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! search --query "subspace"
//! ```
//!
//! JSON output against another store:
//! ```bash
//! search --persist-dir ./other_db --query "linear map" --format json
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --interactive
//! ```

use anyhow::{Context, Result};
use axlerate::{
    config::{init_logging, StoreArgs},
    embedding::EmbeddingProvider,
    models::{RelevanceLevel, ScoredPassage},
    query::VectorStore,
    storage::{sqlite::DATABASE_FILE_NAME, PassageStorage},
};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::time::Instant;
use tracing::{debug, error, info};

/// Output format for search results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table with colored relevance levels
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Search binary CLI for querying the knowledge base
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Search the proof assistant's knowledge base by semantic similarity",
    long_about = "Query the knowledge base the proof workflow retrieves from. Supports both \
                  single-query and interactive modes with flexible output formatting.

EXAMPLES:
  Single query:
    search --query \"subspace\"

  JSON output:
    search --query \"linear map\" --format json

  Interactive mode:
    search --interactive

  Store built with the hashing embedder:
    search --embedding-provider hashing --query \"vector space\""
)]
struct Args {
    #[command(flatten)]
    store: StoreArgs,

    /// Search query (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N", default_value = "5")]
    top_k: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// Execute a search query and return results
async fn execute_search<E: EmbeddingProvider, S: PassageStorage>(
    store: &VectorStore<E, S>,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<ScoredPassage>> {
    debug!("Executing search for query: {}", query_text);

    store
        .search(query_text, top_k)
        .await
        .with_context(|| format!("Failed to execute search for query: '{}'", query_text))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() > max_chars {
        let cut: String = flattened.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        flattened
    }
}

/// Format results as a pretty table
fn format_results_table(results: &[ScoredPassage]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Passage").add_attribute(Attribute::Bold),
        Cell::new("Source").add_attribute(Attribute::Bold),
        Cell::new("Relevance").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        let metadata = &result.passage.metadata;
        let source = match (metadata.get("id"), metadata.get("source")) {
            (Some(id), Some(source)) => format!("{} ({})", id, source),
            (Some(id), None) => id.clone(),
            (None, Some(source)) => source.clone(),
            (None, None) => "-".to_string(),
        };

        let color = match result.relevance {
            RelevanceLevel::Identical => Color::Green,
            RelevanceLevel::HighlySimilar => Color::Cyan,
            RelevanceLevel::Similar => Color::Yellow,
            RelevanceLevel::Relevant => Color::White,
        };

        table.add_row(vec![
            Cell::new(format!("{}", idx + 1)),
            Cell::new(truncate(&result.passage.text, 70)),
            Cell::new(truncate(&source, 40)),
            Cell::new(result.relevance.label()).fg(color),
            Cell::new(format!("{:.4}", result.score)),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[ScoredPassage]) -> Result<String> {
    serde_json::to_string_pretty(results).with_context(|| "Failed to serialize results to JSON")
}

/// Display the full text and metadata of a single result
fn display_result_detail(result: &ScoredPassage, rank: usize) {
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    if let Some(id) = result.passage.id {
        println!("Passage ID: {}", id);
    }
    for (key, value) in &result.passage.metadata {
        println!("{}: {}", key, value);
    }
    println!("Relevance: {}", result.relevance.label());
    println!("Score: {:.4}", result.score);
    println!("\n{}", result.passage.text);
    println!("{}", "═".repeat(80));
}

fn print_results(results: &[ScoredPassage], format: OutputFormat, elapsed_secs: f64) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(results));
            println!("\nFound {} results in {:.2}s", results.len(), elapsed_secs);
        }
        OutputFormat::Json => println!("{}", format_results_json(results)?),
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  <query>         - Search the knowledge base");
    println!("  /top N          - Set number of results to N");
    println!("  /format table   - Use table output format");
    println!("  /format json    - Use JSON output format");
    println!("  /detail N       - Show full text for result rank N");
    println!("  /help           - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Run interactive REPL mode
async fn run_interactive<E: EmbeddingProvider, S: PassageStorage>(
    store: VectorStore<E, S>,
    mut top_k: usize,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Knowledge Base Search");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;

    let mut last_results: Vec<ScoredPassage> = Vec::new();

    loop {
        match rl.readline("Search> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/top" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(n)) if n > 0 => {
                                top_k = n;
                                println!("Set top-k to {}", top_k);
                            }
                            Some(_) => eprintln!("Invalid number: must be a positive integer"),
                            None => eprintln!("Usage: /top N"),
                        },
                        "/format" => match parts.get(1).copied() {
                            Some("table") => {
                                format = OutputFormat::Table;
                                println!("Set output format to table");
                            }
                            Some("json") => {
                                format = OutputFormat::Json;
                                println!("Set output format to JSON");
                            }
                            Some(_) => eprintln!("Invalid format: must be 'table' or 'json'"),
                            None => eprintln!("Usage: /format [table|json]"),
                        },
                        "/detail" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(rank)) if rank > 0 && rank <= last_results.len() => {
                                display_result_detail(&last_results[rank - 1], rank);
                            }
                            Some(Ok(rank)) if rank > last_results.len() => {
                                eprintln!(
                                    "Rank {} out of range (last search had {} results)",
                                    rank,
                                    last_results.len()
                                );
                            }
                            Some(_) => eprintln!("Invalid rank: must be a positive integer"),
                            None => eprintln!("Usage: /detail N"),
                        },
                        other => eprintln!(
                            "Unknown command: {}. Type /help for available commands.",
                            other
                        ),
                    }
                } else {
                    let start = Instant::now();
                    match execute_search(&store, line, top_k).await {
                        Ok(results) => {
                            if let Err(e) =
                                print_results(&results, format, start.elapsed().as_secs_f64())
                            {
                                eprintln!("Error formatting results: {}", e);
                            }
                            last_results = results;
                        }
                        Err(e) => eprintln!("Search failed: {:#}", e),
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    let query = match (&args.query, args.interactive) {
        (Some(query), false) => Some(query.clone()),
        (None, true) => None,
        _ => anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        ),
    };

    let db_file = args.store.persist_dir.join(DATABASE_FILE_NAME);
    if !db_file.exists() {
        anyhow::bail!(
            "Knowledge base not found: {}\n\
             Please run the ingestion binary first to create it.",
            db_file.display()
        );
    }

    info!("Loading knowledge base from: {}", args.store.persist_dir.display());

    let store = args
        .store
        .open_store()
        .await
        .context("Failed to open the knowledge base")?;

    let passage_count = store
        .count()
        .await
        .with_context(|| "Failed to count passages")?;
    if passage_count == 0 {
        anyhow::bail!(
            "Collection '{}' is empty (0 passages found).\n\
             Please run the ingestion binary to add passages first.",
            args.store.collection
        );
    }
    info!("Collection contains {} passages", passage_count);

    match query {
        None => run_interactive(store, args.top_k, args.format).await?,
        Some(query) => {
            let start = Instant::now();
            let results = execute_search(&store, &query, args.top_k).await?;
            print_results(&results, args.format, start.elapsed().as_secs_f64())?;
        }
    }

    Ok(())
}
