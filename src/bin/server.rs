//! HTTP server binary entry point.
//!
//! Serves `POST /api/question` and `GET /` on top of the proof workflow.
//!
//! ```bash
//! GROQ_API_KEY=gsk_... axlerate-server --port 8000
//! ```

use anyhow::{Context, Result};
use axlerate::{
    config::{init_logging, LlmArgs, StoreArgs, WorkflowArgs},
    server::{ProofServer, ServerConfig},
    workflow::ProofWorkflow,
};
use clap::Parser;
use tracing::{info, warn};

/// HTTP API for the proof assistant
#[derive(Parser, Debug)]
#[command(name = "axlerate-server", version, about = "Serve the proof assistant over HTTP")]
struct Args {
    /// Address to bind
    #[arg(long, value_name = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, value_name = "PORT", default_value_t = 8000)]
    port: u16,

    /// Upper bound on one question, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    request_timeout_secs: u64,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    llm: LlmArgs,

    #[command(flatten)]
    workflow: WorkflowArgs,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    // Fail on a missing key before loading the embedding model
    let model = args.llm.build_client().context("Failed to configure the language model")?;
    let workflow_config = args.workflow.to_config().context("Invalid workflow options")?;

    let store = args
        .store
        .open_store()
        .await
        .context("Failed to open the knowledge base")?;
    let passages = store.count().await.context("Failed to count passages")?;
    if passages == 0 {
        warn!(
            "Collection '{}' is empty; every answer will be drafted without context",
            args.store.collection
        );
    } else {
        info!("Knowledge base holds {} passages", passages);
    }

    let workflow = ProofWorkflow::new(store, model, workflow_config);
    let server = ProofServer::new(
        ServerConfig {
            host: args.host,
            port: args.port,
            request_timeout_secs: args.request_timeout_secs,
        },
        workflow,
    );

    server.run().await.context("Server failed")?;
    Ok(())
}
