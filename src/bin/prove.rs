//! Command-line proof runner.
//!
//! Runs one question through the workflow and prints every step as it
//! completes, followed by the final proof.
//!
//! ```bash
//! GROQ_API_KEY=gsk_... prove "Prove that the intersection of two subspaces is a subspace."
//! ```

use anyhow::{Context, Result};
use axlerate::{
    config::{init_logging, LlmArgs, StoreArgs, WorkflowArgs},
    workflow::{ProofWorkflow, RunStatus, Step, StepRecord},
};
use clap::Parser;

/// Run the proof workflow once from the command line
#[derive(Parser, Debug)]
#[command(name = "prove", version, about = "Draft and verify a proof for one question")]
struct Args {
    /// The question to answer
    #[arg(value_name = "QUESTION")]
    question: String,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    llm: LlmArgs,

    #[command(flatten)]
    workflow: WorkflowArgs,

    /// Print the retrieved context before the proof
    #[arg(long)]
    show_context: bool,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

fn print_step(record: &StepRecord) {
    let marker = match record.step {
        Step::Complete => "✓",
        _ => "→",
    };
    println!("{} {:<9} {}", marker, record.step.as_str(), record.detail);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    let model = args.llm.build_client().context("Failed to configure the language model")?;
    let config = args.workflow.to_config().context("Invalid workflow options")?;
    let store = args
        .store
        .open_store()
        .await
        .context("Failed to open the knowledge base")?;

    let workflow = ProofWorkflow::new(store, model, config);
    let outcome = workflow
        .run_observed(&args.question, print_step)
        .await
        .context("Proof workflow failed")?;

    if args.show_context {
        println!("\nContext:");
        for (idx, passage) in outcome.state.context.iter().enumerate() {
            println!("[{}] {}", idx + 1, passage);
        }
    }

    println!("\n{}", "═".repeat(80));
    println!("{}", outcome.proof());
    println!("{}", "═".repeat(80));

    match outcome.status {
        RunStatus::Complete => println!("Verified after {} draft(s)", outcome.state.drafts),
        RunStatus::RetriesExhausted => println!(
            "Not verified: all {} draft(s) were rejected (last verdict: {:?})",
            outcome.state.drafts,
            outcome.state.verdict
        ),
    }

    Ok(())
}
