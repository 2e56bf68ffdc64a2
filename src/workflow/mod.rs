//! Proof workflow engine.
//!
//! A run walks a small state machine:
//!
//! ```text
//! Retrieve -> Draft -> Verify -> Complete
//!               ^         |
//!               +- retry -+
//! ```
//!
//! Retrieve fills the context once. Draft asks the language model for a proof
//! using only that context, Verify asks it to grade the draft, and the router
//! either accepts the draft or sends the run back to Draft. Every run is
//! bounded by `max_drafts`; when the last draft is rejected the run ends with
//! [`RunStatus::RetriesExhausted`] and returns that draft unverified.

pub mod prompts;
pub mod state;
pub mod verdict;

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{LanguageModel, LlmError};
use crate::query::{PassageRetriever, QueryError};

pub use state::{ProofState, RunStatus, Step, StepRecord, WorkflowOutcome};
pub use verdict::{Verdict, VerdictPolicy};

/// Context entry used when retrieval finds nothing.
pub const NO_CONTEXT_FOUND: &str = "No relevant context was found in the knowledge base.";

/// Default number of passages retrieved per question.
pub const DEFAULT_RETRIEVAL_K: usize = 3;

/// Default bound on Draft steps per run.
pub const DEFAULT_MAX_DRAFTS: u32 = 3;

/// Errors that abort a proof run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The question was empty or whitespace
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The vector store could not be queried
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] QueryError),

    /// A Draft or Verify call to the language model failed
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
}

/// Result type for workflow runs.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Tunables for [`ProofWorkflow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Passages requested from the retriever
    pub retrieval_k: usize,
    /// Maximum Draft steps per run, at least 1
    pub max_drafts: u32,
    /// Drop passages whose text repeats an earlier one
    pub dedup_context: bool,
    pub verdict_policy: VerdictPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retrieval_k: DEFAULT_RETRIEVAL_K,
            max_drafts: DEFAULT_MAX_DRAFTS,
            dedup_context: true,
            verdict_policy: VerdictPolicy::Strict,
        }
    }
}

/// Retrieve, draft and verify a proof for one question at a time.
///
/// The workflow holds no per-run state, so a single instance can serve many
/// concurrent runs behind an `Arc`.
pub struct ProofWorkflow<R, M>
where
    R: PassageRetriever,
    M: LanguageModel,
{
    retriever: R,
    model: M,
    config: WorkflowConfig,
}

impl<R, M> ProofWorkflow<R, M>
where
    R: PassageRetriever,
    M: LanguageModel,
{
    pub fn new(retriever: R, model: M, mut config: WorkflowConfig) -> Self {
        config.max_drafts = config.max_drafts.max(1);
        Self {
            retriever,
            model,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run the workflow for `question` until it completes or runs out of drafts.
    pub async fn run(&self, question: &str) -> WorkflowResult<WorkflowOutcome> {
        self.run_observed(question, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `observer` after every completed step.
    pub async fn run_observed<F>(
        &self,
        question: &str,
        mut observer: F,
    ) -> WorkflowResult<WorkflowOutcome>
    where
        F: FnMut(&StepRecord) + Send,
    {
        let question = question.trim();
        if question.is_empty() {
            return Err(WorkflowError::EmptyQuestion);
        }

        let mut state = ProofState::new(question);
        let mut trace = Vec::new();
        let mut step = Step::Retrieve;

        loop {
            let (detail, next) = match step {
                Step::Retrieve => (self.retrieve(&mut state).await?, Some(Step::Draft)),
                Step::Draft => (self.draft(&mut state).await?, Some(Step::Verify)),
                Step::Verify => {
                    let detail = self.verify(&mut state).await?;
                    (detail, self.route(&state))
                }
                Step::Complete => (format!("accepted after {} draft(s)", state.drafts), None),
            };

            let record = StepRecord {
                step,
                drafts: state.drafts,
                detail,
            };
            observer(&record);
            trace.push(record);

            match next {
                Some(next) => step = next,
                None => break,
            }
        }

        let status = if state.is_compliant == Some(true) {
            RunStatus::Complete
        } else {
            RunStatus::RetriesExhausted
        };
        info!(
            "Proof run finished: status={}, drafts={}",
            status.as_str(),
            state.drafts
        );

        Ok(WorkflowOutcome {
            state,
            status,
            trace,
        })
    }

    async fn retrieve(&self, state: &mut ProofState) -> WorkflowResult<String> {
        let passages = self
            .retriever
            .retrieve(&state.question, self.config.retrieval_k)
            .await?;
        let fetched = passages.len();

        let mut context = if self.config.dedup_context {
            dedup_preserving_order(passages)
        } else {
            passages
        };
        if context.is_empty() {
            context.push(NO_CONTEXT_FOUND.to_string());
        }

        info!(
            "Retrieved {} passage(s), {} kept as context",
            fetched,
            context.len()
        );
        state.context = context;

        Ok(format!("{} passage(s) in context", state.context.len()))
    }

    async fn draft(&self, state: &mut ProofState) -> WorkflowResult<String> {
        let prompt = prompts::draft_prompt(&state.question, &state.context);
        debug!("Draft prompt is {} bytes", prompt.len());

        state.proof = self.model.complete(&prompt).await?;
        state.drafts += 1;

        info!(
            "Draft {} of at most {} produced ({} bytes)",
            state.drafts,
            self.config.max_drafts,
            state.proof.len()
        );
        Ok(format!("draft {} ({} bytes)", state.drafts, state.proof.len()))
    }

    async fn verify(&self, state: &mut ProofState) -> WorkflowResult<String> {
        let prompt = prompts::verification_prompt(&state.proof, &state.context);
        debug!("Verification prompt is {} bytes", prompt.len());

        let response = self.model.complete(&prompt).await?;
        let verdict = self.config.verdict_policy.parse(&response);
        if verdict == Verdict::Ambiguous {
            warn!(
                "Verifier gave an ambiguous answer for draft {}: {:?}",
                state.drafts,
                response.trim()
            );
        }

        state.verdict = Some(verdict);
        state.is_compliant = Some(verdict.is_compliant());

        info!("Draft {} verdict: {:?}", state.drafts, verdict);
        Ok(format!("verdict {:?}", verdict))
    }

    /// Step that follows a Verify, or `None` when the run is out of drafts.
    fn route(&self, state: &ProofState) -> Option<Step> {
        if state.is_compliant == Some(true) {
            Some(Step::Complete)
        } else if state.drafts < self.config.max_drafts {
            info!("Draft {} rejected, retrying", state.drafts);
            Some(Step::Draft)
        } else {
            warn!(
                "All {} draft(s) rejected, returning the last one unverified",
                state.drafts
            );
            None
        }
    }
}

fn dedup_preserving_order(passages: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|passage| seen.insert(passage.clone()))
        .collect()
}
