use std::fmt;

use serde::Serialize;

use super::verdict::Verdict;

/// The record threaded through one proof run.
///
/// Created fresh for every question and discarded once the run ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProofState {
    pub question: String,
    /// Retrieved passages in rank order
    pub context: Vec<String>,
    /// Latest draft; every Draft step overwrites it
    pub proof: String,
    /// `None` until the first Verify step completes
    pub is_compliant: Option<bool>,
    pub verdict: Option<Verdict>,
    /// Number of Draft steps run so far
    pub drafts: u32,
}

impl ProofState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// Nodes of the proof workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Retrieve,
    Draft,
    Verify,
    Complete,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Retrieve => "retrieve",
            Step::Draft => "draft",
            Step::Verify => "verify",
            Step::Complete => "complete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The verifier accepted a draft
    Complete,
    /// `max_drafts` drafts were rejected; the last one is returned unverified
    RetriesExhausted,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::RetriesExhausted => "retries_exhausted",
        }
    }
}

/// One completed step, as seen by an observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    /// Drafts produced up to and including this step
    pub drafts: u32,
    pub detail: String,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub state: ProofState,
    pub status: RunStatus,
    pub trace: Vec<StepRecord>,
}

impl WorkflowOutcome {
    pub fn proof(&self) -> &str {
        &self.state.proof
    }

    pub fn is_compliant(&self) -> bool {
        self.state.is_compliant.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_unverified() {
        let state = ProofState::new("What is a subspace?");
        assert_eq!(state.question, "What is a subspace?");
        assert!(state.context.is_empty());
        assert!(state.proof.is_empty());
        assert_eq!(state.is_compliant, None);
        assert_eq!(state.verdict, None);
        assert_eq!(state.drafts, 0);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Step::Verify.to_string(), "verify");
        assert_eq!(RunStatus::RetriesExhausted.as_str(), "retries_exhausted");
        assert_eq!(
            serde_json::to_value(RunStatus::Complete).unwrap(),
            serde_json::json!("complete")
        );
    }
}
