//! Parsing of the grader's YES/NO answer.

use serde::{Deserialize, Serialize};

/// Outcome of one verification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The grader answered YES
    Compliant,
    /// The grader answered NO
    NonCompliant,
    /// The answer was neither a clear YES nor a clear NO
    Ambiguous,
}

impl Verdict {
    pub fn is_compliant(self) -> bool {
        self == Verdict::Compliant
    }
}

/// How the grader's raw text is turned into a [`Verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// The whole answer must be the single token YES or NO, ignoring case,
    /// surrounding quotes, markdown emphasis and trailing punctuation.
    /// Anything else is `Ambiguous`.
    #[default]
    Strict,
    /// Compliant iff the uppercased answer contains `YES` anywhere.
    /// Never yields `Ambiguous`.
    Substring,
}

impl VerdictPolicy {
    pub fn parse(self, response: &str) -> Verdict {
        match self {
            VerdictPolicy::Strict => parse_strict(response),
            VerdictPolicy::Substring => {
                if response.to_uppercase().contains("YES") {
                    Verdict::Compliant
                } else {
                    Verdict::NonCompliant
                }
            }
        }
    }
}

fn parse_strict(response: &str) -> Verdict {
    let token = response
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '*' | '_' | '.' | '!'))
        .to_uppercase();

    match token.as_str() {
        "YES" => Verdict::Compliant,
        "NO" => Verdict::NonCompliant,
        _ => Verdict::Ambiguous,
    }
}
