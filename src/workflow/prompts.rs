//! Prompt templates for the Draft and Verify steps.

/// Passages are separated by a blank line inside prompts.
pub fn format_context(context: &[String]) -> String {
    context.join("\n\n")
}

/// Prompt asking the model for a proof grounded in `context`.
pub fn draft_prompt(question: &str, context: &[String]) -> String {
    format!(
        "You are an expert mathematics tutor specialising in linear algebra.\n\
         Answer the student's question using ONLY the definitions and theorems \
         in the context below.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Student Question: {question}\n\
         \n\
         Write a rigorous, step-by-step proof or explanation. If the context does \
         not contain enough information to answer completely, say explicitly \
         which definitions or theorems are missing. Use LaTeX for all \
         mathematical notation.",
        context = format_context(context),
        question = question,
    )
}

/// Prompt asking the model to grade `proof` against `context`.
pub fn verification_prompt(proof: &str, context: &[String]) -> String {
    format!(
        "You are a mathematics professor grading a student's proof.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Proof:\n\
         {proof}\n\
         \n\
         Grade the proof against two criteria:\n\
         1. It reaches the correct conclusion.\n\
         2. It uses no definitions or theorems that are absent from the context. \
         Basic algebra is allowed.\n\
         \n\
         Respond with exactly one word: YES or NO.",
        context = format_context(context),
        proof = proof,
    )
}
