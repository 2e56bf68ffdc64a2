//! Deterministic language model stub.
//!
//! Replies come from a queue of canned responses, optionally preceded by
//! prompt-matching rules that answer every prompt containing a needle. Every
//! prompt received is recorded so tests can assert on exactly what the
//! workflow sent. Clones share the same script and recording.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{LanguageModel, LlmError, LlmResult};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure(String),
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<(String, Reply)>,
    queue: VecDeque<Reply>,
    prompts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedModel {
    /// A model that answers with `responses` in order.
    pub fn new<I, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let model = Self::default();
        for response in responses {
            model.push(response);
        }
        model
    }

    /// Queue one more response.
    pub fn push(&self, response: impl Into<String>) {
        self.lock().queue.push_back(Reply::Text(response.into()));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().queue.push_back(Reply::Failure(message.into()));
    }

    /// Answer every prompt containing `needle` with `response`.
    ///
    /// Rules are checked in insertion order before the queue.
    pub fn with_rule(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.lock()
            .rules
            .push((needle.into(), Reply::Text(response.into())));
        self
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panicking test thread must not hide the recorded prompts
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let mut script = self.lock();
        script.prompts.push(prompt.to_string());

        let ruled = script
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        let reply = match ruled {
            Some(reply) => Some(reply),
            None => script.queue.pop_front(),
        };

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(LlmError::Network(message)),
            None => Err(LlmError::InvalidResponse(
                "scripted model has no response left".to_string(),
            )),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
