use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use xq_core::{Completion, CompletionRequest, Error, Result, TextGenerator};

#[derive(Debug, Clone)]
enum Reply {
    Text { text: String, tokens: u64 },
    Fail(String),
}

/// Offline generator that plays back scripted replies in order and records prompts.
/// Once the script is exhausted every call fails.
pub struct DummyModel {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: impl Into<String>, tokens: u64) -> Self {
        self.lock_replies().push_back(Reply::Text {
            text: text.into(),
            tokens,
        });
        self
    }

    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.lock_replies().push_back(Reply::Fail(reason.into()));
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        match self.prompts.lock() {
            Ok(prompts) => prompts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl TextGenerator for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn model_id(&self) -> &str {
        "dummy"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.prompt.clone());

        match self.lock_replies().pop_front() {
            Some(Reply::Text { text, tokens }) => Ok(Completion {
                text,
                total_tokens: tokens,
            }),
            Some(Reply::Fail(reason)) => Err(Error::Inference(reason)),
            None => Err(Error::Inference("dummy model has no scripted reply".to_string())),
        }
    }
}
