use async_trait::async_trait;
use std::fmt;

use crate::Result;

/// A single user-role prompt sent to a text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Reported usage; 0 when the service omitted it.
    pub total_tokens: u64,
}

#[async_trait]
pub trait TextGenerator: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Identifier recorded in run metadata.
    fn model_id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
