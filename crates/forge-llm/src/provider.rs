//! LLM provider trait

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;

/// A chat-completion backend the crew runs against.
///
/// Implementations must be cheap to share behind an `Arc` — one provider
/// instance serves every agent in a run.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get available models
    fn available_models(&self) -> Vec<String>;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
