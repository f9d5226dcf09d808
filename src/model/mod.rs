pub mod gemini;

pub use gemini::GeminiClient;

use crate::tools::ToolSpec;
use crate::types::{Content, ModelResponse};
use anyhow::Result;
use async_trait::async_trait;

/// A generative model that can answer or request one of the given tools.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn name(&self) -> &str;

    /// Send the conversation so far and get the model's next move.
    async fn generate(&self, conversation: &[Content], tools: &[ToolSpec]) -> Result<ModelResponse>;
}
