//! Function-calling loop: Ask → Execute → Feed back.
//!
//! One exchange answers one user question:
//! 1. Send the conversation and the tool catalog to the model
//! 2. If the model asks for a tool, run it and append the result
//! 3. Repeat until the model answers in text
//!
//! Tool calls run strictly one after another; each result is in the
//! conversation before the model is called again.

use crate::agent::prompt;
use crate::model::ChatModel;
use crate::tools::{self, ToolCatalog, ToolContext};
use crate::types::*;
use tracing::{info, warn};

/// Why an exchange ended without an answer.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Model call failed: {0:#}")]
    Model(anyhow::Error),

    #[error("Tool-call budget exhausted after {limit} calls")]
    ToolBudgetExhausted { limit: u32, trace: CallTrace },
}

/// The outcome of one exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub answer: String,
    pub trace: CallTrace,
    pub usage: TokenUsage,
}

enum LoopState {
    AwaitingModel,
    ExecutingTool(ToolCallRequest),
    Done(String),
}

/// Drive the model until it answers `question` in text.
///
/// `history` is prior context placed before the question. At most
/// `max_tool_calls` tools are executed; a further request aborts the
/// exchange with [`AgentError::ToolBudgetExhausted`].
pub async fn run_exchange(
    model: &dyn ChatModel,
    catalog: &ToolCatalog,
    tool_ctx: &ToolContext<'_>,
    history: Vec<Content>,
    question: &str,
    max_tool_calls: u32,
) -> Result<Exchange, AgentError> {
    info!("Starting exchange with model '{}'", model.name());

    let mut conversation = history;
    conversation.push(Content::user_text(prompt::with_instructions(question)));

    let mut trace = CallTrace::new();
    let mut usage = TokenUsage::default();
    let mut state = LoopState::AwaitingModel;

    loop {
        state = match state {
            LoopState::AwaitingModel => {
                let response = model
                    .generate(&conversation, catalog.specs())
                    .await
                    .map_err(AgentError::Model)?;
                usage.add(&response.usage);

                match response.reply {
                    ModelReply::FinalText(text) => LoopState::Done(text),
                    ModelReply::ToolCall(request) => {
                        if trace.len() >= max_tool_calls as usize {
                            warn!(
                                "Model requested '{}' after {} tool calls; giving up",
                                request.name, max_tool_calls
                            );
                            return Err(AgentError::ToolBudgetExhausted {
                                limit: max_tool_calls,
                                trace,
                            });
                        }
                        conversation.push(Content::model_call(&request));
                        LoopState::ExecutingTool(request)
                    }
                }
            }
            LoopState::ExecutingTool(request) => {
                let step = trace.len() + 1;
                info!("[Step {}] Tool: {}({})", step, request.name, request.arguments);

                let result = tools::execute_tool(tool_ctx, catalog, &request).await;
                if result.success {
                    info!(
                        "[Step {}] Tool result: {} chars",
                        step,
                        result.payload.to_string().len()
                    );
                } else {
                    warn!("[Step {}] Tool error: {}", step, result.payload);
                }

                conversation.push(Content::function_response(&result));
                trace.push(result);
                LoopState::AwaitingModel
            }
            LoopState::Done(answer) => {
                info!(
                    "Exchange finished after {} tool calls ({} tokens)",
                    trace.len(),
                    usage.total_tokens
                );
                return Ok(Exchange {
                    answer,
                    trace,
                    usage,
                });
            }
        };
    }
}
