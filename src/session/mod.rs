//! Interactive session: owns the transcript and runs one question at a time.

pub mod transcript;

pub use transcript::{render_trace, render_transcript, Transcript};

use crate::agent::{self, AgentError};
use crate::config::SqlTalkConfig;
use crate::model::ChatModel;
use crate::tools::{ToolCatalog, ToolContext};
use crate::types::{Content, Role, Turn};
use crate::warehouse::Warehouse;
use tracing::info;

/// Per-session knobs taken from the configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub dataset_id: String,
    pub max_bytes_billed: u64,
    pub max_tool_calls: u32,
    pub include_history: bool,
}

impl SessionSettings {
    pub fn from_config(config: &SqlTalkConfig) -> Self {
        Self {
            dataset_id: config.dataset_id.clone(),
            max_bytes_billed: config.max_bytes_billed,
            max_tool_calls: config.max_tool_calls,
            include_history: config.include_history,
        }
    }
}

/// A chat session. The transcript lives here and nowhere else.
pub struct Session {
    settings: SessionSettings,
    catalog: ToolCatalog,
    transcript: Transcript,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            catalog: ToolCatalog::new(),
            transcript: Transcript::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Start over with an empty transcript.
    pub fn reset(&mut self) {
        info!("Session reset ({} turns dropped)", self.transcript.len());
        self.transcript.clear();
    }

    /// Answer one question and record both sides in the transcript.
    ///
    /// The user turn is recorded even when the exchange fails; the assistant
    /// turn only when the model produced an answer.
    pub async fn submit(
        &mut self,
        model: &dyn ChatModel,
        warehouse: &dyn Warehouse,
        question: &str,
    ) -> Result<&Turn, AgentError> {
        let history = if self.settings.include_history {
            self.history()
        } else {
            Vec::new()
        };

        self.transcript.append(Turn::user(question));

        let tool_ctx = ToolContext {
            warehouse,
            dataset_id: &self.settings.dataset_id,
            max_bytes_billed: self.settings.max_bytes_billed,
        };
        let exchange = agent::run_exchange(
            model,
            &self.catalog,
            &tool_ctx,
            history,
            question,
            self.settings.max_tool_calls,
        )
        .await?;

        Ok(self
            .transcript
            .append(Turn::assistant(exchange.answer, exchange.trace)))
    }

    /// Earlier answered questions, as alternating user/model messages.
    /// Questions whose exchange failed have no answer and are skipped.
    fn history(&self) -> Vec<Content> {
        let mut history = Vec::new();
        for pair in self.transcript.all().windows(2) {
            if pair[0].role == Role::User && pair[1].role == Role::Assistant {
                history.push(Content::user_text(pair[0].content.clone()));
                history.push(Content::model_text(pair[1].content.clone()));
            }
        }
        history
    }
}
