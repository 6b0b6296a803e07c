use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use transit_core::Result;

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Per-request settings forwarded to completion agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub locale: String,
    pub session_id: String,
    pub user_id: String,
    pub is_authenticated: bool,
    pub timezone: String,
    pub route_explain_required: bool,
    pub time_tool_required: bool,
    pub prompt_profile: String,
    pub response_mode: String,
    pub max_context_tokens: usize,
    pub history_budget_tokens: usize,
}

/// Streaming text completion backed by an external model provider.
///
/// Chunks may carry `[[TOOL_TRACE]]`, `[[DECISION_TRACE]]` or
/// `[[STRUCTURED_DATA]]` prefixed JSON alongside answer text.
#[async_trait]
pub trait CompletionAgent: Send + Sync {
    /// Short label used in traces, e.g. `general` or `fast`.
    fn name(&self) -> &str;

    /// Provider label reported in structured payloads.
    fn provider(&self) -> &str {
        "unknown"
    }

    async fn process(
        &self,
        messages: Vec<Message>,
        ctx: RequestContext,
    ) -> Result<mpsc::Receiver<String>>;
}

/// Context a skill sees about the resolved request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillContext {
    pub node_id: Option<String>,
    pub node_name: Option<String>,
    pub locale: String,
    pub tags: Vec<String>,
    pub disrupted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillRequest {
    pub query: String,
    pub context: SkillContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResponse {
    pub content: String,
    pub category: String,
    pub confidence: f64,
    /// The answer is partial and should be refined by the LLM tier.
    pub needs_llm: bool,
}

/// Confidence-ranked plugin answers.
#[async_trait]
pub trait SkillRegistry: Send + Sync {
    /// Runs up to `max_candidates` skills scoring at least `min_confidence`,
    /// returning the first answer or `None` when nothing matched.
    async fn execute(
        &self,
        request: &SkillRequest,
        min_confidence: f64,
        max_candidates: usize,
    ) -> Result<Option<SkillResponse>>;
}
