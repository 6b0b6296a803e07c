use crate::agent::{Message, MessageRole};
use crate::prompt::DEFAULT_TIMEZONE;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOCALE: &str = "zh-TW";

/// Marker a client puts in a system message when a journey is already in progress.
const JOURNEY_MARKER: &str = "Journey:";

/// One chat turn as received from the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub client_now_iso: Option<String>,
    #[serde(default)]
    pub response_mode: Option<String>,
    #[serde(default)]
    pub token_profile: Option<String>,
    #[serde(default)]
    pub max_context_tokens: Option<usize>,
    #[serde(default)]
    pub history_budget_tokens: usize,
}

impl ProcessRequest {
    /// Single user message in `locale`.
    pub fn new(locale: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
            locale: locale.into(),
            ..Default::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_session(mut self, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.session_id = session_id.into();
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Content of the latest non-blank user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
    }

    pub fn has_journey_context(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == MessageRole::System && m.content.contains(JOURNEY_MARKER))
    }

    pub fn locale_or_default(&self) -> &str {
        let locale = self.locale.trim();
        if locale.is_empty() {
            DEFAULT_LOCALE
        } else {
            locale
        }
    }

    pub fn timezone_or_default(&self) -> &str {
        let tz = self.timezone.trim();
        if tz.is_empty() {
            DEFAULT_TIMEZONE
        } else {
            tz
        }
    }

    pub fn has_identity(&self) -> bool {
        !self.user_id.trim().is_empty() || !self.session_id.trim().is_empty()
    }
}
