use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soulbrowser_core_types::{PageId, SessionId};

/// Role of one turn in the conversation fed to the agent (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: ConversationRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Session-scoped context carried alongside a request: which browser
/// session/page the agent should act within, plus free-form preferences and
/// memory hints (SPEC_FULL.md §3 AgentContext).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub preferences: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory_hints: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl AgentContext {
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_page(mut self, page: PageId) -> Self {
        self.page = Some(page);
        self
    }
}

/// Top-level envelope handed to `AgentCore::run` (SPEC_FULL.md §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub task_id: String,
    pub goal: String,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AgentContext>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub constraints: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Domain pattern (`example.com` or `*.example.com`) to key=value
    /// credential map, injected as a dedicated system turn scoped to the
    /// current page's host rather than interpolated into the goal text
    /// (resolved Open Question, SPEC_FULL.md §6, §9).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub sensitive_data: HashMap<String, HashMap<String, String>>,
}

impl AgentRequest {
    pub fn new(task_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            goal: goal.into(),
            conversation: Vec::new(),
            context: None,
            constraints: HashMap::new(),
            metadata: HashMap::new(),
            sensitive_data: HashMap::new(),
        }
    }

    pub fn with_context(mut self, context: AgentContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn push_turn(&mut self, role: ConversationRole, message: impl Into<String>) {
        self.conversation.push(ConversationTurn::new(role, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_turn_appends_in_order() {
        let mut request = AgentRequest::new("t1", "book a flight");
        request.push_turn(ConversationRole::User, "to Paris please");
        request.push_turn(ConversationRole::Assistant, "looking now");
        assert_eq!(request.conversation.len(), 2);
        assert_eq!(request.conversation[0].role, ConversationRole::User);
    }
}
