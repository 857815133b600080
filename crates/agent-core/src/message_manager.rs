use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{AgentContext, AgentRequest, ConversationRole, ConversationTurn};
use crate::types::AgentOutput;
use action_registry::{ActionResult, BrowserStateSummary};

/// Rough token estimate: four characters per token, matching the teacher's
/// message manager heuristic since no tokenizer dependency is in scope here.
fn estimate_tokens(text: &str) -> u32 {
    ((text.chars().count() as f64) / 4.0).ceil() as u32
}

/// Strips a URL down to its host, for sensitive-data domain scoping. No
/// `url` crate is in the dependency tree, so this is a small manual parser:
/// drop the scheme, isolate the authority, drop userinfo and port.
fn extract_host(url: &str) -> Option<&str> {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let authority = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };
    let host = authority.split(':').next().unwrap_or(authority);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Whether `host` is covered by a domain `pattern` (`example.com` exact, or
/// `*.example.com` for the domain and any subdomain), SPEC_FULL.md §6.
fn domain_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => host == suffix || host.ends_with(&format!(".{suffix}")),
        None => pattern == host,
    }
}

/// One entry in the running conversation sent to the LLM. `tokens` is
/// computed once at insertion time so `total_tokens()` stays O(1)
/// (SPEC_FULL.md §4.4, testable property P2/P3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: ConversationRole,
    pub content: String,
    pub tokens: u32,
    /// State messages are replaced by the next state message on the next
    /// step; everything else is permanent (SPEC_FULL.md §4.4
    /// `remove_last_state_message`).
    pub is_state_message: bool,
    /// Base64 screenshot attached to a state message when vision is enabled
    /// (SPEC_FULL.md §6 `use_vision`). Text-only adapters can ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

impl HistoryItem {
    fn new(role: ConversationRole, content: String, is_state_message: bool, image_base64: Option<String>) -> Self {
        let tokens = estimate_tokens(&content);
        Self {
            role,
            content,
            tokens,
            is_state_message,
            image_base64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageManagerState {
    pub history: Vec<HistoryItem>,
    pub total_tokens: u32,
}

/// Which step this is, out of how many, rendered into the state message so
/// the model knows how much budget remains (SPEC_FULL.md §4.7.2 step 9).
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    pub step_number: u32,
    pub max_steps: u32,
}

/// Builds and trims the message list handed to the LLM each step. Grounded
/// on the teacher's `message_manager.rs`, extended with token accounting so
/// `cut_messages` can actually enforce `AgentSettings::max_input_tokens`
/// (SPEC_FULL.md §4.4).
#[derive(Debug)]
pub struct MessageManager {
    state: MessageManagerState,
    goal: String,
    sensitive_data: HashMap<String, HashMap<String, String>>,
}

impl Default for MessageManager {
    fn default() -> Self {
        Self {
            state: MessageManagerState::default(),
            goal: String::new(),
            sensitive_data: HashMap::new(),
        }
    }
}

impl MessageManager {
    pub fn new(request: &AgentRequest) -> Self {
        let mut manager = Self {
            goal: request.goal.clone(),
            sensitive_data: request.sensitive_data.clone(),
            ..Self::default()
        };
        manager.push(ConversationRole::System, format!("Task goal: {}", request.goal), false);
        for turn in &request.conversation {
            manager.push(turn.role, turn.message.clone(), false);
        }
        if let Some(context) = &request.context {
            manager.push_context(context);
        }
        manager
    }

    fn push(&mut self, role: ConversationRole, content: impl Into<String>, is_state_message: bool) {
        self.push_full(role, content, is_state_message, None);
    }

    fn push_full(
        &mut self,
        role: ConversationRole,
        content: impl Into<String>,
        is_state_message: bool,
        image_base64: Option<String>,
    ) {
        let item = HistoryItem::new(role, content.into(), is_state_message, image_base64);
        self.state.total_tokens += item.tokens;
        self.state.history.push(item);
    }

    fn push_context(&mut self, context: &AgentContext) {
        if !context.memory_hints.is_empty() {
            self.push(
                ConversationRole::System,
                format!("Memory hints: {}", context.memory_hints.join("; ")),
                false,
            );
        }
    }

    /// Injects credentials scoped to `current_url`'s host as a dedicated
    /// system turn, rather than interpolating secrets into the goal text
    /// (resolved Open Question, SPEC_FULL.md §6, §9). A no-op when nothing
    /// is configured or nothing matches the current domain.
    pub fn add_sensitive_data(&mut self, current_url: &str) {
        let Some(host) = extract_host(current_url) else {
            return;
        };
        let mut lines: Vec<String> = self
            .sensitive_data
            .iter()
            .filter(|(pattern, _)| domain_matches(pattern, host))
            .flat_map(|(_, entries)| entries.iter().map(|(k, v)| format!("{k}={v}")))
            .collect();
        if lines.is_empty() {
            return;
        }
        lines.sort();
        self.push(
            ConversationRole::System,
            format!("Sensitive data (reference by name only):\n{}", lines.join("\n")),
            false,
        );
    }

    /// Replaces the previous browser-state message (if any) with a fresh
    /// one, so the LLM only ever sees the latest DOM snapshot
    /// (SPEC_FULL.md §4.7.2 step 9, §6 `include_attributes`/`use_vision`).
    pub fn add_state_message(
        &mut self,
        state: &BrowserStateSummary,
        last_results: &[ActionResult],
        step_info: StepInfo,
        use_vision: bool,
        include_attributes: &[String],
    ) {
        self.remove_last_state_message();

        let element_lines: Vec<String> = state
            .selector_map
            .iter()
            .map(|(index, el)| {
                let attrs: Vec<String> = include_attributes
                    .iter()
                    .filter_map(|name| el.attributes.get(name).map(|v| format!(" {name}=\"{v}\"")))
                    .collect();
                format!(
                    "Index: {index}, Tag: {}{} \"{}\"",
                    el.tag_name,
                    attrs.join(""),
                    el.text
                )
            })
            .collect();

        let last_action_line = match last_results.last() {
            Some(r) if r.success => format!("Last action succeeded: {}", r.action_name),
            Some(r) => format!(
                "Last action failed: {} ({})",
                r.action_name,
                r.error.as_deref().unwrap_or("unknown error")
            ),
            None => "No previous action.".to_string(),
        };

        let content = format!(
            "Task: {}\nURL: {}\nTitle: {}\n{last_action_line}\nInteractive elements:\n{}\nStep {} of {}",
            self.goal,
            state.url,
            state.title,
            element_lines.join("\n"),
            step_info.step_number,
            step_info.max_steps,
        );

        let image = if use_vision {
            state.screenshot_base64.clone()
        } else {
            None
        };
        self.push_full(ConversationRole::User, content, true, image);
    }

    pub fn add_model_output(&mut self, output: &AgentOutput) {
        let content = serde_json::to_string(output).unwrap_or_default();
        self.push(ConversationRole::Assistant, content, false);
    }

    pub fn add_plan(&mut self, plan: impl Into<String>) {
        self.push(ConversationRole::System, format!("Plan: {}", plan.into()), false);
    }

    pub fn add_new_task(&mut self, task: impl Into<String>) {
        self.push(ConversationRole::User, format!("New task: {}", task.into()), false);
    }

    /// Appends a directive constraining the next response to a single
    /// `done` action, issued on the final step of the budget
    /// (SPEC_FULL.md §4.7.2 step 9).
    pub fn add_final_step_directive(&mut self) {
        self.push(
            ConversationRole::System,
            "This is the final step. You must call `done` now with your best available result.".to_string(),
            false,
        );
    }

    pub fn remove_last_state_message(&mut self) {
        if let Some(last) = self.state.history.last() {
            if last.is_state_message {
                let removed = self.state.history.pop().unwrap();
                self.state.total_tokens = self.state.total_tokens.saturating_sub(removed.tokens);
            }
        }
    }

    pub fn get_messages(&self) -> &[HistoryItem] {
        &self.state.history
    }

    pub fn total_tokens(&self) -> u32 {
        self.state.total_tokens
    }

    /// Drops the oldest non-system messages until the running total fits
    /// under `max_tokens`, preserving the first system turn and the most
    /// recent state message (SPEC_FULL.md §4.4, property P2).
    pub fn cut_messages(&mut self, max_tokens: u32) {
        if self.state.total_tokens <= max_tokens {
            return;
        }
        let mut index = 1usize;
        while self.state.total_tokens > max_tokens && index < self.state.history.len().saturating_sub(1) {
            if self.state.history[index].is_state_message {
                index += 1;
                continue;
            }
            let removed = self.state.history.remove(index);
            self.state.total_tokens = self.state.total_tokens.saturating_sub(removed.tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_registry::single_tab;

    fn step(n: u32) -> StepInfo {
        StepInfo { step_number: n, max_steps: 10 }
    }

    #[test]
    fn state_message_replaces_previous_one() {
        let request = AgentRequest::new("t1", "search flights");
        let mut manager = MessageManager::new(&request);
        let state = single_tab("https://example.com", "Example");
        manager.add_state_message(&state, &[], step(1), false, &[]);
        let before = manager.get_messages().len();
        manager.add_state_message(&state, &[], step(2), false, &[]);
        assert_eq!(manager.get_messages().len(), before);
    }

    #[test]
    fn cut_messages_respects_token_budget() {
        let mut request = AgentRequest::new("t1", "search flights");
        for i in 0..50 {
            request.push_turn(ConversationRole::User, format!("padding message number {i} with extra words to inflate size"));
        }
        let mut manager = MessageManager::new(&request);
        let before = manager.total_tokens();
        manager.cut_messages(20);
        assert!(manager.total_tokens() <= before);
    }

    #[test]
    fn sensitive_data_is_injected_for_a_matching_domain() {
        let mut request = AgentRequest::new("t1", "log in");
        let mut creds = HashMap::new();
        creds.insert("username".to_string(), "alice".to_string());
        request.sensitive_data.insert("example.com".to_string(), creds);
        let mut manager = MessageManager::new(&request);
        manager.add_sensitive_data("https://example.com/login");
        assert!(manager
            .get_messages()
            .iter()
            .any(|m| m.content.contains("username=alice")));
    }

    #[test]
    fn sensitive_data_is_not_injected_for_a_non_matching_domain() {
        let mut request = AgentRequest::new("t1", "log in");
        let mut creds = HashMap::new();
        creds.insert("username".to_string(), "alice".to_string());
        request.sensitive_data.insert("example.com".to_string(), creds);
        let mut manager = MessageManager::new(&request);
        manager.add_sensitive_data("https://attacker.example/login");
        assert!(!manager
            .get_messages()
            .iter()
            .any(|m| m.content.contains("username=alice")));
    }

    #[test]
    fn wildcard_domain_pattern_covers_subdomains() {
        let mut request = AgentRequest::new("t1", "log in");
        let mut creds = HashMap::new();
        creds.insert("token".to_string(), "abc123".to_string());
        request.sensitive_data.insert("*.example.com".to_string(), creds);
        let mut manager = MessageManager::new(&request);
        manager.add_sensitive_data("https://accounts.example.com/login");
        assert!(manager
            .get_messages()
            .iter()
            .any(|m| m.content.contains("token=abc123")));
    }

    #[test]
    fn state_message_lists_only_the_configured_attributes() {
        let request = AgentRequest::new("t1", "search flights");
        let mut manager = MessageManager::new(&request);
        let mut state = single_tab("https://example.com", "Example");
        state.selector_map.insert(
            "0".to_string(),
            action_registry::DomHistoryElement {
                node_id: "n0".to_string(),
                highlight_index: 0,
                tag_name: "input".to_string(),
                attributes: [("placeholder".to_string(), "Email".to_string()), ("style".to_string(), "color:red".to_string())]
                    .into_iter()
                    .collect(),
                text: String::new(),
                bounding_box: Default::default(),
                branch_path_hash: "h0".to_string(),
            },
        );
        manager.add_state_message(&state, &[], step(1), false, &["placeholder".to_string()]);
        let content = &manager.get_messages().last().unwrap().content;
        assert!(content.contains("placeholder=\"Email\""));
        assert!(!content.contains("style"));
    }
}
