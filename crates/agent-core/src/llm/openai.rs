use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AgentCoreError;
use crate::history::AgentHistoryList;
use crate::message_manager::MessageManager;
use crate::model::ConversationRole;
use crate::types::AgentOutput;

use super::provider::{LlmProvider, ToolCallingMethod};

/// Configuration for one OpenAI-compatible endpoint. `api_keys` supports
/// multiple keys so a 429 on one rotates to the next, same failover scheme
/// as the teacher's adapter.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

pub struct OpenAiLlmProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
    resolved_method: std::sync::OnceLock<ToolCallingMethod>,
}

impl OpenAiLlmProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("reqwest client build should not fail with default TLS settings");
        Self { client, config, resolved_method: std::sync::OnceLock::new() }
    }

    fn build_system_prompt(&self) -> String {
        "You are a browser automation agent. Respond with a single JSON object \
         containing `page_summary`, `evaluation_previous_goal`, `memory`, `next_goal`, \
         and `actions` (a list of one or more `{action_name: {params...}}` objects). \
         The last action in a step may be `done` to end the task."
            .to_string()
    }

    fn build_user_message(&self, goal: &str, messages: &MessageManager) -> String {
        let mut rendered = format!("Goal: {goal}\n\n");
        for item in messages.get_messages() {
            let prefix = match item.role {
                ConversationRole::User => "User",
                ConversationRole::Assistant => "Assistant",
                ConversationRole::System => "System",
            };
            rendered.push_str(&format!("[{prefix}] {}\n", item.content));
        }
        rendered
    }

    /// Sends one chat-completion request, rotating through configured API
    /// keys on 429 or transport failure, and returns the raw response
    /// content (pre-JSON-parse). Shared by `invoke` and `probe_method`.
    async fn complete_raw(&self, system_prompt: &str, user_message: &str) -> Result<String, AgentCoreError> {
        if self.config.api_keys.is_empty() {
            return Err(AgentCoreError::llm_failure("no API keys configured"));
        }

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        };

        let mut last_error = String::new();
        for api_key in &self.config.api_keys {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.config.api_base))
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            if response.status().as_u16() == 429 {
                warn!("openai rate limit hit, rotating to next api key");
                last_error = "rate limited (429)".to_string();
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                last_error = format!("http {status}: {body}");
                continue;
            }

            let completion: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| AgentCoreError::llm_failure(format!("invalid completion response: {e}")))?;

            let content = completion
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .ok_or_else(|| AgentCoreError::llm_failure("completion returned no choices"))?;

            return Ok(content);
        }

        Err(AgentCoreError::llm_failure(format!(
            "all configured api keys exhausted: {last_error}"
        )))
    }

    async fn invoke(&self, system_prompt: &str, user_message: &str) -> Result<AgentOutput, AgentCoreError> {
        let content = self.complete_raw(system_prompt, user_message).await?;
        parse_agent_output(&content)
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlmProvider {
    async fn decide(
        &self,
        goal: &str,
        messages: &MessageManager,
        _history: &AgentHistoryList,
    ) -> Result<AgentOutput, AgentCoreError> {
        let system_prompt = self.build_system_prompt();
        let user_message = self.build_user_message(goal, messages);
        self.invoke(&system_prompt, &user_message).await
    }

    fn library_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn cached_tool_calling_method(&self) -> Option<ToolCallingMethod> {
        self.resolved_method.get().copied()
    }

    fn cache_tool_calling_method(&self, method: ToolCallingMethod) {
        self.resolved_method.set(method).ok();
    }

    /// This adapter only ever speaks the `json_object` response-format wire
    /// protocol, so structured `function_calling`/`tools` methods always
    /// fail to probe, letting negotiation fall through to `json_mode`/`raw`
    /// (SPEC_FULL.md §4.5b).
    async fn probe_method(&self, method: ToolCallingMethod) -> Result<bool, AgentCoreError> {
        match method {
            ToolCallingMethod::FunctionCalling | ToolCallingMethod::Tools => Ok(false),
            ToolCallingMethod::JsonMode => {
                let prompt = "Respond with exactly this JSON object and nothing else: {\"answer\": \"PONG\"}";
                let content = self.complete_raw("Answer with JSON only.", prompt).await?;
                Ok(strip_think_tags(&content).contains("PONG"))
            }
            ToolCallingMethod::Raw => {
                let prompt = "Respond with exactly this JSON object and nothing else: {\"answer\": \"PONG\"}";
                let content = self.complete_raw("Answer with JSON only, no markdown.", prompt).await?;
                Ok(strip_think_tags(&content).contains("PONG"))
            }
        }
    }
}

/// Removes `<think>...</think>` reasoning spans some open-weight models
/// emit before their answer, including a stray closing tag with no matching
/// opener (SPEC_FULL.md §4.5c).
fn strip_think_tags(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    loop {
        match rest.find("<think>") {
            Some(start) => {
                result.push_str(&rest[..start]);
                let after_open = &rest[start + "<think>".len()..];
                match after_open.find("</think>") {
                    Some(end) => {
                        rest = &after_open[end + "</think>".len()..];
                    }
                    None => {
                        rest = "";
                    }
                }
            }
            None => {
                result.push_str(rest);
                rest = "";
                break;
            }
        }
        if rest.is_empty() {
            break;
        }
    }
    if let Some(idx) = result.find("</think>") {
        result.replace_range(..idx + "</think>".len(), "");
    }
    result
}

/// Returns the inner text of the first fenced ` ```json ` block, if any.
fn extract_fenced_json(s: &str) -> Option<&str> {
    let start = s.find("```json")?;
    let body_start = start + "```json".len();
    let end = s[body_start..].find("```")?;
    Some(s[body_start..body_start + end].trim())
}

/// Extracts the first balanced `{...}` substring and parses it as an
/// `AgentOutput`, tolerating models that wrap JSON in prose, `<think>`
/// reasoning spans, or code fences (SPEC_FULL.md §4.5c).
fn parse_agent_output(raw: &str) -> Result<AgentOutput, AgentCoreError> {
    let stripped = strip_think_tags(raw);
    let search_text = extract_fenced_json(&stripped).unwrap_or(stripped.as_str());

    let start = search_text
        .find('{')
        .ok_or_else(|| AgentCoreError::llm_failure("model response contained no JSON object"))?;
    let mut depth = 0i32;
    let mut end = None;
    for (offset, ch) in search_text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end.ok_or_else(|| AgentCoreError::llm_failure("unbalanced JSON object in model response"))?;
    serde_json::from_str(&search_text[start..end])
        .map_err(|e| AgentCoreError::llm_failure(format!("failed to parse model JSON: {e}")))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = r#"{"page_summary": "a page", "evaluation_previous_goal": "ok", "memory": "", "next_goal": "continue", "actions": [{"refresh": {}}]}"#;

    #[test]
    fn parse_agent_output_tolerates_surrounding_prose() {
        let raw = format!("Sure, here you go:\n```json\n{SAMPLE_OUTPUT}\n```");
        let output = parse_agent_output(&raw).unwrap();
        assert_eq!(output.actions.len(), 1);
    }

    #[test]
    fn parse_agent_output_rejects_missing_json() {
        let err = parse_agent_output("no json here").unwrap_err();
        assert!(matches!(err, AgentCoreError::LlmFailure(_)));
    }

    #[test]
    fn parse_agent_output_strips_think_tags_before_parsing() {
        let raw = format!("<think>let me consider the page state</think>\n{SAMPLE_OUTPUT}");
        let output = parse_agent_output(&raw).unwrap();
        assert_eq!(output.actions.len(), 1);
    }

    #[test]
    fn parse_agent_output_handles_stray_closing_think_tag() {
        let raw = format!("reasoning leaked here</think>\n{SAMPLE_OUTPUT}");
        let output = parse_agent_output(&raw).unwrap();
        assert_eq!(output.actions.len(), 1);
    }

    #[test]
    fn parse_agent_output_prefers_fenced_json_over_stray_braces() {
        let raw = format!("note: the config uses {{}} for empty blocks\n```json\n{SAMPLE_OUTPUT}\n```");
        let output = parse_agent_output(&raw).unwrap();
        assert_eq!(output.actions.len(), 1);
    }
}
