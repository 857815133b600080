use async_trait::async_trait;

use crate::errors::AgentCoreError;
use crate::history::AgentHistoryList;
use crate::message_manager::MessageManager;
use crate::types::{ActionModel, AgentBrain, AgentOutput, DoneParams};

/// How the adapter asks the model to produce structured output
/// (SPEC_FULL.md §4.5a). Ordered as the fallback chain tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallingMethod {
    FunctionCalling,
    Tools,
    JsonMode,
    Raw,
}

pub const FALLBACK_ORDER: [ToolCallingMethod; 4] = [
    ToolCallingMethod::FunctionCalling,
    ToolCallingMethod::Tools,
    ToolCallingMethod::JsonMode,
    ToolCallingMethod::Raw,
];

/// What the caller asked for: let the adapter figure it out, or pin one
/// specific method (SPEC_FULL.md §6 `tool_calling_method` setting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallingPreference {
    Auto,
    Fixed(ToolCallingMethod),
}

impl ToolCallingPreference {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "function_calling" => Self::Fixed(ToolCallingMethod::FunctionCalling),
            "tools" => Self::Fixed(ToolCallingMethod::Tools),
            "json_mode" => Self::Fixed(ToolCallingMethod::JsonMode),
            "raw" => Self::Fixed(ToolCallingMethod::Raw),
            _ => Self::Auto,
        }
    }
}

/// Known-method heuristic keyed by chat-model library name and model name
/// substring (SPEC_FULL.md §4.5a step 2). Library names are matched
/// case-insensitively; model substrings likewise.
pub fn heuristic_method(library: &str, model: &str) -> Option<ToolCallingMethod> {
    let library = library.to_lowercase();
    let model = model.to_lowercase();

    if model.starts_with("gpt") || model.contains("o1") || model.contains("o3") {
        return Some(ToolCallingMethod::FunctionCalling);
    }
    if model.contains("deepseek") || model.contains("mistral") || model.contains("llama") {
        return Some(ToolCallingMethod::Raw);
    }
    if model.contains("claude-2") || model.contains("claude-3") {
        return Some(ToolCallingMethod::Tools);
    }
    if library == "google" || library == "gemini" {
        return None;
    }
    None
}

/// Adapter boundary between the agent core and a concrete LLM backend.
/// Only the iterative decision step is in scope; upfront multi-step
/// planning is not part of this control loop (SPEC_FULL.md §4.5, §4.7).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn decide(
        &self,
        goal: &str,
        messages: &MessageManager,
        history: &AgentHistoryList,
    ) -> Result<AgentOutput, AgentCoreError>;

    /// Chat-model library name (e.g. "openai", "anthropic"), used only by
    /// the `auto` heuristic. Adapters that don't participate in the
    /// heuristic table can leave this blank.
    fn library_name(&self) -> &str {
        ""
    }

    /// Model name, used by the `auto` heuristic and by probe error
    /// messages.
    fn model_name(&self) -> &str {
        ""
    }

    /// A method already verified by a prior `resolve_tool_calling_method`
    /// call, if this adapter caches one. Adapters that don't cache always
    /// return `None`, which forces re-probing on every call.
    fn cached_tool_calling_method(&self) -> Option<ToolCallingMethod> {
        None
    }

    /// Records `method` as verified so a later call can skip re-probing.
    /// No-op by default.
    fn cache_tool_calling_method(&self, _method: ToolCallingMethod) {}

    /// Asks the model a trivial question with a known single-word answer
    /// using `method`; returns whether the parsed answer matched
    /// (SPEC_FULL.md §4.5b). The default rejects every method, which is
    /// correct for an adapter that only ever speaks one wire protocol and
    /// doesn't implement probing.
    async fn probe_method(&self, _method: ToolCallingMethod) -> Result<bool, AgentCoreError> {
        Ok(false)
    }

    /// Resolves `preferred` into a single verified method, implementing
    /// the negotiation state machine of SPEC_FULL.md §4.5a.
    async fn resolve_tool_calling_method(
        &self,
        preferred: ToolCallingPreference,
    ) -> Result<ToolCallingMethod, AgentCoreError> {
        match preferred {
            ToolCallingPreference::Fixed(method) => {
                if self.cached_tool_calling_method().is_some() {
                    return Ok(method);
                }
                if self.probe_method(method).await? {
                    self.cache_tool_calling_method(method);
                    return Ok(method);
                }
                let message = if method == ToolCallingMethod::Raw {
                    format!(
                        "could not verify raw tool calling against model '{}' -- check connectivity and credentials",
                        self.model_name()
                    )
                } else {
                    format!(
                        "model '{}' does not appear to support the '{method:?}' tool calling method",
                        self.model_name()
                    )
                };
                Err(AgentCoreError::invalid_request(message))
            }
            ToolCallingPreference::Auto => {
                if let Some(cached) = self.cached_tool_calling_method() {
                    return Ok(cached);
                }
                if let Some(candidate) = heuristic_method(self.library_name(), self.model_name()) {
                    if self.probe_method(candidate).await? {
                        self.cache_tool_calling_method(candidate);
                        return Ok(candidate);
                    }
                }
                for method in FALLBACK_ORDER {
                    if self.probe_method(method).await? {
                        self.cache_tool_calling_method(method);
                        return Ok(method);
                    }
                }
                Err(AgentCoreError::invalid_request(format!(
                    "no supported tool calling method found for model '{}'",
                    self.model_name()
                )))
            }
        }
    }
}

/// Deterministic test double: issues a short scripted sequence of actions
/// then emits `done`, regardless of what the message manager actually
/// contains. Grounded on the teacher's `MockLlmProvider`.
pub struct MockLlmProvider {
    script: Vec<Vec<ActionModel>>,
    call_count: std::sync::atomic::AtomicUsize,
}

impl MockLlmProvider {
    pub fn new(script: Vec<Vec<ActionModel>>) -> Self {
        Self {
            script,
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A mock that takes exactly `steps` no-op-ish actions before declaring
    /// success, useful for step-budget and loop-termination tests.
    pub fn scripted_success_after(steps: usize) -> Self {
        let mut script: Vec<Vec<ActionModel>> = (0..steps)
            .map(|_| vec![ActionModel::Refresh(crate::types::EmptyParams {})])
            .collect();
        script.push(vec![ActionModel::Done(DoneParams {
            success: true,
            text: "task complete".to_string(),
        })]);
        Self::new(script)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn decide(
        &self,
        _goal: &str,
        _messages: &MessageManager,
        history: &AgentHistoryList,
    ) -> Result<AgentOutput, AgentCoreError> {
        let step = self.call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let actions = self
            .script
            .get(step)
            .cloned()
            .unwrap_or_else(|| vec![ActionModel::Done(DoneParams {
                success: false,
                text: "mock script exhausted".to_string(),
            })]);
        Ok(AgentOutput {
            brain: AgentBrain {
                page_summary: "mocked page".to_string(),
                evaluation_previous_goal: if history.history.is_empty() {
                    "starting".to_string()
                } else {
                    "previous step completed".to_string()
                },
                memory: String::new(),
                next_goal: "continue the mocked script".to_string(),
            },
            actions,
        })
    }

    async fn probe_method(&self, method: ToolCallingMethod) -> Result<bool, AgentCoreError> {
        Ok(method == ToolCallingMethod::JsonMode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentRequest;

    #[tokio::test]
    async fn mock_provider_replays_script_then_reports_exhaustion() {
        let provider = MockLlmProvider::new(vec![vec![ActionModel::Refresh(crate::types::EmptyParams {})]]);
        let request = AgentRequest::new("t1", "test");
        let messages = MessageManager::new(&request);
        let history = AgentHistoryList::default();
        let first = provider.decide("test", &messages, &history).await.unwrap();
        assert_eq!(first.actions.len(), 1);
        let second = provider.decide("test", &messages, &history).await.unwrap();
        assert!(second.is_done());
        assert!(!second.done_result().unwrap().success);
    }

    #[tokio::test]
    async fn scripted_success_after_reaches_done() {
        let provider = MockLlmProvider::scripted_success_after(2);
        let request = AgentRequest::new("t1", "test");
        let messages = MessageManager::new(&request);
        let history = AgentHistoryList::default();
        let first = provider.decide("test", &messages, &history).await.unwrap();
        assert!(!first.is_done());
        let _second = provider.decide("test", &messages, &history).await.unwrap();
        let third = provider.decide("test", &messages, &history).await.unwrap();
        assert!(third.is_done());
    }

    #[test]
    fn heuristic_recognizes_gpt_family() {
        assert_eq!(heuristic_method("openai", "gpt-4o"), Some(ToolCallingMethod::FunctionCalling));
    }

    #[test]
    fn heuristic_sends_deepseek_and_llama_to_raw() {
        assert_eq!(heuristic_method("openai", "deepseek-chat"), Some(ToolCallingMethod::Raw));
        assert_eq!(heuristic_method("openai", "llama-3.1-70b"), Some(ToolCallingMethod::Raw));
    }

    #[test]
    fn heuristic_sends_claude_to_tools() {
        assert_eq!(heuristic_method("anthropic", "claude-3-opus"), Some(ToolCallingMethod::Tools));
    }

    #[test]
    fn heuristic_falls_through_for_unknown_google_models() {
        assert_eq!(heuristic_method("google", "gemini-1.5-pro"), None);
    }

    #[tokio::test]
    async fn auto_preference_falls_back_through_the_chain_to_json_mode() {
        let provider = MockLlmProvider::scripted_success_after(1);
        let method = provider
            .resolve_tool_calling_method(ToolCallingPreference::Auto)
            .await
            .unwrap();
        assert_eq!(method, ToolCallingMethod::JsonMode);
    }

    #[tokio::test]
    async fn fixed_preference_for_an_unsupported_method_errors() {
        let provider = MockLlmProvider::scripted_success_after(1);
        let err = provider
            .resolve_tool_calling_method(ToolCallingPreference::Fixed(ToolCallingMethod::FunctionCalling))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentCoreError::InvalidRequest(_)));
    }
}
