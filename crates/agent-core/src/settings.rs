use serde::{Deserialize, Serialize};

/// Agent-level run configuration (SPEC_FULL.md §6), layered in the binary
/// crate as defaults -> config file -> environment, mirroring the style of
/// the teacher's `app_settings::Config`/`SoulConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub max_steps: u32,
    pub max_failures: u32,
    pub step_timeout_seconds: u64,
    pub use_vision: bool,
    pub max_input_tokens: u32,
    pub save_conversation_path: Option<String>,
    pub generate_gif: bool,
    /// Whether the browser facade launches without a visible window.
    pub headless: bool,
    /// Hard cap on actions per model output; excess actions are truncated.
    pub max_actions_per_step: u32,
    /// Which HTML attributes appear in the interactive-element listing.
    pub include_attributes: Vec<String>,
    /// `auto` / `function_calling` / `tools` / `json_mode` / `raw`.
    pub tool_calling_method: String,
    pub llm: LlmSettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_failures: 3,
            step_timeout_seconds: 90,
            use_vision: false,
            max_input_tokens: 128_000,
            save_conversation_path: None,
            generate_gif: false,
            headless: true,
            max_actions_per_step: 10,
            include_attributes: vec![
                "id".to_string(),
                "class".to_string(),
                "href".to_string(),
                "type".to_string(),
                "name".to_string(),
                "role".to_string(),
                "aria-label".to_string(),
                "placeholder".to_string(),
                "value".to_string(),
            ],
            tool_calling_method: "auto".to_string(),
            llm: LlmSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub model: String,
    pub api_base: Option<String>,
    pub api_keys: Vec<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            model: "gpt-4o".to_string(),
            api_base: None,
            api_keys: Vec::new(),
            temperature: 0.0,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    OpenAi,
    Mock,
}
