pub mod openai;
pub mod provider;

pub use openai::{OpenAiConfig, OpenAiLlmProvider};
pub use provider::{
    heuristic_method, LlmProvider, MockLlmProvider, ToolCallingMethod, ToolCallingPreference,
    FALLBACK_ORDER,
};
