//! Control loop, action dispatch, LLM adapter, conversation manager, and
//! history/replay engine for the browser automation agent.

pub mod agent;
pub mod errors;
pub mod events;
pub mod history;
pub mod history_matcher;
pub mod llm;
pub mod message_manager;
pub mod model;
pub mod settings;
pub mod types;

pub use agent::{AgentControlHandle, AgentCore, RunState};
pub use errors::AgentCoreError;
pub use events::{in_memory_bus, AgentEvent, AgentEventBus};
pub use history::{AgentHistory, AgentHistoryList, StepMetadata};
pub use history_matcher::{find_history_element_in_tree, MatchOutcome};
pub use llm::{
    heuristic_method, LlmProvider, MockLlmProvider, OpenAiConfig, OpenAiLlmProvider,
    ToolCallingMethod, ToolCallingPreference,
};
pub use message_manager::{HistoryItem, MessageManager, MessageManagerState, StepInfo};
pub use model::{AgentContext, AgentRequest, ConversationRole, ConversationTurn};
pub use settings::{AgentSettings, LlmProviderKind, LlmSettings};
pub use types::{ActionModel, AgentBrain, AgentOutput};
