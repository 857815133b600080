use thiserror::Error;

/// Taxonomy of failures the agent core can report, mirrored one-to-one onto
/// exit codes by the binary crate (SPEC_FULL.md §7).
#[derive(Debug, Error)]
pub enum AgentCoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("llm adapter error: {0}")]
    LlmFailure(String),

    #[error("action registry error: {0}")]
    Registry(#[from] action_registry::RegistryError),

    #[error("browser facade error: {0}")]
    Facade(#[from] action_registry::FacadeError),

    #[error("step budget exhausted after {0} steps")]
    StepBudgetExhausted(usize),

    #[error("agent run was interrupted")]
    AgentInterrupted,

    #[error("history replay error: {0}")]
    ReplayFailure(String),

    #[error("Stopped due to {0} consecutive failures")]
    ConsecutiveFailuresExceeded(u32),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentCoreError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn llm_failure(message: impl Into<String>) -> Self {
        Self::LlmFailure(message.into())
    }

    pub fn replay_failure(message: impl Into<String>) -> Self {
        Self::ReplayFailure(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Process exit code this error maps onto, per SPEC_FULL.md §6.1. Normal
    /// completion exits 0 (handled by the caller, not this error path); a
    /// second interrupt force-exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentCoreError::AgentInterrupted => 1,
            AgentCoreError::InvalidRequest(_) => 2,
            AgentCoreError::LlmFailure(_) => 3,
            AgentCoreError::Registry(_) | AgentCoreError::Facade(_) => 4,
            AgentCoreError::StepBudgetExhausted(_) => 5,
            AgentCoreError::ReplayFailure(_) => 6,
            AgentCoreError::ConsecutiveFailuresExceeded(_) => 7,
            AgentCoreError::Internal(_) => 70,
        }
    }
}
