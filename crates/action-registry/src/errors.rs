use thiserror::Error;

/// Errors raised by the action registry and controller.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("action '{0}' is already registered")]
    Duplicate(String),

    #[error("action '{0}' is not registered")]
    Unknown(String),

    #[error("invalid action definition for '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("parameter validation failed for '{name}': {}", .errors.join("; "))]
    ValidationFailed { name: String, errors: Vec<String> },

    #[error("action '{name}' failed: {source}")]
    CallbackFailed {
        name: String,
        #[source]
        source: FacadeError,
    },
}

/// Errors raised by a `BrowserFacade` implementation.
#[derive(Debug, Error, Clone)]
pub enum FacadeError {
    #[error("browser is not launched")]
    NotLaunched,

    #[error("element not found for selector '{0}'")]
    ElementNotFound(String),

    #[error("element is not interactable: {0}")]
    NotInteractable(String),

    #[error("tab index {0} out of range")]
    TabOutOfRange(u32),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("browser closed or disconnected")]
    Disconnected,

    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("operation not supported by this facade: {0}")]
    Unsupported(String),
}
