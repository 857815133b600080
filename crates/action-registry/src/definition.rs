use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::FacadeError;
use crate::facade::BrowserFacade;
use crate::parameter::ActionParameter;

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Value, FacadeError>> + Send>>;

/// Callback invoked by the registry to actually perform an action against a
/// `BrowserFacade`. Parameters arrive pre-validated as raw JSON; the callback
/// owns translating them into facade calls (SPEC_FULL.md §4.1, §4.2).
pub type ActionCallback =
    Arc<dyn Fn(Arc<dyn BrowserFacade>, Value) -> ActionFuture + Send + Sync>;

/// One entry in the action registry: name, description, ordered parameter
/// schema, and the callback that executes it. Parameters are kept in
/// declaration order (not a map) since the order matters for the
/// LLM-facing prompt description (SPEC_FULL.md §4.1 `get_prompt_description`).
#[derive(Clone)]
pub struct ActionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<(String, ActionParameter)>,
    pub callback: ActionCallback,
}

impl ActionDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<(String, ActionParameter)>,
        callback: ActionCallback,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            callback,
        }
    }

    pub fn validate_shape(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("action name must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err(format!("action '{}' is missing a description", self.name));
        }
        for (field_name, param) in &self.parameters {
            param.validate_shape(field_name)?;
        }
        Ok(())
    }

    pub fn required_parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(_, p)| p.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl std::fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish()
    }
}
