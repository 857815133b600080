use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::definition::ActionDefinition;
use crate::errors::RegistryError;
use crate::facade::BrowserFacade;

/// Holds the set of known actions and validates/dispatches calls against
/// them. Concurrency discipline mirrors the teacher's tool registry: a
/// single `parking_lot::RwLock` guarding a plain map, read-heavy workload,
/// writes only at startup/registration time (SPEC_FULL.md §4.1).
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<BTreeMap<String, ActionDefinition>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts `definition`, rejecting a name collision unless `overwrite`
    /// is set. A definition is never mutated in place: overwriting always
    /// replaces the whole entry (SPEC_FULL.md §3 ActionDefinition, §4.1
    /// `register(definition, overwrite=false)`).
    pub fn register(&self, definition: ActionDefinition, overwrite: bool) -> Result<(), RegistryError> {
        definition
            .validate_shape()
            .map_err(|reason| RegistryError::InvalidDefinition {
                name: definition.name.clone(),
                reason,
            })?;
        let mut actions = self.actions.write();
        if actions.contains_key(&definition.name) && !overwrite {
            return Err(RegistryError::Duplicate(definition.name));
        }
        actions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.actions.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ActionDefinition> {
        self.actions.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<ActionDefinition> {
        self.actions.write().remove(name)
    }

    pub fn get_all(&self) -> Vec<ActionDefinition> {
        self.actions.read().values().cloned().collect()
    }

    pub fn get_action_names(&self) -> Vec<String> {
        self.actions.read().keys().cloned().collect()
    }

    /// Validates `params` against the named action's schema without
    /// executing it. `deep` controls whether nested object/array shapes are
    /// recursed into (cheap shallow check during planning vs. full check
    /// right before dispatch, per SPEC_FULL.md §4.1).
    pub fn validate_parameters(&self, name: &str, params: &Value, deep: bool) -> Result<(), RegistryError> {
        let action = self
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        let mut errors = Vec::new();
        let obj = params.as_object();
        for (field_name, schema) in &action.parameters {
            match obj.and_then(|o| o.get(field_name)) {
                Some(value) => errors.extend(schema.check(field_name, value, deep)),
                None if schema.required => {
                    errors.push(format!("missing required parameter '{field_name}'"))
                }
                None => {}
            }
        }
        if let Some(obj) = obj {
            let known: std::collections::BTreeSet<&str> =
                action.parameters.iter().map(|(n, _)| n.as_str()).collect();
            for key in obj.keys() {
                if !known.contains(key.as_str()) {
                    errors.push(format!("unknown parameter '{key}' for action '{name}'"));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::ValidationFailed {
                name: name.to_string(),
                errors,
            })
        }
    }

    /// Validates then executes the named action's callback against `facade`.
    pub async fn execute_action(
        &self,
        name: &str,
        params: Value,
        facade: Arc<dyn BrowserFacade>,
    ) -> Result<Value, RegistryError> {
        self.validate_parameters(name, &params, true)?;
        let action = self
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        (action.callback)(facade, params)
            .await
            .map_err(|source| RegistryError::CallbackFailed {
                name: name.to_string(),
                source,
            })
    }

    /// Renders the full catalog as an LLM-facing prompt fragment: one line
    /// per action naming its parameters and whether each is required.
    pub fn get_prompt_description(&self) -> String {
        let actions = self.actions.read();
        let mut out = String::new();
        for action in actions.values() {
            out.push_str(&format!("- {}: {}\n", action.name, action.description));
            for (field_name, param) in &action.parameters {
                out.push_str(&format!(
                    "    {}{}: {} ({:?})\n",
                    field_name,
                    if param.required { "" } else { " (optional)" },
                    param.description,
                    param.param_type,
                ));
            }
        }
        out
    }

    /// Finds every registered action that declares a parameter named
    /// `parameter_name`, used by the controller to resolve which actions
    /// can address an element by `index` (SPEC_FULL.md §4.2).
    pub fn find_action_by_parameter(&self, parameter_name: &str) -> Vec<String> {
        self.actions
            .read()
            .values()
            .filter(|a| a.parameters.iter().any(|(n, _)| n == parameter_name))
            .map(|a| a.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{ActionParameter, ParamType};
    use serde_json::json;

    fn noop_action(name: &str, params: Vec<(String, ActionParameter)>) -> ActionDefinition {
        ActionDefinition::new(name, "test action", params, Arc::new(|_facade, params| {
            Box::pin(async move { Ok(params) })
        }))
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let registry = ActionRegistry::new();
        registry.register(noop_action("goto", vec![]), false).unwrap();
        let err = registry.register(noop_action("goto", vec![]), false).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn register_with_overwrite_replaces_existing_definition() {
        let registry = ActionRegistry::new();
        registry.register(noop_action("goto", vec![]), false).unwrap();
        registry.register(noop_action("goto", vec![]), true).unwrap();
        assert_eq!(registry.get_action_names(), vec!["goto".to_string()]);
    }

    #[test]
    fn validate_parameters_flags_missing_required_field() {
        let registry = ActionRegistry::new();
        registry
            .register(noop_action(
                "goto",
                vec![(
                    "url".to_string(),
                    ActionParameter::new(ParamType::String, true, "target url"),
                )],
            ), false)
            .unwrap();
        let err = registry
            .validate_parameters("goto", &json!({}), true)
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValidationFailed { .. }));
    }

    #[test]
    fn validate_parameters_flags_unknown_field() {
        let registry = ActionRegistry::new();
        registry.register(noop_action("refresh", vec![]), false).unwrap();
        let err = registry
            .validate_parameters("refresh", &json!({"bogus": 1}), true)
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValidationFailed { .. }));
    }

    #[test]
    fn unknown_action_name_surfaces_unknown_error() {
        let registry = ActionRegistry::new();
        let err = registry.validate_parameters("nope", &json!({}), true).unwrap_err();
        assert!(matches!(err, RegistryError::Unknown(_)));
    }
}
