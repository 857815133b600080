use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::RegistryError;
use crate::facade::BrowserFacade;
use crate::registry::ActionRegistry;

/// Outcome of a single dispatched action. Recorded verbatim into step
/// history (SPEC_FULL.md §3 ActionResult).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_done: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ActionResult {
    fn ok(action_name: &str, content: Value, is_done: bool, duration_ms: u64) -> Self {
        Self {
            action_name: action_name.to_string(),
            success: true,
            extracted_content: Some(content),
            error: None,
            is_done,
            timestamp: Utc::now(),
            duration_ms,
        }
    }

    fn failed(action_name: &str, error: String, duration_ms: u64) -> Self {
        Self {
            action_name: action_name.to_string(),
            success: false,
            extracted_content: None,
            error: Some(error),
            is_done: false,
            timestamp: Utc::now(),
            duration_ms,
        }
    }
}

/// Binds an `ActionRegistry` to one live `BrowserFacade`, dispatching named
/// actions and turning the outcome into an `ActionResult`
/// (SPEC_FULL.md §4.2).
pub struct Controller {
    registry: Arc<ActionRegistry>,
    facade: Arc<dyn BrowserFacade>,
}

impl Controller {
    pub fn new(registry: Arc<ActionRegistry>, facade: Arc<dyn BrowserFacade>) -> Self {
        Self { registry, facade }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Executes one action by name, recording timing regardless of outcome.
    /// `done` is special-cased: it never reaches the facade, it only ever
    /// terminates the loop (SPEC_FULL.md §4.2, `is_done` column of the
    /// built-in catalog table).
    pub async fn execute_action(&self, action_name: &str, params: Value) -> ActionResult {
        let started = Instant::now();

        if !self.facade.is_launched() && action_name != "done" {
            let duration_ms = started.elapsed().as_millis() as u64;
            warn!(action = action_name, "browser not launched, refusing to dispatch");
            return ActionResult::failed(action_name, "browser is not launched".to_string(), duration_ms);
        }

        if action_name == "done" {
            let duration_ms = started.elapsed().as_millis() as u64;
            return ActionResult::ok(action_name, params, true, duration_ms);
        }

        match self
            .registry
            .execute_action(action_name, params, self.facade.clone())
            .await
        {
            Ok(content) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(action = action_name, duration_ms, "action dispatched");
                ActionResult::ok(action_name, content, false, duration_ms)
            }
            Err(err) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                warn!(action = action_name, error = %err, "action failed");
                ActionResult::failed(action_name, err.to_string(), duration_ms)
            }
        }
    }

    /// Runs a batch of `(name, params)` pairs in sequence, stopping early on
    /// the first failure or the first `done` action (SPEC_FULL.md §4.7.6
    /// `multi_act`). The DOM is assumed to have possibly changed between
    /// actions, so callers are expected to re-check element identity
    /// upstream via the history matcher before calling this again.
    pub async fn execute_batch(&self, actions: Vec<(String, Value)>) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for (name, params) in actions {
            let result = self.execute_action(&name, params).await;
            let stop = !result.success || result.is_done;
            results.push(result);
            if stop {
                break;
            }
        }
        results
    }

    pub fn validate_only(&self, action_name: &str, params: &Value) -> Result<(), RegistryError> {
        self.registry.validate_parameters(action_name, params, true)
    }

    /// Fetches the current browser state summary through the bound facade.
    pub async fn observe(&self, recompute_hashes: bool) -> Result<crate::facade::BrowserStateSummary, crate::errors::FacadeError> {
        self.facade.get_state_summary(recompute_hashes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted_facade::{single_tab, ScriptedBrowserFacade};
    use crate::catalog::builtin_catalog;
    use serde_json::json;

    async fn controller_with_launched_facade() -> (Controller, Arc<ScriptedBrowserFacade>) {
        let facade = Arc::new(ScriptedBrowserFacade::new(vec![single_tab(
            "https://example.com",
            "Example",
        )]));
        facade.launch(true).await.unwrap();
        let registry = Arc::new(ActionRegistry::new());
        builtin_catalog().into_iter().for_each(|def| registry.register(def, false).unwrap());
        let controller = Controller::new(registry, facade.clone());
        (controller, facade)
    }

    #[tokio::test]
    async fn done_action_short_circuits_without_touching_facade() {
        let (controller, facade) = controller_with_launched_facade().await;
        let result = controller
            .execute_action("done", json!({"success": true, "text": "finished"}))
            .await;
        assert!(result.is_done);
        assert!(facade.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn batch_stops_after_first_failure() {
        let (controller, _facade) = controller_with_launched_facade().await;
        let actions = vec![
            ("switch_to_tab".to_string(), json!({"index": 9})),
            ("refresh".to_string(), json!({})),
        ];
        let results = controller.execute_batch(actions).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn unlaunched_browser_rejects_non_done_actions() {
        let facade = Arc::new(ScriptedBrowserFacade::new(vec![single_tab(
            "https://example.com",
            "Example",
        )]));
        let registry = Arc::new(ActionRegistry::new());
        builtin_catalog().into_iter().for_each(|def| registry.register(def, false).unwrap());
        let controller = Controller::new(registry, facade);
        let result = controller.execute_action("refresh", json!({})).await;
        assert!(!result.success);
    }
}
