use std::sync::Arc;

use action_registry::{ActionRegistry, ActionResult, BrowserFacade, BrowserStateSummary, Controller};
use tracing::{info, warn};

use crate::errors::AgentCoreError;
use crate::events::{in_memory_bus, AgentEvent, AgentEventBus};
use crate::history::{AgentHistory, AgentHistoryList, StepMetadata};
use crate::history_matcher::{find_history_element_in_tree, MatchOutcome};
use crate::llm::LlmProvider;
use crate::message_manager::{MessageManager, StepInfo};
use crate::model::AgentRequest;
use crate::settings::AgentSettings;
use crate::types::ActionModel;

use super::state::{AgentControlHandle, RunState};

/// The central control loop: observe browser state, ask the LLM what to do,
/// dispatch the resulting actions, record history, repeat
/// (SPEC_FULL.md §4.7). Grounded on the teacher's
/// `agent_loop::controller::AgentLoopController` and
/// `agent_loop_executor::execute_agent_loop`.
pub struct AgentCore {
    request: AgentRequest,
    settings: AgentSettings,
    controller: Controller,
    llm: Arc<dyn LlmProvider>,
    control: AgentControlHandle,
    events: Arc<AgentEventBus>,
}

impl AgentCore {
    pub fn new(
        request: AgentRequest,
        settings: AgentSettings,
        registry: Arc<ActionRegistry>,
        facade: Arc<dyn BrowserFacade>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self::new_with_events(request, settings, registry, facade, llm, in_memory_bus(32))
    }

    pub fn new_with_events(
        request: AgentRequest,
        settings: AgentSettings,
        registry: Arc<ActionRegistry>,
        facade: Arc<dyn BrowserFacade>,
        llm: Arc<dyn LlmProvider>,
        events: Arc<AgentEventBus>,
    ) -> Self {
        Self {
            request,
            settings,
            controller: Controller::new(registry, facade),
            llm,
            control: AgentControlHandle::default(),
            events,
        }
    }

    pub fn control_handle(&self) -> AgentControlHandle {
        self.control.clone()
    }

    pub fn events(&self) -> Arc<AgentEventBus> {
        self.events.clone()
    }

    pub async fn status(&self) -> RunState {
        self.control.status().await
    }

    pub async fn pause(&self) {
        self.control.pause().await;
    }

    pub async fn resume(&self) {
        self.control.resume().await;
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Runs until the LLM emits `done`, the step budget is exhausted, the
    /// failure bound is reached, or the run is stopped. Returns the full
    /// history regardless of outcome so callers can inspect partial
    /// progress (SPEC_FULL.md §4.7.1).
    pub async fn run(&self) -> Result<AgentHistoryList, AgentCoreError> {
        self.events
            .publish(AgentEvent::SessionCreated { task_id: self.request.task_id.clone(), at: chrono::Utc::now() })
            .await
            .ok();
        self.events
            .publish(AgentEvent::TaskCreated { task_id: self.request.task_id.clone(), goal: self.request.goal.clone() })
            .await
            .ok();

        let result = self.run_loop().await;

        let (is_done, is_successful) = match &result {
            Ok(history) => (history.is_done(), history.is_successful()),
            Err(_) => (false, None),
        };
        self.events
            .publish(AgentEvent::TaskUpdated { task_id: self.request.task_id.clone(), is_done, is_successful })
            .await
            .ok();

        result
    }

    async fn run_loop(&self) -> Result<AgentHistoryList, AgentCoreError> {
        let mut messages = MessageManager::new(&self.request);
        let mut history = AgentHistoryList::default();
        let mut consecutive_failures: u32 = 0;

        for step_number in 1..=self.settings.max_steps {
            self.control.wait_if_paused().await;
            if self.control.is_cancelled() {
                return Err(AgentCoreError::AgentInterrupted);
            }

            self.step(&mut messages, &mut history, step_number).await?;

            if let Some(last_failed) = history.history.last().map(|h| h.results.iter().any(|r| !r.success)) {
                if last_failed {
                    consecutive_failures += 1;
                } else {
                    consecutive_failures = 0;
                }
            }

            if history.is_done() {
                info!(step_number, "agent reported done");
                break;
            }

            if consecutive_failures >= self.settings.max_failures {
                return Err(AgentCoreError::ConsecutiveFailuresExceeded(consecutive_failures));
            }
        }

        if !history.is_done() {
            warn!(max_steps = self.settings.max_steps, "step budget exhausted without completion");
        }

        Ok(history)
    }

    /// Executes exactly one observe/think/act cycle and appends its outcome
    /// to `history` (SPEC_FULL.md §4.7.2-§4.7.6).
    async fn step(
        &self,
        messages: &mut MessageManager,
        history: &mut AgentHistoryList,
        step_number: u32,
    ) -> Result<(), AgentCoreError> {
        let step_start = chrono::Utc::now();

        let facade_state = self
            .controller
            .observe(true)
            .await
            .map_err(AgentCoreError::from)?;

        messages.add_sensitive_data(&facade_state.url);

        let last_results: Vec<ActionResult> = history
            .history
            .last()
            .map(|h| h.results.clone())
            .unwrap_or_default();
        let step_info = StepInfo { step_number, max_steps: self.settings.max_steps };
        messages.add_state_message(&facade_state, &last_results, step_info, self.settings.use_vision, &self.settings.include_attributes);

        if step_number == self.settings.max_steps {
            messages.add_final_step_directive();
        }

        let mut output = self
            .llm
            .decide(&self.request.goal, messages, history)
            .await?;

        if output.actions.len() > self.settings.max_actions_per_step as usize {
            warn!(
                step_number,
                requested = output.actions.len(),
                cap = self.settings.max_actions_per_step,
                "truncating model output to the configured action cap"
            );
            output.actions.truncate(self.settings.max_actions_per_step as usize);
        }

        if let Some(dir) = &self.settings.save_conversation_path {
            let path = std::path::Path::new(dir).join(format!(
                "conversation_{}_{}.txt",
                self.request.task_id, step_number
            ));
            let dump = format!(
                "=== PROMPT ===\n{}\n=== OUTPUT ===\n{}\n",
                messages
                    .get_messages()
                    .iter()
                    .map(|m| format!("[{:?}] {}", m.role, m.content))
                    .collect::<Vec<_>>()
                    .join("\n"),
                serde_json::to_string_pretty(&output).unwrap_or_default(),
            );
            if let Err(err) = std::fs::write(&path, dump) {
                warn!(path = %path.display(), error = %err, "failed to write per-step conversation dump");
            }
        }

        messages.add_model_output(&output);

        let results = self.multi_act(output.actions.clone(), &facade_state).await;

        let step_end = chrono::Utc::now();
        history.push(AgentHistory {
            metadata: StepMetadata {
                step_number,
                step_start_time: step_start,
                step_end_time: step_end,
                input_tokens: messages.total_tokens(),
                max_steps: self.settings.max_steps,
            },
            state: facade_state,
            model_output: Some(output),
            results,
        });

        messages.cut_messages(self.settings.max_input_tokens);

        self.events
            .publish(AgentEvent::StepCreated { task_id: self.request.task_id.clone(), step_number })
            .await
            .ok();

        Ok(())
    }

    /// Dispatches actions one at a time, aborting the remainder of the batch
    /// the moment the DOM is found to have drifted out from under it
    /// (SPEC_FULL.md §4.7.7, testable property P7). Does not attempt to
    /// re-anchor addresses onto a healed index; that healing only happens
    /// during replay (`rerun_history`), where silent re-anchoring cannot
    /// mask element identity changes mid-batch.
    async fn multi_act(
        &self,
        actions: Vec<ActionModel>,
        observed_state: &BrowserStateSummary,
    ) -> Vec<ActionResult> {
        self.controller.execute_action("remove_highlights", serde_json::Value::Null).await;

        let initial_hashes = observed_state.branch_path_hash_set();
        let mut results = Vec::with_capacity(actions.len());

        for (i, action) in actions.iter().enumerate() {
            if i > 0 {
                if let Some(index) = action.index() {
                    match self.controller.observe(false).await {
                        Ok(current_summary) => {
                            let before = observed_state.hash_for_index(index);
                            let after = current_summary.hash_for_index(index);
                            if let (Some(before), Some(after)) = (before, after) {
                                if before != after {
                                    results.push(failed_result(action.action_name(), "element changed after previous action".to_string()));
                                    break;
                                }
                            }
                            let current_hashes = current_summary.branch_path_hash_set();
                            if !current_hashes.is_subset(&initial_hashes) {
                                results.push(failed_result(action.action_name(), "something new appeared on the page".to_string()));
                                break;
                            }
                        }
                        Err(err) => {
                            results.push(failed_result(action.action_name(), format!("failed to observe browser state: {err}")));
                            break;
                        }
                    }
                }
            }

            if self.control.is_cancelled() {
                if results.is_empty() {
                    results.push(failed_result(action.action_name(), "cancelled".to_string()));
                }
                break;
            }

            let result = self
                .controller
                .execute_action(action.action_name(), action.params_value())
                .await;
            let stop = !result.success || result.is_done;
            results.push(result);
            if stop {
                break;
            }
        }

        results
    }

    /// Replays a previously-recorded run against the live controller without
    /// consulting the LLM, re-anchoring each step's actions onto their
    /// healed selector-map index when the recorded element has moved
    /// (SPEC_FULL.md §4.7.8).
    pub async fn rerun_history(&self, recorded: &AgentHistoryList) -> Result<AgentHistoryList, AgentCoreError> {
        let mut replay = AgentHistoryList::default();
        for entry in &recorded.history {
            let Some(output) = &entry.model_output else {
                continue;
            };
            if output.actions.is_empty() {
                continue;
            }

            let step_start = chrono::Utc::now();
            let facade_state = self.controller.observe(true).await.map_err(AgentCoreError::from)?;

            let mut actions = output.actions.clone();
            for action in &mut actions {
                let Some(index) = action.index() else { continue };
                let Some(recorded_element) = entry.state.selector_map.get(&index.to_string()) else {
                    return Err(AgentCoreError::replay_failure(format!(
                        "could not find matching element for step {}",
                        entry.metadata.step_number
                    )));
                };
                match find_history_element_in_tree(recorded_element, &facade_state) {
                    MatchOutcome::Found { index: healed } => {
                        if healed != index {
                            info!(step = entry.metadata.step_number, from = index, to = healed, "re-anchored replay action onto healed index");
                            action.set_index(healed);
                        }
                    }
                    MatchOutcome::NotFound => {
                        return Err(AgentCoreError::replay_failure(format!(
                            "could not find matching element for step {}",
                            entry.metadata.step_number
                        )));
                    }
                }
            }

            let results = self.multi_act(actions.clone(), &facade_state).await;
            let step_end = chrono::Utc::now();

            let failed = results.iter().any(|r| !r.success);
            let mut replayed_output = output.clone();
            replayed_output.actions = actions;
            replay.push(AgentHistory {
                metadata: StepMetadata {
                    step_number: entry.metadata.step_number,
                    step_start_time: step_start,
                    step_end_time: step_end,
                    input_tokens: 0,
                    max_steps: entry.metadata.max_steps,
                },
                state: facade_state,
                model_output: Some(replayed_output),
                results,
            });
            if failed {
                return Err(AgentCoreError::replay_failure(format!(
                    "step {} failed to reproduce during replay",
                    entry.metadata.step_number
                )));
            }
        }
        Ok(replay)
    }
}

fn failed_result(action_name: &str, error: String) -> ActionResult {
    ActionResult {
        action_name: action_name.to_string(),
        success: false,
        extracted_content: None,
        error: Some(error),
        is_done: false,
        timestamp: chrono::Utc::now(),
        duration_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_registry::{single_tab, ActionRegistry, ScriptedBrowserFacade};
    use crate::llm::MockLlmProvider;
    use crate::model::AgentRequest;

    fn settings_with_steps(max_steps: u32) -> AgentSettings {
        let mut settings = AgentSettings::default();
        settings.max_steps = max_steps;
        settings
    }

    #[tokio::test]
    async fn run_terminates_on_done_before_step_budget() {
        let registry = Arc::new(ActionRegistry::new());
        action_registry::builtin_catalog()
            .into_iter()
            .for_each(|def| registry.register(def, false).unwrap());
        let facade = Arc::new(ScriptedBrowserFacade::new(vec![single_tab(
            "https://example.com",
            "Example",
        )]));
        facade.launch(true).await.unwrap();
        let llm = Arc::new(MockLlmProvider::scripted_success_after(2));
        let core = AgentCore::new(
            AgentRequest::new("t1", "do something"),
            settings_with_steps(10),
            registry,
            facade,
            llm,
        );
        let history = core.run().await.unwrap();
        assert!(history.is_done());
        assert_eq!(history.is_successful(), Some(true));
        assert!(history.history.len() < 10);
    }

    #[tokio::test]
    async fn run_stops_when_cancelled_before_first_step() {
        let registry = Arc::new(ActionRegistry::new());
        action_registry::builtin_catalog()
            .into_iter()
            .for_each(|def| registry.register(def, false).unwrap());
        let facade = Arc::new(ScriptedBrowserFacade::new(vec![single_tab(
            "https://example.com",
            "Example",
        )]));
        facade.launch(true).await.unwrap();
        let llm = Arc::new(MockLlmProvider::scripted_success_after(5));
        let core = AgentCore::new(
            AgentRequest::new("t1", "do something"),
            settings_with_steps(10),
            registry,
            facade,
            llm,
        );
        core.stop();
        let err = core.run().await.unwrap_err();
        assert!(matches!(err, AgentCoreError::AgentInterrupted));
    }

    /// A provider whose every decision is a failing, non-index action, used
    /// to exercise the consecutive-failures bound (SPEC_FULL.md §8 scenario 3).
    struct AlwaysFailingLlm;

    #[async_trait::async_trait]
    impl LlmProvider for AlwaysFailingLlm {
        async fn decide(
            &self,
            _goal: &str,
            _messages: &MessageManager,
            _history: &AgentHistoryList,
        ) -> Result<crate::types::AgentOutput, AgentCoreError> {
            Ok(crate::types::AgentOutput {
                brain: crate::types::AgentBrain {
                    page_summary: "stuck".to_string(),
                    evaluation_previous_goal: "failed".to_string(),
                    memory: String::new(),
                    next_goal: "retry".to_string(),
                },
                actions: vec![ActionModel::SwitchToTab(crate::types::SwitchToTabParams { index: 99 })],
            })
        }
    }

    #[tokio::test]
    async fn run_stops_after_max_failures_consecutive_failures() {
        let registry = Arc::new(ActionRegistry::new());
        action_registry::builtin_catalog()
            .into_iter()
            .for_each(|def| registry.register(def, false).unwrap());
        let facade = Arc::new(ScriptedBrowserFacade::new(vec![single_tab(
            "https://example.com",
            "Example",
        )]));
        facade.launch(true).await.unwrap();
        let mut settings = settings_with_steps(20);
        settings.max_failures = 3;
        let core = AgentCore::new(
            AgentRequest::new("t1", "do something"),
            settings,
            registry,
            facade,
            Arc::new(AlwaysFailingLlm),
        );
        let err = core.run().await.unwrap_err();
        assert!(matches!(err, AgentCoreError::ConsecutiveFailuresExceeded(3)));
    }

    #[tokio::test]
    async fn multi_act_aborts_batch_when_element_changes_after_previous_action() {
        let registry = Arc::new(ActionRegistry::new());
        action_registry::builtin_catalog()
            .into_iter()
            .for_each(|def| registry.register(def, false).unwrap());
        let mut snapshot = single_tab("https://example.com", "Example");
        snapshot.selector_map.insert(
            "0".to_string(),
            action_registry::DomHistoryElement {
                node_id: "n0".to_string(),
                highlight_index: 0,
                tag_name: "button".to_string(),
                attributes: Default::default(),
                text: "Go".to_string(),
                bounding_box: Default::default(),
                branch_path_hash: "hash-a".to_string(),
            },
        );
        let mut drifted = snapshot.clone();
        drifted.selector_map.get_mut("0").unwrap().branch_path_hash = "hash-b".to_string();

        let facade = Arc::new(ScriptedBrowserFacade::new(vec![snapshot.clone(), drifted]));
        facade.launch(true).await.unwrap();
        let core = AgentCore::new(
            AgentRequest::new("t1", "do something"),
            settings_with_steps(10),
            registry,
            facade.clone(),
            Arc::new(MockLlmProvider::scripted_success_after(1)),
        );

        let actions = vec![
            ActionModel::Refresh(crate::types::EmptyParams {}),
            ActionModel::Click(crate::types::ClickParams { selector: None, index: Some(0), wait_for_selector: None }),
        ];
        facade.advance();
        let results = core.multi_act(actions, &snapshot).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("changed after previous action"));
    }
}
