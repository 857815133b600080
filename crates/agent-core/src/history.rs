use std::path::Path;

use action_registry::{ActionResult, BrowserStateSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AgentCoreError;
use crate::types::AgentOutput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetadata {
    pub step_number: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub step_start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub step_end_time: DateTime<Utc>,
    pub input_tokens: u32,
    /// Step budget ceiling for the run this step belongs to (SPEC_FULL.md
    /// §3 StepMetadata), carried alongside `step_number` so a persisted
    /// history entry is self-describing about how close the run was to
    /// exhausting its budget.
    pub max_steps: u32,
}

impl StepMetadata {
    pub fn duration_seconds(&self) -> f64 {
        (self.step_end_time - self.step_start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// One completed step: the state the LLM observed, what it decided, and
/// what actually happened when those actions were dispatched
/// (SPEC_FULL.md §3 AgentHistory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHistory {
    pub metadata: StepMetadata,
    pub state: BrowserStateSummary,
    pub model_output: Option<AgentOutput>,
    pub results: Vec<ActionResult>,
}

/// The full run history, in step order. Supports the replay engine's
/// `rerun_history` (SPEC_FULL.md §4.7.8) and the binary's
/// `--save-conversation` persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHistoryList {
    pub history: Vec<AgentHistory>,
}

impl AgentHistoryList {
    pub fn push(&mut self, entry: AgentHistory) {
        self.history.push(entry);
    }

    pub fn is_done(&self) -> bool {
        self.history
            .last()
            .and_then(|h| h.model_output.as_ref())
            .map(AgentOutput::is_done)
            .unwrap_or(false)
    }

    pub fn is_successful(&self) -> Option<bool> {
        self.history
            .last()
            .and_then(|h| h.model_output.as_ref())
            .and_then(AgentOutput::done_result)
            .map(|d| d.success)
    }

    pub fn final_result(&self) -> Option<&str> {
        self.history
            .last()
            .and_then(|h| h.model_output.as_ref())
            .and_then(AgentOutput::done_result)
            .map(|d| d.text.as_str())
    }

    pub fn errors(&self) -> Vec<&str> {
        self.history
            .iter()
            .flat_map(|h| h.results.iter())
            .filter_map(|r| r.error.as_deref())
            .collect()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.history.iter().map(|h| h.state.url.as_str()).collect()
    }

    pub fn total_input_tokens(&self) -> u32 {
        self.history.iter().map(|h| h.metadata.input_tokens).sum()
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.history.iter().map(|h| h.metadata.duration_seconds()).sum()
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), AgentCoreError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AgentCoreError::internal(format!("failed to serialize history: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| AgentCoreError::internal(format!("failed to write history file: {e}")))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, AgentCoreError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AgentCoreError::replay_failure(format!("failed to read history file: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| AgentCoreError::replay_failure(format!("failed to parse history file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_registry::single_tab;
    use crate::types::{ActionModel, AgentBrain, DoneParams};

    fn sample_entry(step_number: u32, done: bool) -> AgentHistory {
        let now = Utc::now();
        let actions = if done {
            vec![ActionModel::Done(DoneParams { success: true, text: "finished".to_string() })]
        } else {
            vec![]
        };
        AgentHistory {
            metadata: StepMetadata {
                step_number,
                step_start_time: now,
                step_end_time: now,
                input_tokens: 10,
                max_steps: 10,
            },
            state: single_tab("https://example.com", "Example"),
            model_output: Some(AgentOutput {
                brain: AgentBrain {
                    page_summary: "a page".to_string(),
                    evaluation_previous_goal: "ok".to_string(),
                    memory: String::new(),
                    next_goal: "continue".to_string(),
                },
                actions,
            }),
            results: vec![],
        }
    }

    #[test]
    fn is_done_reflects_only_the_last_step() {
        let mut list = AgentHistoryList::default();
        list.push(sample_entry(1, false));
        assert!(!list.is_done());
        list.push(sample_entry(2, true));
        assert!(list.is_done());
        assert_eq!(list.final_result(), Some("finished"));
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = std::env::temp_dir().join(format!("agent-history-test-{}", uuid::Uuid::new_v4()));
        let mut list = AgentHistoryList::default();
        list.push(sample_entry(1, true));
        list.save_to_file(&dir).unwrap();
        let loaded = AgentHistoryList::load_from_file(&dir).unwrap();
        assert_eq!(loaded.history.len(), 1);
        std::fs::remove_file(&dir).ok();
    }
}
