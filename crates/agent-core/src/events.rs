use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered notifications published while a task runs, consumed by anything
/// subscribed to the shared event bus (SPEC_FULL.md §9 "event bus as
/// ordered channel"). Instantiates `soulbrowser_event_bus::EventBus<E>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    SessionCreated {
        task_id: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        at: DateTime<Utc>,
    },
    TaskCreated {
        task_id: String,
        goal: String,
    },
    StepCreated {
        task_id: String,
        step_number: u32,
    },
    TaskUpdated {
        task_id: String,
        is_done: bool,
        is_successful: Option<bool>,
    },
}

pub type AgentEventBus = dyn soulbrowser_event_bus::EventBus<AgentEvent>;

pub fn in_memory_bus(capacity: usize) -> std::sync::Arc<soulbrowser_event_bus::InMemoryBus<AgentEvent>> {
    soulbrowser_event_bus::InMemoryBus::new(capacity)
}
