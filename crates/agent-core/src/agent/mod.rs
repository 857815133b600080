pub mod core;
pub mod state;

pub use core::AgentCore;
pub use state::{AgentControlHandle, RunState};
