//! Schema-validated action registry, built-in browser action catalog, and
//! the `BrowserFacade` contract the controller dispatches against.

pub mod catalog;
pub mod controller;
pub mod definition;
pub mod errors;
pub mod facade;
pub mod parameter;
pub mod registry;
pub mod scripted_facade;

pub use catalog::builtin_catalog;
pub use controller::{ActionResult, Controller};
pub use definition::{ActionCallback, ActionDefinition, ActionFuture};
pub use errors::{FacadeError, RegistryError};
pub use facade::{BoundingBox, BrowserFacade, BrowserStateSummary, DomHistoryElement, TabInfo};
pub use parameter::{ActionParameter, ParamType};
pub use registry::ActionRegistry;
pub use scripted_facade::{single_tab, RecordedCall, ScriptedBrowserFacade};
