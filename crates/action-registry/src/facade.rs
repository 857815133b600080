use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::FacadeError;

/// One interactive node in a `BrowserStateSummary`'s selector map.
///
/// `branch_path_hash` is the structural identity used everywhere to decide
/// whether two descriptors, possibly taken from different snapshots, refer
/// to "the same element" (SPEC_FULL.md §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomHistoryElement {
    pub node_id: String,
    pub highlight_index: u32,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    pub branch_path_hash: String,
}

impl DomHistoryElement {
    /// Derives a selector the facade can act on when the LLM addressed the
    /// element only by its selector-map `index`, not by a literal CSS string.
    pub fn derived_selector(&self) -> String {
        format!("[data-soul-node=\"{}\"]", self.node_id)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: u32,
    pub title: String,
    pub url: String,
    pub active: bool,
}

/// Snapshot of browser state handed to the conversation/context manager.
/// Grounded on `agent_loop::types::BrowserStateSummary`, generalized with the
/// `selector_map` keying scheme and `branch_path_hash` required by §4.3/§4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserStateSummary {
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
    pub tabs: Vec<TabInfo>,
    /// Keys are the stringified integer index the LLM is instructed to use.
    pub selector_map: BTreeMap<String, DomHistoryElement>,
}

impl BrowserStateSummary {
    pub fn branch_path_hash_set(&self) -> std::collections::BTreeSet<String> {
        self.selector_map
            .values()
            .map(|e| e.branch_path_hash.clone())
            .collect()
    }

    pub fn hash_for_index(&self, index: u32) -> Option<&str> {
        self.selector_map
            .get(&index.to_string())
            .map(|e| e.branch_path_hash.as_str())
    }
}

/// Consumed-interface contract for the live browser (Browser Facade + DOM
/// Snapshotter, SPEC_FULL.md §4.3). The agent core only ever talks to a
/// `dyn BrowserFacade`; a real CDP-backed implementation is an external
/// collaborator out of scope for this crate.
#[async_trait]
pub trait BrowserFacade: Send + Sync {
    async fn launch(&self, headless: bool) -> Result<(), FacadeError>;

    async fn navigate(&self, url: &str) -> Result<(), FacadeError>;
    async fn refresh(&self) -> Result<(), FacadeError>;
    async fn go_back(&self) -> Result<(), FacadeError>;
    async fn go_forward(&self) -> Result<(), FacadeError>;

    async fn click(&self, selector: &str) -> Result<(), FacadeError>;
    async fn type_text(&self, selector: &str, text: &str, clear_first: bool) -> Result<(), FacadeError>;
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), FacadeError>;
    async fn drag_and_drop(&self, source_selector: &str, target_selector: &str) -> Result<(), FacadeError>;
    async fn upload_file(&self, selector: &str, file_path: &str) -> Result<(), FacadeError>;
    async fn scroll_to(&self, selector: &str) -> Result<(), FacadeError>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, FacadeError>;
    async fn screenshot(&self) -> Result<String, FacadeError>;

    async fn new_tab(&self, url: Option<&str>) -> Result<u32, FacadeError>;
    async fn switch_to_tab(&self, index: u32) -> Result<(), FacadeError>;
    async fn close_tab(&self, index: Option<u32>) -> Result<(), FacadeError>;

    async fn cookie_get(&self, name: Option<&str>) -> Result<serde_json::Value, FacadeError>;
    async fn cookie_set(&self, name: &str, value: &str) -> Result<(), FacadeError>;
    async fn cookie_delete(&self, name: &str) -> Result<(), FacadeError>;

    async fn storage_get(&self, key: Option<&str>) -> Result<serde_json::Value, FacadeError>;
    async fn storage_set(&self, key: &str, value: &str) -> Result<(), FacadeError>;
    async fn storage_delete(&self, key: &str) -> Result<(), FacadeError>;

    async fn arm_dialog(&self, accept: bool, prompt_text: Option<&str>) -> Result<(), FacadeError>;
    async fn inject_script(&self, script_path: &str) -> Result<(), FacadeError>;
    async fn remove_highlights(&self) -> Result<(), FacadeError>;

    async fn extract_text(&self, selector: Option<&str>) -> Result<String, FacadeError>;
    async fn extract_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>, FacadeError>;
    async fn get_page_html(&self) -> Result<String, FacadeError>;

    /// Returns the current browser state summary. When `recompute_hashes` is
    /// false, implementations should reuse the last computed `branch_path_hash`
    /// values rather than re-deriving them (SPEC_FULL.md §4.7.7 step 1 vs. the
    /// per-action re-checks use different recompute settings).
    async fn get_state_summary(&self, recompute_hashes: bool) -> Result<BrowserStateSummary, FacadeError>;

    fn is_launched(&self) -> bool;
}
