use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::FacadeError;
use crate::facade::{BrowserFacade, BrowserStateSummary, TabInfo};

/// One dispatched call recorded by `ScriptedBrowserFacade`, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub op: String,
    pub args: Vec<String>,
}

struct Inner {
    launched: bool,
    snapshots: Vec<BrowserStateSummary>,
    cursor: usize,
    calls: Vec<RecordedCall>,
    cookies: BTreeMap<String, String>,
    storage: BTreeMap<String, String>,
}

/// In-memory `BrowserFacade` that replays a pre-programmed sequence of
/// `BrowserStateSummary` snapshots and records every dispatched call.
/// Used throughout the test suite in place of a live browser (SPEC_FULL.md §4.3).
pub struct ScriptedBrowserFacade {
    inner: Mutex<Inner>,
}

impl ScriptedBrowserFacade {
    pub fn new(snapshots: Vec<BrowserStateSummary>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                launched: false,
                snapshots,
                cursor: 0,
                calls: Vec::new(),
                cookies: BTreeMap::new(),
                storage: BTreeMap::new(),
            }),
        }
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    /// Advances the snapshot cursor so the next `get_state_summary` call
    /// observes a later programmed state (simulates DOM drift in tests).
    pub fn advance(&self) {
        let mut inner = self.inner.lock();
        if inner.cursor + 1 < inner.snapshots.len() {
            inner.cursor += 1;
        }
    }

    fn record(&self, op: &str, args: &[&str]) {
        self.inner.lock().calls.push(RecordedCall {
            op: op.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        });
    }

    fn current(&self) -> Result<BrowserStateSummary, FacadeError> {
        let inner = self.inner.lock();
        if !inner.launched {
            return Err(FacadeError::NotLaunched);
        }
        inner
            .snapshots
            .get(inner.cursor)
            .cloned()
            .ok_or(FacadeError::Disconnected)
    }
}

#[async_trait]
impl BrowserFacade for ScriptedBrowserFacade {
    async fn launch(&self, _headless: bool) -> Result<(), FacadeError> {
        self.inner.lock().launched = true;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), FacadeError> {
        self.record("navigate", &[url]);
        Ok(())
    }

    async fn refresh(&self) -> Result<(), FacadeError> {
        self.record("refresh", &[]);
        Ok(())
    }

    async fn go_back(&self) -> Result<(), FacadeError> {
        self.record("go_back", &[]);
        Ok(())
    }

    async fn go_forward(&self) -> Result<(), FacadeError> {
        self.record("go_forward", &[]);
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), FacadeError> {
        self.record("click", &[selector]);
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, clear_first: bool) -> Result<(), FacadeError> {
        self.record("type", &[selector, text, &clear_first.to_string()]);
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), FacadeError> {
        self.record("select_option", &[selector, value]);
        Ok(())
    }

    async fn drag_and_drop(&self, source_selector: &str, target_selector: &str) -> Result<(), FacadeError> {
        self.record("drag_and_drop", &[source_selector, target_selector]);
        Ok(())
    }

    async fn upload_file(&self, selector: &str, file_path: &str) -> Result<(), FacadeError> {
        self.record("upload_file", &[selector, file_path]);
        Ok(())
    }

    async fn scroll_to(&self, selector: &str) -> Result<(), FacadeError> {
        self.record("scroll_to", &[selector]);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, FacadeError> {
        self.record("evaluate", &[script]);
        Ok(serde_json::Value::Null)
    }

    async fn screenshot(&self) -> Result<String, FacadeError> {
        self.record("screenshot", &[]);
        Ok("MOCKBASE64".to_string())
    }

    async fn new_tab(&self, url: Option<&str>) -> Result<u32, FacadeError> {
        self.record("new_tab", &[url.unwrap_or("")]);
        Ok(self.current()?.tabs.len() as u32)
    }

    async fn switch_to_tab(&self, index: u32) -> Result<(), FacadeError> {
        let tabs = self.current()?.tabs;
        if (index as usize) >= tabs.len() {
            return Err(FacadeError::TabOutOfRange(index));
        }
        self.record("switch_to_tab", &[&index.to_string()]);
        Ok(())
    }

    async fn close_tab(&self, index: Option<u32>) -> Result<(), FacadeError> {
        self.record("close_tab", &[&index.map(|i| i.to_string()).unwrap_or_default()]);
        Ok(())
    }

    async fn cookie_get(&self, name: Option<&str>) -> Result<serde_json::Value, FacadeError> {
        let inner = self.inner.lock();
        match name {
            Some(n) => Ok(serde_json::json!(inner.cookies.get(n))),
            None => Ok(serde_json::json!(inner.cookies)),
        }
    }

    async fn cookie_set(&self, name: &str, value: &str) -> Result<(), FacadeError> {
        self.inner
            .lock()
            .cookies
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn cookie_delete(&self, name: &str) -> Result<(), FacadeError> {
        self.inner.lock().cookies.remove(name);
        Ok(())
    }

    async fn storage_get(&self, key: Option<&str>) -> Result<serde_json::Value, FacadeError> {
        let inner = self.inner.lock();
        match key {
            Some(k) => Ok(serde_json::json!(inner.storage.get(k))),
            None => Ok(serde_json::json!(inner.storage)),
        }
    }

    async fn storage_set(&self, key: &str, value: &str) -> Result<(), FacadeError> {
        self.inner
            .lock()
            .storage
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn storage_delete(&self, key: &str) -> Result<(), FacadeError> {
        self.inner.lock().storage.remove(key);
        Ok(())
    }

    async fn arm_dialog(&self, accept: bool, prompt_text: Option<&str>) -> Result<(), FacadeError> {
        self.record("handle_dialog", &[&accept.to_string(), prompt_text.unwrap_or("")]);
        Ok(())
    }

    async fn inject_script(&self, script_path: &str) -> Result<(), FacadeError> {
        self.record("highlight_elements", &[script_path]);
        Ok(())
    }

    async fn remove_highlights(&self) -> Result<(), FacadeError> {
        self.record("remove_highlights", &[]);
        Ok(())
    }

    async fn extract_text(&self, selector: Option<&str>) -> Result<String, FacadeError> {
        self.record("extract_text", &[selector.unwrap_or("")]);
        Ok(self.current()?.title)
    }

    async fn extract_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>, FacadeError> {
        self.record("extract_attribute", &[selector, attribute]);
        Ok(None)
    }

    async fn get_page_html(&self) -> Result<String, FacadeError> {
        self.record("get_page_html", &[]);
        Ok(format!("<html><title>{}</title></html>", self.current()?.title))
    }

    async fn get_state_summary(&self, _recompute_hashes: bool) -> Result<BrowserStateSummary, FacadeError> {
        self.current()
    }

    fn is_launched(&self) -> bool {
        self.inner.lock().launched
    }
}

/// Builds a minimal single-element snapshot, useful as a test fixture.
pub fn single_tab(url: &str, title: &str) -> BrowserStateSummary {
    BrowserStateSummary {
        url: url.to_string(),
        title: title.to_string(),
        screenshot_base64: None,
        tabs: vec![TabInfo {
            id: 0,
            title: title.to_string(),
            url: url.to_string(),
            active: true,
        }],
        selector_map: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{BoundingBox, DomHistoryElement};

    fn snapshot_with_element(index: u32, hash: &str) -> BrowserStateSummary {
        let mut s = single_tab("https://example.com", "Example");
        s.selector_map.insert(
            index.to_string(),
            DomHistoryElement {
                node_id: format!("n{index}"),
                highlight_index: index,
                tag_name: "button".to_string(),
                attributes: BTreeMap::new(),
                text: "Submit".to_string(),
                bounding_box: BoundingBox::default(),
                branch_path_hash: hash.to_string(),
            },
        );
        s
    }

    #[tokio::test]
    async fn records_calls_and_replays_snapshots() {
        let facade = ScriptedBrowserFacade::new(vec![
            snapshot_with_element(5, "h1"),
            snapshot_with_element(5, "h2"),
        ]);
        facade.launch(true).await.unwrap();
        let s0 = facade.get_state_summary(true).await.unwrap();
        assert_eq!(s0.hash_for_index(5), Some("h1"));
        facade.advance();
        let s1 = facade.get_state_summary(true).await.unwrap();
        assert_eq!(s1.hash_for_index(5), Some("h2"));
        facade.click("#n5").await.unwrap();
        assert_eq!(facade.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn not_launched_rejects_state_summary() {
        let facade = ScriptedBrowserFacade::new(vec![single_tab("https://example.com", "Example")]);
        let err = facade.get_state_summary(true).await.unwrap_err();
        assert!(matches!(err, FacadeError::NotLaunched));
    }
}
