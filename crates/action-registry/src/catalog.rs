use std::sync::Arc;

use serde_json::{json, Value};

use crate::definition::ActionDefinition;
use crate::errors::FacadeError;
use crate::parameter::{ActionParameter, ParamType};

fn str_param(desc: &str, required: bool) -> ActionParameter {
    ActionParameter::new(ParamType::String, required, desc)
}

fn index_param(desc: &str) -> ActionParameter {
    ActionParameter::new(ParamType::Number, false, desc).with_range(Some(0.0), None)
}

fn get_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, FacadeError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| FacadeError::Unsupported(format!("missing string parameter '{key}'")))
}

fn get_opt_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn get_u32(params: &Value, key: &str) -> Result<u32, FacadeError> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n as u32)
        .ok_or_else(|| FacadeError::Unsupported(format!("missing numeric parameter '{key}'")))
}

fn get_opt_u32(params: &Value, key: &str) -> Option<u32> {
    params.get(key).and_then(Value::as_u64).map(|n| n as u32)
}

fn get_bool(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Resolves a `selector` parameter, falling back to deriving one from
/// `index` against the facade's most recent state summary
/// (SPEC_FULL.md §4.2, see `DomHistoryElement::derived_selector`).
async fn resolve_selector(
    facade: &Arc<dyn crate::facade::BrowserFacade>,
    params: &Value,
) -> Result<String, FacadeError> {
    if let Some(selector) = get_opt_str(params, "selector") {
        return Ok(selector.to_string());
    }
    let index = get_u32(params, "index")?;
    let state = facade.get_state_summary(false).await?;
    state
        .selector_map
        .get(&index.to_string())
        .map(|el| el.derived_selector())
        .ok_or_else(|| FacadeError::ElementNotFound(format!("index {index}")))
}

/// Registers the built-in action catalog (SPEC_FULL.md §4.2 table). Each
/// callback translates validated JSON parameters into one or more
/// `BrowserFacade` calls.
pub fn builtin_catalog() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition::new(
            "goto",
            "Navigate the active tab to an absolute URL.",
            vec![("url".to_string(), str_param("absolute http(s) URL", true).with_pattern("^https?://.+"))],
            Arc::new(|facade, params| {
                Box::pin(async move {
                    let url = get_str(&params, "url")?;
                    facade.navigate(url).await?;
                    Ok(json!({"navigated_to": url}))
                })
            }),
        ),
        ActionDefinition::new(
            "refresh",
            "Reload the current page.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                facade.refresh().await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "go_back",
            "Navigate to the previous entry in browser history.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                facade.go_back().await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "go_forward",
            "Navigate to the next entry in browser history.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                facade.go_forward().await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "new_tab",
            "Open a new browser tab, optionally navigating it immediately.",
            vec![("url".to_string(), str_param("URL to open in the new tab", false))],
            Arc::new(|facade, params| Box::pin(async move {
                let url = get_opt_str(&params, "url");
                let tab_index = facade.new_tab(url).await?;
                Ok(json!({"tab_index": tab_index}))
            })),
        ),
        ActionDefinition::new(
            "switch_to_tab",
            "Bring an existing tab to the foreground by its index.",
            vec![("index".to_string(), ActionParameter::new(ParamType::Number, true, "target tab index").with_range(Some(0.0), None))],
            Arc::new(|facade, params| Box::pin(async move {
                let index = get_u32(&params, "index")?;
                facade.switch_to_tab(index).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "close_tab",
            "Close a tab by index, or the active tab if no index is given.",
            vec![("index".to_string(), index_param("tab index to close"))],
            Arc::new(|facade, params| Box::pin(async move {
                facade.close_tab(get_opt_u32(&params, "index")).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "click",
            "Click an element, addressed by CSS selector or selector-map index.",
            vec![
                ("selector".to_string(), str_param("CSS selector", false)),
                ("index".to_string(), index_param("selector-map index")),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let selector = resolve_selector(&facade, &params).await?;
                facade.click(&selector).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "type",
            "Type text into an input element, addressed by selector or index.",
            vec![
                ("selector".to_string(), str_param("CSS selector", false)),
                ("index".to_string(), index_param("selector-map index")),
                ("text".to_string(), str_param("text to type", true)),
                ("clear_first".to_string(), ActionParameter::new(ParamType::Boolean, false, "clear the field before typing")),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let selector = resolve_selector(&facade, &params).await?;
                let text = get_str(&params, "text")?;
                let clear_first = get_bool(&params, "clear_first", true);
                facade.type_text(&selector, text, clear_first).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "scroll_to",
            "Scroll an element, addressed by selector or index, into view.",
            vec![
                ("selector".to_string(), str_param("CSS selector", false)),
                ("index".to_string(), index_param("selector-map index")),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let selector = resolve_selector(&facade, &params).await?;
                facade.scroll_to(&selector).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "select_option",
            "Select an option within a <select> element by its value.",
            vec![
                ("selector".to_string(), str_param("CSS selector", false)),
                ("index".to_string(), index_param("selector-map index")),
                ("value".to_string(), str_param("option value to select", true)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let selector = resolve_selector(&facade, &params).await?;
                let value = get_str(&params, "value")?;
                facade.select_option(&selector, value).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "upload_file",
            "Attach a local file to a file input element.",
            vec![
                ("selector".to_string(), str_param("CSS selector of the file input", true)),
                ("file_path".to_string(), str_param("absolute path to the file", true)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let selector = get_str(&params, "selector")?;
                let file_path = get_str(&params, "file_path")?;
                facade.upload_file(selector, file_path).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "drag_and_drop",
            "Drag a source element and drop it onto a target element.",
            vec![
                ("source_selector".to_string(), str_param("CSS selector of the drag source", true)),
                ("target_selector".to_string(), str_param("CSS selector of the drop target", true)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let source = get_str(&params, "source_selector")?;
                let target = get_str(&params, "target_selector")?;
                facade.drag_and_drop(source, target).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "handle_dialog",
            "Arm the next native dialog (alert/confirm/prompt) with a response.",
            vec![
                ("accept".to_string(), ActionParameter::new(ParamType::Boolean, false, "accept or dismiss the dialog (default true)")),
                ("prompt_text".to_string(), str_param("text to enter for a prompt() dialog", false)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let accept = get_bool(&params, "accept", true);
                let prompt_text = get_opt_str(&params, "prompt_text");
                facade.arm_dialog(accept, prompt_text).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "extract_text",
            "Extract the visible text content of an element, or the whole page.",
            vec![("selector".to_string(), str_param("CSS selector", false))],
            Arc::new(|facade, params| Box::pin(async move {
                let text = facade.extract_text(get_opt_str(&params, "selector")).await?;
                Ok(json!(text))
            })),
        ),
        ActionDefinition::new(
            "extract_attribute",
            "Read one HTML attribute off an element.",
            vec![
                ("selector".to_string(), str_param("CSS selector", true)),
                ("attribute".to_string(), str_param("attribute name", true)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let selector = get_str(&params, "selector")?;
                let attribute = get_str(&params, "attribute")?;
                let value = facade.extract_attribute(selector, attribute).await?;
                Ok(json!(value))
            })),
        ),
        ActionDefinition::new(
            "get_page_html",
            "Return the full serialized HTML of the current page.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                Ok(json!(facade.get_page_html().await?))
            })),
        ),
        ActionDefinition::new(
            "get_clickable_elements",
            "List every interactable element in the current selector map.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                let state = facade.get_state_summary(true).await?;
                Ok(json!(state.selector_map))
            })),
        ),
        ActionDefinition::new(
            "get_all_visible_text_nodes",
            "List the text content of every element in the current selector map.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                let state = facade.get_state_summary(false).await?;
                let texts: Vec<&str> = state.selector_map.values().map(|e| e.text.as_str()).collect();
                Ok(json!(texts))
            })),
        ),
        ActionDefinition::new(
            "screenshot",
            "Capture a base64-encoded PNG screenshot of the current viewport.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                Ok(json!(facade.screenshot().await?))
            })),
        ),
        ActionDefinition::new(
            "highlight_elements",
            "Overlay numbered highlight boxes onto every selector-map element.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                facade.inject_script("highlight_elements.js").await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "remove_highlights",
            "Remove any highlight overlay previously injected.",
            vec![],
            Arc::new(|facade, _params| Box::pin(async move {
                facade.remove_highlights().await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "cookie_get",
            "Read one named cookie, or every cookie if no name is given.",
            vec![("name".to_string(), str_param("cookie name", false))],
            Arc::new(|facade, params| Box::pin(async move {
                facade.cookie_get(get_opt_str(&params, "name")).await
            })),
        ),
        ActionDefinition::new(
            "cookie_set",
            "Set a cookie by name and value on the active origin.",
            vec![
                ("name".to_string(), str_param("cookie name", true)),
                ("value".to_string(), str_param("cookie value", true)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let name = get_str(&params, "name")?;
                let value = get_str(&params, "value")?;
                facade.cookie_set(name, value).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "cookie_delete",
            "Delete a named cookie from the active origin.",
            vec![("name".to_string(), str_param("cookie name", true))],
            Arc::new(|facade, params| Box::pin(async move {
                let name = get_str(&params, "name")?;
                facade.cookie_delete(name).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "storage_get",
            "Read one named key from the active origin's local/session storage, or every entry if no key is given.",
            vec![("key".to_string(), str_param("storage key", false))],
            Arc::new(|facade, params| Box::pin(async move {
                facade.storage_get(get_opt_str(&params, "key")).await
            })),
        ),
        ActionDefinition::new(
            "storage_set",
            "Set a local/session storage entry by key and value on the active origin.",
            vec![
                ("key".to_string(), str_param("storage key", true)),
                ("value".to_string(), str_param("storage value", true)),
            ],
            Arc::new(|facade, params| Box::pin(async move {
                let key = get_str(&params, "key")?;
                let value = get_str(&params, "value")?;
                facade.storage_set(key, value).await?;
                Ok(Value::Null)
            })),
        ),
        ActionDefinition::new(
            "storage_delete",
            "Delete a named local/session storage entry from the active origin.",
            vec![("key".to_string(), str_param("storage key", true))],
            Arc::new(|facade, params| Box::pin(async move {
                let key = get_str(&params, "key")?;
                facade.storage_delete(key).await?;
                Ok(Value::Null)
            })),
        ),
    ]
}
