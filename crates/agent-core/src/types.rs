use serde::{Deserialize, Serialize};

/// Marker params struct shared by every action that takes no arguments.
/// Using a struct instead of a true unit variant keeps every `ActionModel`
/// variant serializing as `{name: {...}}`, never a bare string, which the
/// LLM-facing wire format and the action registry both depend on
/// (SPEC_FULL.md §3, §9).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoParams {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTabParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchToTabParams {
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseTabParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_first: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollToParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOptionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFileParams {
    pub selector: String,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragAndDropParams {
    pub source_selector: String,
    pub target_selector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleDialogParams {
    pub accept: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractTextParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractAttributeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieGetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieSetParams {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieDeleteParams {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoneParams {
    pub success: bool,
    pub text: String,
}

/// The closed set of actions the agent can emit, one per built-in catalog
/// entry (SPEC_FULL.md §4.2 table). Externally tagged so serde's default
/// representation produces exactly the `{action_name: {params...}}` shape
/// the wire format and action registry expect; see SPEC_FULL.md §9 for the
/// dynamic-schema-to-static-polymorphism rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionModel {
    Goto(GotoParams),
    Refresh(EmptyParams),
    GoBack(EmptyParams),
    GoForward(EmptyParams),
    NewTab(NewTabParams),
    SwitchToTab(SwitchToTabParams),
    CloseTab(CloseTabParams),
    Click(ClickParams),
    Type(TypeParams),
    ScrollTo(ScrollToParams),
    SelectOption(SelectOptionParams),
    UploadFile(UploadFileParams),
    DragAndDrop(DragAndDropParams),
    HandleDialog(HandleDialogParams),
    ExtractText(ExtractTextParams),
    ExtractAttribute(ExtractAttributeParams),
    GetPageHtml(EmptyParams),
    GetClickableElements(EmptyParams),
    GetAllVisibleTextNodes(EmptyParams),
    Screenshot(EmptyParams),
    HighlightElements(EmptyParams),
    RemoveHighlights(EmptyParams),
    CookieGet(CookieGetParams),
    CookieSet(CookieSetParams),
    CookieDelete(CookieDeleteParams),
    Done(DoneParams),
}

impl ActionModel {
    /// The registry/catalog name this variant dispatches to.
    pub fn action_name(&self) -> &'static str {
        match self {
            ActionModel::Goto(_) => "goto",
            ActionModel::Refresh(_) => "refresh",
            ActionModel::GoBack(_) => "go_back",
            ActionModel::GoForward(_) => "go_forward",
            ActionModel::NewTab(_) => "new_tab",
            ActionModel::SwitchToTab(_) => "switch_to_tab",
            ActionModel::CloseTab(_) => "close_tab",
            ActionModel::Click(_) => "click",
            ActionModel::Type(_) => "type",
            ActionModel::ScrollTo(_) => "scroll_to",
            ActionModel::SelectOption(_) => "select_option",
            ActionModel::UploadFile(_) => "upload_file",
            ActionModel::DragAndDrop(_) => "drag_and_drop",
            ActionModel::HandleDialog(_) => "handle_dialog",
            ActionModel::ExtractText(_) => "extract_text",
            ActionModel::ExtractAttribute(_) => "extract_attribute",
            ActionModel::GetPageHtml(_) => "get_page_html",
            ActionModel::GetClickableElements(_) => "get_clickable_elements",
            ActionModel::GetAllVisibleTextNodes(_) => "get_all_visible_text_nodes",
            ActionModel::Screenshot(_) => "screenshot",
            ActionModel::HighlightElements(_) => "highlight_elements",
            ActionModel::RemoveHighlights(_) => "remove_highlights",
            ActionModel::CookieGet(_) => "cookie_get",
            ActionModel::CookieSet(_) => "cookie_set",
            ActionModel::CookieDelete(_) => "cookie_delete",
            ActionModel::Done(_) => "done",
        }
    }

    /// Serializes this action's parameters as the raw JSON object the
    /// action registry validates and the controller dispatches.
    pub fn params_value(&self) -> serde_json::Value {
        serde_json::to_value(self).ok().and_then(|v| {
            v.as_object().and_then(|o| o.values().next().cloned())
        }).unwrap_or(serde_json::Value::Null)
    }

    /// The selector-map index this action addresses, if any. Only the
    /// element-targeting actions carry one.
    pub fn index(&self) -> Option<u32> {
        match self {
            ActionModel::Click(p) => p.index,
            ActionModel::Type(p) => p.index,
            ActionModel::ScrollTo(p) => p.index,
            ActionModel::SelectOption(p) => p.index,
            ActionModel::ExtractText(p) => p.index,
            ActionModel::ExtractAttribute(p) => p.index,
            _ => None,
        }
    }

    /// Rewrites the selector-map index in place, used by the history
    /// matcher when it re-anchors an action onto a healed index
    /// (SPEC_FULL.md §4.6).
    pub fn set_index(&mut self, new_index: u32) {
        match self {
            ActionModel::Click(p) => p.index = Some(new_index),
            ActionModel::Type(p) => p.index = Some(new_index),
            ActionModel::ScrollTo(p) => p.index = Some(new_index),
            ActionModel::SelectOption(p) => p.index = Some(new_index),
            ActionModel::ExtractText(p) => p.index = Some(new_index),
            ActionModel::ExtractAttribute(p) => p.index = Some(new_index),
            _ => {}
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ActionModel::Done(_))
    }
}

/// One decision cycle's worth of reasoning plus the actions it proposes
/// (SPEC_FULL.md §3 AgentBrain / AgentOutput). Carried only for
/// logging/telemetry; no behavior depends on these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBrain {
    pub page_summary: String,
    pub evaluation_previous_goal: String,
    pub memory: String,
    pub next_goal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    #[serde(flatten)]
    pub brain: AgentBrain,
    pub actions: Vec<ActionModel>,
}

impl AgentOutput {
    pub fn is_done(&self) -> bool {
        self.actions.iter().any(ActionModel::is_done)
    }

    pub fn done_result(&self) -> Option<&DoneParams> {
        self.actions.iter().find_map(|a| match a {
            ActionModel::Done(p) => Some(p),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn goto_serializes_as_name_keyed_object() {
        let action = ActionModel::Goto(GotoParams { url: "https://example.com".to_string() });
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!({"goto": {"url": "https://example.com"}}));
    }

    #[test]
    fn empty_params_action_is_never_a_bare_string() {
        let action = ActionModel::Refresh(EmptyParams {});
        let value = serde_json::to_value(&action).unwrap();
        assert!(value.is_object());
        assert_eq!(value, json!({"refresh": {}}));
    }

    #[test]
    fn index_accessor_only_applies_to_element_targeting_variants() {
        let mut click = ActionModel::Click(ClickParams { selector: None, index: Some(3), wait_for_selector: None });
        assert_eq!(click.index(), Some(3));
        click.set_index(9);
        assert_eq!(click.index(), Some(9));

        let goto = ActionModel::Goto(GotoParams { url: "https://example.com".to_string() });
        assert_eq!(goto.index(), None);
    }

    #[test]
    fn agent_output_is_done_reflects_done_action() {
        let output = AgentOutput {
            brain: AgentBrain {
                page_summary: "a page".to_string(),
                evaluation_previous_goal: "ok".to_string(),
                memory: "".to_string(),
                next_goal: "finish".to_string(),
            },
            actions: vec![ActionModel::Done(DoneParams { success: true, text: "done".to_string() })],
        };
        assert!(output.is_done());
        assert_eq!(output.done_result().unwrap().text, "done");
    }
}
