use action_registry::{BrowserStateSummary, DomHistoryElement};

/// Outcome of re-anchoring a previously-recorded element against a fresh
/// DOM snapshot (SPEC_FULL.md §4.6).
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The element's structural hash is still present; the new index is
    /// returned so the action can be retargeted.
    Found { index: u32 },
    /// No element in the current snapshot shares the recorded hash.
    NotFound,
}

/// Stateless lookup of a historical element inside the current selector
/// map, keyed purely by `branch_path_hash` (SPEC_FULL.md §4.6, grounded on
/// the structural-identity matching idea behind `action-primitives`'
/// `SelfHealInfo`, generalized here to the whole selector map rather than a
/// single anchor descriptor).
pub fn find_history_element_in_tree(
    recorded: &DomHistoryElement,
    current_state: &BrowserStateSummary,
) -> MatchOutcome {
    for (index, candidate) in &current_state.selector_map {
        if candidate.branch_path_hash == recorded.branch_path_hash {
            if let Ok(parsed) = index.parse::<u32>() {
                return MatchOutcome::Found { index: parsed };
            }
        }
    }
    MatchOutcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_registry::{single_tab, BoundingBox};
    use std::collections::BTreeMap;

    fn element(node_id: &str, hash: &str) -> DomHistoryElement {
        DomHistoryElement {
            node_id: node_id.to_string(),
            highlight_index: 0,
            tag_name: "button".to_string(),
            attributes: BTreeMap::new(),
            text: "Submit".to_string(),
            bounding_box: BoundingBox::default(),
            branch_path_hash: hash.to_string(),
        }
    }

    #[test]
    fn finds_element_by_matching_hash_even_after_index_shift() {
        let recorded = element("n5", "stable-hash");
        let mut state = single_tab("https://example.com", "Example");
        state.selector_map.insert("12".to_string(), element("n12", "stable-hash"));
        let outcome = find_history_element_in_tree(&recorded, &state);
        assert_eq!(outcome, MatchOutcome::Found { index: 12 });
    }

    #[test]
    fn reports_not_found_when_hash_is_gone() {
        let recorded = element("n5", "stale-hash");
        let state = single_tab("https://example.com", "Example");
        let outcome = find_history_element_in_tree(&recorded, &state);
        assert_eq!(outcome, MatchOutcome::NotFound);
    }
}
