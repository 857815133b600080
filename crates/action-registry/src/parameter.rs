use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Type tag for one action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Null => value.is_null(),
        }
    }
}

/// Describes one tool parameter: type, requiredness, description, and
/// type-specific constraints. See SPEC_FULL.md §3 ActionParameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionParameter {
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ActionParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ActionParameter>>,
}

impl ActionParameter {
    pub fn new(param_type: ParamType, required: bool, description: impl Into<String>) -> Self {
        Self {
            param_type,
            required,
            description: description.into(),
            pattern: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            properties: BTreeMap::new(),
            items: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_items(mut self, item: ActionParameter) -> Self {
        self.items = Some(Box::new(item));
        self
    }

    /// Validates that `field_name` is well-formed at registration time: every
    /// field named in SPEC_FULL.md §3 must be present and well-typed.
    pub fn validate_shape(&self, field_name: &str) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err(format!("parameter '{field_name}' is missing a description"));
        }
        if let Some(pattern) = &self.pattern {
            if self.param_type != ParamType::String {
                return Err(format!(
                    "parameter '{field_name}' declares a pattern but is not of type string"
                ));
            }
            regex::Regex::new(pattern)
                .map_err(|e| format!("parameter '{field_name}' has invalid pattern: {e}"))?;
        }
        if self.param_type == ParamType::Array && self.items.is_none() {
            return Err(format!(
                "parameter '{field_name}' is an array but declares no item schema"
            ));
        }
        for (name, nested) in &self.properties {
            nested.validate_shape(name)?;
        }
        if let Some(items) = &self.items {
            items.validate_shape(&format!("{field_name}[]"))?;
        }
        Ok(())
    }

    /// Checks one concrete JSON value against this parameter's constraints.
    /// `deep` additionally recurses into nested object/array shapes.
    pub fn check(&self, field_name: &str, value: &Value, deep: bool) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.param_type.matches(value) {
            errors.push(format!(
                "parameter '{field_name}' expected type {:?}, got {value}",
                self.param_type
            ));
            return errors;
        }
        if let Some(pattern) = &self.pattern {
            if let Some(text) = value.as_str() {
                if let Ok(re) = regex::Regex::new(pattern) {
                    if !re.is_match(text) {
                        errors.push(format!(
                            "parameter '{field_name}' does not match pattern {pattern}"
                        ));
                    }
                }
            }
        }
        if let Some(enum_values) = &self.enum_values {
            if !enum_values.contains(value) {
                errors.push(format!("parameter '{field_name}' is not one of the allowed values"));
            }
        }
        if let Some(min) = self.minimum {
            if let Some(n) = value.as_f64() {
                if n < min {
                    errors.push(format!("parameter '{field_name}' is below minimum {min}"));
                }
            }
        }
        if let Some(max) = self.maximum {
            if let Some(n) = value.as_f64() {
                if n > max {
                    errors.push(format!("parameter '{field_name}' is above maximum {max}"));
                }
            }
        }
        if deep && self.param_type == ParamType::Object {
            if let Some(obj) = value.as_object() {
                for (key, prop) in &self.properties {
                    match obj.get(key) {
                        Some(v) => errors.extend(prop.check(key, v, deep)),
                        None if prop.required => {
                            errors.push(format!("missing required property '{key}' in '{field_name}'"))
                        }
                        None => {}
                    }
                }
                for key in obj.keys() {
                    if !self.properties.contains_key(key) {
                        errors.push(format!(
                            "unknown property '{key}' in '{field_name}' (deep validation)"
                        ));
                    }
                }
            }
        }
        if deep && self.param_type == ParamType::Array {
            if let (Some(items_schema), Some(arr)) = (&self.items, value.as_array()) {
                for (i, item) in arr.iter().enumerate() {
                    errors.extend(items_schema.check(&format!("{field_name}[{i}]"), item, deep));
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_pattern_rejects_non_matching_value() {
        let param = ActionParameter::new(ParamType::String, true, "a url").with_pattern("^https?://.+");
        let errors = param.check("url", &json!("not-a-url"), false);
        assert!(!errors.is_empty());
    }

    #[test]
    fn array_without_items_fails_shape_validation() {
        let param = ActionParameter::new(ParamType::Array, true, "a list");
        assert!(param.validate_shape("items").is_err());
    }

    #[test]
    fn deep_validation_catches_unknown_properties() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "name".to_string(),
            ActionParameter::new(ParamType::String, true, "name"),
        );
        let param = ActionParameter {
            properties,
            ..ActionParameter::new(ParamType::Object, true, "an object")
        };
        let errors = param.check("obj", &json!({"name": "a", "extra": 1}), true);
        assert!(errors.iter().any(|e| e.contains("unknown property")));
    }
}
