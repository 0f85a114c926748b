//! Core types for default application.

use serde_json::Value;

/// Recursion depth past which values pass through without defaults.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Draft-07 meta-schema URI, used when building branch validators.
pub const DRAFT7_URI: &str = "http://json-schema.org/draft-07/schema#";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema combinator keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    AllOf,
    AnyOf,
    OneOf,
}

impl Combinator {
    /// Returns the schema keyword for this combinator.
    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::AllOf => "allOf",
            Combinator::AnyOf => "anyOf",
            Combinator::OneOf => "oneOf",
        }
    }
}

/// Options for applying defaults.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Maximum recursion depth. Deeper values are returned unchanged.
    pub max_depth: usize,
}

impl ApplyOptions {
    /// Create options with the default depth limit.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the maximum recursion depth.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn combinator_keywords() {
        assert_eq!(Combinator::AllOf.keyword(), "allOf");
        assert_eq!(Combinator::AnyOf.keyword(), "anyOf");
        assert_eq!(Combinator::OneOf.keyword(), "oneOf");
    }

    #[test]
    fn apply_options_builder() {
        assert_eq!(ApplyOptions::default().max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(ApplyOptions::new().max_depth(4).max_depth, 4);
    }

    #[test]
    fn type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
        assert_eq!(json_type_name(&json!(1.5)), "number");
    }
}
