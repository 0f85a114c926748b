//! Default application - fills schema-declared defaults into JSON documents.
//!
//! The pass never fails and never mutates its input. Rules:
//! - `null` is a terminal value and never receives defaults or substructure
//! - defaults only fill object properties whose key is absent
//! - required properties are never defaulted
//! - arrays keep their length; each item is defaulted against its items schema
//! - `allOf` applies every branch; `anyOf`/`oneOf` apply the matching
//!   branches, falling back to all branches when the match is empty or
//!   (for `oneOf`) ambiguous

use serde_json::{Map, Value};

use crate::error::DefaultsError;
use crate::loader::load_schema_str;
use crate::schema::{NodeId, Schema, SchemaNode};
use crate::types::{ApplyOptions, Combinator};

/// Apply schema defaults to `value`, returning a new document.
///
/// # Example
///
/// ```
/// use schema_defaults::{apply_defaults, Schema};
/// use serde_json::json;
///
/// let schema = Schema::compile(&json!({
///     "properties": {
///         "name": { "default": "Unknown" },
///         "email": { "default": "x@example.com" }
///     },
///     "required": ["name"]
/// }))
/// .unwrap();
///
/// let result = apply_defaults(&json!({}), &schema);
/// assert_eq!(result, json!({ "email": "x@example.com" }));
/// ```
pub fn apply_defaults(value: &Value, schema: &Schema) -> Value {
    apply_defaults_with_options(value, schema, &ApplyOptions::default())
}

/// Apply schema defaults with explicit options.
pub fn apply_defaults_with_options(
    value: &Value,
    schema: &Schema,
    options: &ApplyOptions,
) -> Value {
    let mut pass = DefaultsPass {
        schema,
        options,
        active: Vec::new(),
    };
    pass.apply(value, schema.root())
}

/// Compile `schema` and apply its defaults to `value` in one call.
///
/// # Errors
///
/// Returns `CompileError` if the schema cannot be compiled.
pub fn apply_defaults_from_value(
    value: &Value,
    schema: &Value,
) -> Result<Value, crate::error::CompileError> {
    let schema = Schema::compile(schema)?;
    Ok(apply_defaults(value, &schema))
}

/// Parse and compile `schema`, then apply its defaults to `value`.
///
/// # Errors
///
/// Returns `DefaultsError::Load` for invalid JSON or `DefaultsError::Compile`
/// if the schema cannot be compiled.
pub fn apply_defaults_from_str(value: &Value, schema: &str) -> Result<Value, DefaultsError> {
    let document = load_schema_str(schema)?;
    Ok(apply_defaults_from_value(value, &document)?)
}

impl Schema {
    /// Apply this schema's defaults to `value`. See [`apply_defaults`].
    pub fn apply_defaults(&self, value: &Value) -> Value {
        apply_defaults(value, self)
    }
}

struct DefaultsPass<'a> {
    schema: &'a Schema,
    options: &'a ApplyOptions,
    /// Terminal nodes being applied, outermost first.
    active: Vec<NodeId>,
}

impl DefaultsPass<'_> {
    fn apply(&mut self, value: &Value, id: NodeId) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        if self.active.len() >= self.options.max_depth {
            tracing::warn!(
                max_depth = self.options.max_depth,
                pointer = self.schema.node(id).pointer(),
                "depth limit reached, leaving value unchanged"
            );
            return value.clone();
        }

        let schema = self.schema;
        let terminal = schema.resolve_id(id);
        let node = schema.node(terminal);
        tracing::trace!(pointer = node.pointer(), "applying defaults");

        self.active.push(terminal);
        let result = if !node.branches(Combinator::AllOf).is_empty() {
            self.apply_combinator(value, node, Combinator::AllOf)
        } else if !node.branches(Combinator::OneOf).is_empty() {
            self.apply_combinator(value, node, Combinator::OneOf)
        } else if !node.branches(Combinator::AnyOf).is_empty() {
            self.apply_combinator(value, node, Combinator::AnyOf)
        } else {
            self.apply_direct(value, node)
        };
        self.active.pop();

        result
    }

    /// Object and array rules of `node` itself, ignoring combinators.
    fn apply_direct(&mut self, value: &Value, node: &SchemaNode) -> Value {
        if node.properties().is_some() {
            return match value {
                Value::Object(map) => Value::Object(self.apply_object(map, node)),
                // Type mismatch: defaulting does not coerce
                other => other.clone(),
            };
        }

        if node.array_hint() {
            if let Value::Array(items) = value {
                return Value::Array(self.apply_array(items, node));
            }
        }

        value.clone()
    }

    fn apply_object(
        &mut self,
        map: &Map<String, Value>,
        node: &SchemaNode,
    ) -> Map<String, Value> {
        let mut result = map.clone();

        for (name, prop) in node.properties().unwrap_or_default() {
            if node.is_required(name) {
                continue;
            }

            let updated = match result.get(name) {
                None => self.synthesize(*prop),
                // Explicit null stays null
                Some(Value::Null) => None,
                Some(existing) => Some(self.apply(existing, *prop)),
            };

            if let Some(value) = updated {
                result.insert(name.clone(), value);
            }
        }

        result
    }

    fn apply_array(&mut self, items: &[Value], node: &SchemaNode) -> Vec<Value> {
        let Some(schema_items) = node.items() else {
            return items.to_vec();
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| match schema_items.schema_for(i) {
                Some(item_schema) => self.apply(item, item_schema),
                None => item.clone(),
            })
            .collect()
    }

    fn apply_combinator(
        &mut self,
        value: &Value,
        node: &SchemaNode,
        combinator: Combinator,
    ) -> Value {
        let branches = node.branches(combinator);

        let selected: Vec<NodeId> = match combinator {
            Combinator::AllOf => branches.to_vec(),
            Combinator::AnyOf | Combinator::OneOf => {
                let matching: Vec<NodeId> = branches
                    .iter()
                    .copied()
                    .filter(|&branch| self.schema.is_valid(branch, value))
                    .collect();

                let unique = matching.len() == 1;
                let usable = match combinator {
                    Combinator::OneOf => unique,
                    _ => !matching.is_empty(),
                };

                if usable {
                    matching
                } else {
                    tracing::debug!(
                        pointer = node.pointer(),
                        keyword = combinator.keyword(),
                        matched = matching.len(),
                        branches = branches.len(),
                        "no usable branch match, applying defaults from every branch"
                    );
                    branches.to_vec()
                }
            }
        };

        let mut result = value.clone();
        for branch in selected {
            result = self.apply(&result, branch);
        }

        // Own properties/items go on top of the branch results
        self.apply_direct(&result, node)
    }

    /// Value to insert for an absent, non-required property, if any.
    fn synthesize(&mut self, prop: NodeId) -> Option<Value> {
        let schema = self.schema;
        let terminal = schema.resolve_id(prop);
        let node = schema.node(terminal);

        // An enclosing node would insert the same value again, forever
        if self.active.contains(&terminal) {
            tracing::debug!(
                pointer = node.pointer(),
                "recursive schema, not synthesizing nested value"
            );
            return None;
        }

        if let Some(default) = node.default_value() {
            // Defaults are themselves defaulted so a second pass changes nothing
            return Some(self.apply(default, prop));
        }

        let seed = structural_seed(schema, node)?;
        let synthesized = self.apply(&seed, prop);

        is_non_empty(&synthesized).then_some(synthesized)
    }
}

/// Empty object or array suggested by `node` or, failing that, by the first
/// combinator branch that hints at one.
fn structural_seed(schema: &Schema, node: &SchemaNode) -> Option<Value> {
    if let Some(seed) = direct_seed(node) {
        return Some(seed);
    }

    [Combinator::AllOf, Combinator::AnyOf, Combinator::OneOf]
        .iter()
        .flat_map(|&c| node.branches(c))
        .find_map(|&branch| direct_seed(schema.resolve(branch)))
}

fn direct_seed(node: &SchemaNode) -> Option<Value> {
    if node.object_hint() {
        Some(Value::Object(Map::new()))
    } else if node.array_hint() {
        Some(Value::Array(Vec::new()))
    } else {
        None
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(schema: Value) -> Schema {
        Schema::compile(&schema).unwrap()
    }

    #[test]
    fn null_value_is_terminal() {
        let schema = compile(json!({ "properties": { "a": { "default": 1 } } }));
        assert_eq!(apply_defaults(&Value::Null, &schema), Value::Null);
    }

    #[test]
    fn scalar_schema_passes_through() {
        let schema = compile(json!({ "type": "string", "default": "x" }));
        assert_eq!(apply_defaults(&json!("given"), &schema), json!("given"));
    }

    #[test]
    fn type_mismatch_returns_input() {
        let schema = compile(json!({ "properties": { "a": { "default": 1 } } }));
        assert_eq!(apply_defaults(&json!("text"), &schema), json!("text"));
        assert_eq!(apply_defaults(&json!([1, 2]), &schema), json!([1, 2]));
    }

    #[test]
    fn untyped_properties_imply_object() {
        let schema = compile(json!({ "properties": { "a": { "default": 1 } } }));
        assert_eq!(apply_defaults(&json!({}), &schema), json!({ "a": 1 }));
    }

    #[test]
    fn existing_values_are_kept() {
        let schema = compile(json!({ "properties": { "a": { "default": 1 } } }));
        assert_eq!(apply_defaults(&json!({ "a": 5 }), &schema), json!({ "a": 5 }));
    }

    #[test]
    fn unknown_keys_are_copied() {
        let schema = compile(json!({ "properties": { "a": { "default": 1 } } }));
        assert_eq!(
            apply_defaults(&json!({ "extra": true }), &schema),
            json!({ "extra": true, "a": 1 })
        );
    }

    #[test]
    fn explicit_null_default_is_inserted() {
        let schema = compile(json!({ "properties": { "a": { "default": null } } }));
        assert_eq!(apply_defaults(&json!({}), &schema), json!({ "a": null }));
    }

    #[test]
    fn default_object_receives_nested_defaults() {
        let schema = compile(json!({
            "properties": {
                "cfg": {
                    "default": { "mode": "fast" },
                    "properties": { "level": { "default": 3 } }
                }
            }
        }));
        let once = apply_defaults(&json!({}), &schema);
        assert_eq!(once, json!({ "cfg": { "mode": "fast", "level": 3 } }));
        assert_eq!(apply_defaults(&once, &schema), once);
    }

    #[test]
    fn array_without_items_is_copied() {
        let schema = compile(json!({ "type": "array" }));
        assert_eq!(apply_defaults(&json!([{}, 1]), &schema), json!([{}, 1]));
    }

    #[test]
    fn structural_seed_from_combinator_branch() {
        let schema = compile(json!({
            "properties": {
                "meta": {
                    "anyOf": [
                        { "properties": { "v": { "default": 1 } } },
                        { "type": "string" }
                    ]
                }
            }
        }));
        assert_eq!(apply_defaults(&json!({}), &schema), json!({ "meta": { "v": 1 } }));
    }

    #[test]
    fn recursive_schema_stops_synthesizing() {
        let schema = compile(json!({
            "properties": {
                "name": { "default": "node" },
                "child": { "$ref": "#" }
            }
        }));
        assert_eq!(apply_defaults(&json!({}), &schema), json!({ "name": "node" }));
        assert_eq!(
            apply_defaults(&json!({ "child": {} }), &schema),
            json!({ "child": { "name": "node" }, "name": "node" })
        );
    }

    #[test]
    fn recursive_default_is_not_expanded() {
        let schema = compile(json!({
            "definitions": {
                "n": {
                    "default": {},
                    "properties": { "child": { "$ref": "#/definitions/n" } }
                }
            },
            "properties": { "child": { "$ref": "#/definitions/n" } }
        }));

        let once = apply_defaults(&json!({}), &schema);
        assert_eq!(once, json!({ "child": {} }));
        assert_eq!(apply_defaults(&once, &schema), once);
    }

    #[test]
    fn recursive_default_keeps_supplied_depth() {
        let schema = compile(json!({
            "definitions": {
                "n": {
                    "default": { "label": "leaf" },
                    "properties": {
                        "child": { "$ref": "#/definitions/n" },
                        "size": { "default": 1 }
                    }
                }
            },
            "properties": { "child": { "$ref": "#/definitions/n" } }
        }));

        let input = json!({ "child": { "child": {} } });
        assert_eq!(
            apply_defaults(&input, &schema),
            json!({ "child": { "child": { "size": 1 }, "size": 1 } })
        );
    }

    #[test]
    fn depth_limit_leaves_deep_values_unchanged() {
        let schema = compile(json!({
            "properties": {
                "a": {
                    "properties": {
                        "b": { "properties": { "c": { "default": 1 } } }
                    }
                }
            }
        }));
        let input = json!({ "a": { "b": {} } });

        let unlimited = apply_defaults(&input, &schema);
        assert_eq!(unlimited, json!({ "a": { "b": { "c": 1 } } }));

        let limited =
            apply_defaults_with_options(&input, &schema, &ApplyOptions::new().max_depth(2));
        assert_eq!(limited, input);
    }

    #[test]
    fn from_str_reports_invalid_json() {
        let result = apply_defaults_from_str(&json!({}), "{ nope");
        assert!(matches!(result, Err(DefaultsError::Load(_))));
    }

    #[test]
    fn from_value_compiles_and_applies() {
        let result = apply_defaults_from_value(
            &json!({}),
            &json!({ "properties": { "a": { "default": "x" } } }),
        )
        .unwrap();
        assert_eq!(result, json!({ "a": "x" }));
    }
}
