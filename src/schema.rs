//! Compiled schema model.
//!
//! A [`Schema`] is an arena of [`SchemaNode`]s built from a JSON Schema
//! document. Nodes carry only the keywords default application needs
//! (`type`, `properties`, `required`, `items`, `default`, `$ref` and the
//! combinators). Full validation is delegated to the `jsonschema` crate.

use std::collections::{HashMap, HashSet};

use jsonschema::{Draft, Validator};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::error::{CompileError, ValidateError, Violation};
use crate::types::{json_type_name, Combinator, DRAFT7_URI};

/// Index of a node inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// The `items` keyword of an array schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    /// One schema for every position.
    Single(NodeId),
    /// Positional schemas; the last one also covers positions past the end.
    Tuple(Vec<NodeId>),
}

impl Items {
    /// Returns the schema governing the item at `index`.
    pub fn schema_for(&self, index: usize) -> Option<NodeId> {
        match self {
            Items::Single(id) => Some(*id),
            Items::Tuple(ids) => ids.get(index).or_else(|| ids.last()).copied(),
        }
    }
}

/// One compiled schema location.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pointer: String,
    types: Vec<String>,
    properties: Option<Vec<(String, NodeId)>>,
    required: Vec<String>,
    items: Option<Items>,
    default: Option<Value>,
    reference: Option<NodeId>,
    all_of: Vec<NodeId>,
    any_of: Vec<NodeId>,
    one_of: Vec<NodeId>,
    terminal: NodeId,
}

impl SchemaNode {
    fn empty(pointer: &str, id: NodeId) -> Self {
        Self {
            pointer: pointer.to_string(),
            types: Vec::new(),
            properties: None,
            required: Vec::new(),
            items: None,
            default: None,
            reference: None,
            all_of: Vec::new(),
            any_of: Vec::new(),
            one_of: Vec::new(),
            terminal: id,
        }
    }

    /// JSON Pointer of this node within the schema document.
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// True if `type` names `name`, alone or in a type array.
    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Declared `properties` in document order, `None` when the keyword is absent.
    pub fn properties(&self) -> Option<&[(String, NodeId)]> {
        self.properties.as_deref()
    }

    /// True if `name` is listed under `required`.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Compiled `items`, `None` when absent or an empty tuple.
    pub fn items(&self) -> Option<&Items> {
        self.items.as_ref()
    }

    /// The literal `default`, including an explicit `null`.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Direct `$ref` target, if any.
    pub fn reference(&self) -> Option<NodeId> {
        self.reference
    }

    /// Branches of the given combinator, in document order.
    pub fn branches(&self, combinator: Combinator) -> &[NodeId] {
        match combinator {
            Combinator::AllOf => &self.all_of,
            Combinator::AnyOf => &self.any_of,
            Combinator::OneOf => &self.one_of,
        }
    }

    /// True if this node suggests the instance is an object.
    pub fn object_hint(&self) -> bool {
        self.properties.is_some() || self.has_type("object")
    }

    /// True if this node suggests the instance is an array.
    pub fn array_hint(&self) -> bool {
        self.has_type("array")
    }
}

/// A compiled JSON Schema, ready for default application and validation.
///
/// Immutable after compilation and safe to share across threads.
pub struct Schema {
    nodes: Vec<SchemaNode>,
    root: NodeId,
    root_validator: Validator,
    branch_validators: HashMap<NodeId, Validator>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.nodes)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Schema {
    /// Compile a schema document.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` for non-local or dangling `$ref`s, cyclic
    /// reference chains, and documents `jsonschema` rejects.
    pub fn compile(document: &Value) -> Result<Self, CompileError> {
        let mut compiler = Compiler {
            document,
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        let root = compiler.compile_at("")?;
        let mut nodes = compiler.nodes;
        resolve_terminals(&mut nodes)?;

        // Documents without $schema are draft-07
        let root_validator = if document.get("$schema").is_some() {
            jsonschema::validator_for(document)
        } else {
            jsonschema::options().with_draft(Draft::Draft7).build(document)
        }
        .map_err(|e| CompileError::InvalidSchema {
            path: String::new(),
            message: e.to_string(),
        })?;

        let mut branch_validators = HashMap::new();
        for node in &nodes {
            for &branch in node.any_of.iter().chain(node.one_of.iter()) {
                if branch_validators.contains_key(&branch) {
                    continue;
                }
                let validator = branch_validator(document, &nodes[branch.0].pointer)?;
                branch_validators.insert(branch, validator);
            }
        }

        tracing::debug!(
            nodes = nodes.len(),
            branch_validators = branch_validators.len(),
            "compiled schema"
        );

        Ok(Self {
            nodes,
            root,
            root_validator,
            branch_validators,
        })
    }

    /// Id of the document root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node stored at `id`, without following `$ref`.
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Follow the `$ref` chain from `id` to the node that declares keywords.
    pub fn resolve(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[self.nodes[id.0].terminal.0]
    }

    /// Id of the node the `$ref` chain from `id` ends at.
    pub fn resolve_id(&self, id: NodeId) -> NodeId {
        self.nodes[id.0].terminal
    }

    /// Whether `value` satisfies the `anyOf`/`oneOf` branch `branch`.
    ///
    /// Branches without a compiled validator never match.
    pub fn is_valid(&self, branch: NodeId, value: &Value) -> bool {
        self.branch_validators
            .get(&branch)
            .map(|v| v.is_valid(value))
            .unwrap_or(false)
    }

    /// Validate a whole document against the root schema.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Invalid` with every violation found.
    pub fn validate(&self, value: &Value) -> Result<(), ValidateError> {
        let errors: Vec<Violation> = self
            .root_validator
            .iter_errors(value)
            .map(|e| Violation {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidateError::Invalid { errors })
        }
    }
}

struct Compiler<'a> {
    document: &'a Value,
    nodes: Vec<SchemaNode>,
    index: HashMap<String, NodeId>,
}

impl Compiler<'_> {
    fn compile_at(&mut self, pointer: &str) -> Result<NodeId, CompileError> {
        if let Some(&id) = self.index.get(pointer) {
            return Ok(id);
        }

        let document = self.document;
        let value = document
            .pointer(pointer)
            .ok_or_else(|| CompileError::InvalidSchema {
                path: pointer.to_string(),
                message: "location does not exist".to_string(),
            })?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode::empty(pointer, id));
        self.index.insert(pointer.to_string(), id);

        let map = match value {
            Value::Object(map) => map,
            // true/false schemas carry no keywords
            Value::Bool(_) => return Ok(id),
            other => {
                return Err(CompileError::InvalidSchema {
                    path: pointer.to_string(),
                    message: format!(
                        "expected object or boolean schema, got {}",
                        json_type_name(other)
                    ),
                })
            }
        };

        // Draft-07: $ref overrides every sibling keyword
        if let Some(reference) = map.get("$ref") {
            let target = self.compile_ref(pointer, reference)?;
            self.nodes[id.0].reference = Some(target);
            return Ok(id);
        }

        let types = map.get("type").map(type_strings).unwrap_or_default();
        let required = map
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let default = map.get("default").cloned();

        let properties = match map.get("properties") {
            None => None,
            Some(Value::Object(props)) => {
                let mut compiled = Vec::with_capacity(props.len());
                for name in props.keys() {
                    let child = child_pointer(pointer, &["properties", name]);
                    compiled.push((name.clone(), self.compile_at(&child)?));
                }
                Some(compiled)
            }
            Some(other) => return Err(keyword_type_error(pointer, "properties", other)),
        };

        let items = match map.get("items") {
            None => None,
            Some(Value::Object(_)) | Some(Value::Bool(_)) => {
                let child = child_pointer(pointer, &["items"]);
                Some(Items::Single(self.compile_at(&child)?))
            }
            Some(Value::Array(arr)) if arr.is_empty() => None,
            Some(Value::Array(arr)) => {
                let mut tuple = Vec::with_capacity(arr.len());
                for i in 0..arr.len() {
                    let child = child_pointer(pointer, &["items", &i.to_string()]);
                    tuple.push(self.compile_at(&child)?);
                }
                Some(Items::Tuple(tuple))
            }
            Some(other) => return Err(keyword_type_error(pointer, "items", other)),
        };

        let all_of = self.compile_branches(pointer, map, Combinator::AllOf)?;
        let any_of = self.compile_branches(pointer, map, Combinator::AnyOf)?;
        let one_of = self.compile_branches(pointer, map, Combinator::OneOf)?;

        let node = &mut self.nodes[id.0];
        node.types = types;
        node.required = required;
        node.default = default;
        node.properties = properties;
        node.items = items;
        node.all_of = all_of;
        node.any_of = any_of;
        node.one_of = one_of;

        Ok(id)
    }

    fn compile_branches(
        &mut self,
        pointer: &str,
        map: &Map<String, Value>,
        combinator: Combinator,
    ) -> Result<Vec<NodeId>, CompileError> {
        let keyword = combinator.keyword();
        match map.get(keyword) {
            None => Ok(Vec::new()),
            Some(Value::Array(arr)) => {
                let mut branches = Vec::with_capacity(arr.len());
                for i in 0..arr.len() {
                    let child = child_pointer(pointer, &[keyword, &i.to_string()]);
                    branches.push(self.compile_at(&child)?);
                }
                Ok(branches)
            }
            Some(other) => Err(keyword_type_error(pointer, keyword, other)),
        }
    }

    fn compile_ref(&mut self, pointer: &str, reference: &Value) -> Result<NodeId, CompileError> {
        let Some(reference) = reference.as_str() else {
            return Err(keyword_type_error(pointer, "$ref", reference));
        };

        let Some(fragment) = reference.strip_prefix('#') else {
            return Err(CompileError::ExternalRef {
                path: pointer.to_string(),
                reference: reference.to_string(),
            });
        };

        let unresolvable = || CompileError::UnresolvableRef {
            path: pointer.to_string(),
            reference: reference.to_string(),
        };

        // Fragments are URI-encoded JSON Pointers
        let target = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|_| unresolvable())?;

        // Plain-name fragments (anchors) are not JSON Pointers
        if !target.is_empty() && !target.starts_with('/') {
            return Err(unresolvable());
        }
        if self.document.pointer(&target).is_none() {
            return Err(unresolvable());
        }

        self.compile_at(&target)
    }
}

/// Cache the end of every `$ref` chain, rejecting cycles.
fn resolve_terminals(nodes: &mut [SchemaNode]) -> Result<(), CompileError> {
    for start in 0..nodes.len() {
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = NodeId(start);

        while let Some(next) = nodes[current.0].reference {
            visited.insert(current);
            chain.push(current);
            if visited.contains(&next) {
                // Report only the loop, starting and ending at its entry
                let entry = chain.iter().position(|&id| id == next).unwrap_or(0);
                let chain = chain[entry..]
                    .iter()
                    .chain(std::iter::once(&next))
                    .map(|id| nodes[id.0].pointer.clone())
                    .collect();
                return Err(CompileError::CyclicRef { chain });
            }
            current = next;
        }

        nodes[start].terminal = current;
    }
    Ok(())
}

/// Build a validator for the subschema at `pointer`.
///
/// The whole document is reused with its root `$ref` aimed at the branch, so
/// local references inside the branch still resolve. Under draft 7 the other
/// root keywords are ignored.
fn branch_validator(document: &Value, pointer: &str) -> Result<Validator, CompileError> {
    let mut wrapper = document.clone();
    if let Value::Object(map) = &mut wrapper {
        map.insert(
            "$ref".to_string(),
            Value::String(format!("#{}", encode_fragment(pointer))),
        );
        map.insert("$schema".to_string(), Value::String(DRAFT7_URI.to_string()));
    }

    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(&wrapper)
        .map_err(|e| CompileError::InvalidSchema {
            path: pointer.to_string(),
            message: e.to_string(),
        })
}

fn type_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn keyword_type_error(pointer: &str, keyword: &str, value: &Value) -> CompileError {
    CompileError::InvalidSchema {
        path: format!("{}/{}", pointer, keyword),
        message: format!("unexpected {} value", json_type_name(value)),
    }
}

/// Append escaped reference tokens (RFC 6901) to a JSON Pointer.
fn child_pointer(pointer: &str, tokens: &[&str]) -> String {
    let mut out = pointer.to_string();
    for token in tokens {
        out.push('/');
        out.push_str(&token.replace('~', "~0").replace('/', "~1"));
    }
    out
}

/// Characters left unescaped in a URI fragment (RFC 3986 `pchar`, `/`, `?`).
const FRAGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/')
    .remove(b'?');

/// Percent-encode a JSON Pointer for use as a URI fragment.
fn encode_fragment(pointer: &str) -> String {
    utf8_percent_encode(pointer, FRAGMENT).to_string()
}
