//! Schema Defaults
//!
//! Applies the `default` values declared in a JSON Schema (draft-07) to JSON
//! documents.
//!
//! Defaults are filled recursively through nested objects, arrays (including
//! tuple-typed `items`), local `$ref`s and the `allOf`/`anyOf`/`oneOf`
//! combinators. The input document is never modified; a new one is returned.
//!
//! # Example
//!
//! ```
//! use schema_defaults::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::compile(&json!({
//!     "type": "object",
//!     "properties": {
//!         "id": { "type": "string" },
//!         "retries": { "type": "integer", "default": 3 },
//!         "tags": { "type": "array", "items": { "type": "string" } }
//!     },
//!     "required": ["id"]
//! }))
//! .unwrap();
//!
//! let result = schema.apply_defaults(&json!({ "id": "a1", "note": null }));
//!
//! assert_eq!(result["retries"], 3);
//! // No default and nothing to synthesize
//! assert!(result.get("tags").is_none());
//! // Explicit nulls are preserved
//! assert!(result["note"].is_null());
//! ```
//!
//! # Rules
//!
//! | Situation | Effect |
//! |-----------|--------|
//! | Property absent, has `default` | Default inserted |
//! | Property absent, object/array schema | Synthesized, inserted only if non-empty |
//! | Property present | Recursed into |
//! | Property `null` | Left as `null` |
//! | Property in `required` | Never defaulted |
//! | `anyOf`/`oneOf` with no usable match | Defaults from every branch |

mod defaults;
mod error;
mod loader;
mod schema;
mod types;

pub use defaults::{
    apply_defaults, apply_defaults_from_str, apply_defaults_from_value,
    apply_defaults_with_options,
};
pub use error::{CompileError, DefaultsError, LoadError, ValidateError, Violation};
pub use loader::{is_url, load_document, load_schema, load_schema_auto, load_schema_str};
pub use schema::{Items, NodeId, Schema, SchemaNode};
pub use types::{json_type_name, ApplyOptions, Combinator, DEFAULT_MAX_DEPTH};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
