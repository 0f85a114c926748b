//! Error types for schema loading, compilation and validation.
//!
//! Applying defaults itself never fails; these errors come from the
//! surrounding steps (reading documents, compiling the schema, validating).

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a JSON document (schema or payload).
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// Errors while compiling a schema document into a [`Schema`](crate::Schema).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unsupported $ref \"{reference}\" at {path}: only local references (#/...) are supported")]
    ExternalRef { path: String, reference: String },

    #[error("unresolvable $ref \"{reference}\" at {path}")]
    UnresolvableRef { path: String, reference: String },

    #[error("cyclic $ref chain: {}", chain.join(" -> "))]
    CyclicRef { chain: Vec<String> },

    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },
}

impl CompileError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors from the one-shot convenience entry points.
#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl DefaultsError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DefaultsError::Load(e) => e.exit_code(),
            DefaultsError::Compile(e) => e.exit_code(),
        }
    }
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<Violation> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
