//! Error types for the logline crate.
//!
//! Compilation errors are hard failures surfaced when a format is loaded.
//! Rendering has no error type: missing data degrades to the placeholder.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while compiling a format string into a [`Program`](crate::Program).
///
/// Every variant carries the byte offset of the `%` that opened the
/// offending field so configuration errors can point at the exact spot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A `%` was opened but never closed.
    #[error("unterminated field starting at offset {position}")]
    Unterminated { position: usize },

    /// The field name is not in the command table.
    #[error("unknown field `{name}` at offset {position}")]
    UnknownField { name: String, position: usize },

    /// A parameter was given to a field that does not take one.
    #[error("field `{field}` does not take a parameter (offset {position})")]
    UnexpectedParameter { field: String, position: usize },

    /// A field that requires a parameter was used without one.
    #[error("field `{field}` requires a parameter (offset {position})")]
    MissingParameter { field: String, position: usize },

    /// The `:N` suffix is not a non-negative integer.
    #[error("invalid length `{value}` for field `{field}` (offset {position})")]
    InvalidLength {
        field: String,
        value: String,
        position: usize,
    },

    /// A `(` was opened inside a field but never closed.
    #[error("unterminated parameter for field `{field}` (offset {position})")]
    UnterminatedParameter { field: String, position: usize },

    /// Text after the closing `)` that is not a `:N` suffix.
    #[error("unexpected `{rest}` after parameter of field `{field}` (offset {position})")]
    TrailingCharacters {
        field: String,
        rest: String,
        position: usize,
    },

    /// A `primary?fallback` selector with an empty half or more than one `?`.
    #[error(
        "invalid selector `{selector}` for field `{field}`: expected `{expected}` or \
         `{expected}?{expected}` (offset {position})"
    )]
    InvalidSelector {
        field: String,
        selector: String,
        /// What each half names, e.g. `HTTP field`.
        expected: &'static str,
        position: usize,
    },
}

impl CompileError {
    /// Byte offset of the `%` that opened the failing field.
    pub fn position(&self) -> usize {
        match self {
            CompileError::Unterminated { position }
            | CompileError::UnknownField { position, .. }
            | CompileError::UnexpectedParameter { position, .. }
            | CompileError::MissingParameter { position, .. }
            | CompileError::InvalidLength { position, .. }
            | CompileError::UnterminatedParameter { position, .. }
            | CompileError::TrailingCharacters { position, .. }
            | CompileError::InvalidSelector { position, .. } => *position,
        }
    }
}

/// Errors produced while loading an access-log configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("could not read access log config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML document is malformed or has unknown keys.
    #[error("invalid YAML access log config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON document is malformed or has unknown keys.
    #[error("invalid JSON access log config: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension is not one of `yaml`, `yml` or `json`.
    #[error("unsupported access log config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The format string does not compile.
    #[error("invalid access log format: {0}")]
    Compile(#[from] CompileError),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
