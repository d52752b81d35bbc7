//! Error types for argspec loading, casting, decoding and describing.
//!
//! Casting errors are always fatal for a submission. The only soft
//! condition in the codec (an unmatched choice-of-one) is not an error at
//! all; it is reported through [`crate::decode::Diagnostic`].
use thiserror::Error;

use crate::path_de::PathError;

/// Top-level error for callers that do not care which stage failed.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Describe(#[from] DescribeError),
    #[error("invalid flat form {0}")]
    Form(PathError),
}

impl Error {
    /// Stable short name of the failure, used by fixtures and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Schema(_) => "Schema",
            Error::Decode(e) => e.kind(),
            Error::Describe(_) => "Describe",
            Error::Form(_) => "Form",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CASTING
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CastError {
    /// The requested type name is outside the converter whitelist.
    #[error("`{0}` is not a permitted type")]
    InvalidType(String),
    #[error(
        "`{value}` is invalid for type '{type_name}'{}",
        .context.as_deref().map(|name| format!(" for arg '{name}'")).unwrap_or_default()
    )]
    InvalidValue {
        value: String,
        type_name: String,
        context: Option<String>,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid argspec {0}")]
    Parse(#[from] PathError),
    #[error("invalid type expression `{expr}`: {message}")]
    TypeExpr { expr: String, message: String },
    #[error("'{name}': missing field '{field}'")]
    MissingField { name: String, field: &'static str },
    #[error("'{name}': choice-of-one has no candidates")]
    EmptyChoice { name: String },
    #[error("'{name}': candidate '{candidate}' is declared twice")]
    DuplicateCandidate { name: String, candidate: String },
    #[error("'{name}': no values given for candidate '{candidate}'")]
    MissingCandidate { name: String, candidate: String },
    #[error("'{name}': struct list declares {expected} types but {actual} values")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("'{name}': type `{type_name}` cannot take values {message}")]
    Values {
        name: String,
        type_name: String,
        message: &'static str,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// CONFIG
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("delimiter must not be empty")]
    EmptyDelimiter,
    #[error("delimiter `{0}` must not contain '[' or ']'")]
    BracketDelimiter(String),
    #[error("max depth must be at least 1")]
    ZeroDepth,
}

// ————————————————————————————————————————————————————————————————————————————
// DECODING
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("'{path}' is declared as {declared} but was submitted as {submitted}")]
    TypeMismatch {
        path: String,
        declared: String,
        submitted: String,
    },
    #[error("form entry '{key}' has {actual} parts, expected at least {expected}")]
    MalformedEntry {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("'{path}' has more than one entry at index {index}")]
    DuplicateIndex { path: String, index: usize },
    #[error("'{path}' has more than one entry for key '{key}'")]
    DuplicateKey { path: String, key: String },
    #[error("form key '{key}' has an index too large to address")]
    IndexOverflow { key: String },
    #[error("'{path}' declares {arity} positions but the form has an entry at index {index}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        arity: usize,
    },
    #[error("'{path}' nests deeper than the limit of {limit}")]
    DepthExceeded { path: String, limit: usize },
    #[error("failed to compile key patterns: {0}")]
    KeyPattern(#[from] regex::Error),
}

impl DecodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Cast(CastError::InvalidType(_)) => "InvalidType",
            DecodeError::Cast(CastError::InvalidValue { .. }) => "InvalidValue",
            DecodeError::Config(_) => "Config",
            DecodeError::TypeMismatch { .. } => "TypeMismatch",
            DecodeError::MalformedEntry { .. } => "MalformedEntry",
            DecodeError::DuplicateIndex { .. } => "DuplicateIndex",
            DecodeError::DuplicateKey { .. } => "DuplicateKey",
            DecodeError::IndexOverflow { .. } => "IndexOverflow",
            DecodeError::IndexOutOfRange { .. } => "IndexOutOfRange",
            DecodeError::DepthExceeded { .. } => "DepthExceeded",
            DecodeError::KeyPattern(_) => "KeyPattern",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DESCRIBING & SOURCES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("no source registered for `{0}`")]
    UnknownSource(String),
    #[error("instance '{id}' of `{class}` has no attribute '{attr}'")]
    MissingAttribute {
        class: String,
        id: String,
        attr: String,
    },
    #[error("display format `{0}` has no placeholders")]
    EmptyFormat(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescribeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("'{path}': {source}")]
    Source { path: String, source: SourceError },
    #[error("'{path}' nests deeper than the limit of {limit}")]
    DepthExceeded { path: String, limit: usize },
}
