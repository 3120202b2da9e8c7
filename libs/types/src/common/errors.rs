//! Error types for path addressing and identifier parsing
//!
//! Every variant here is an argument error: the input was malformed and the
//! single call that received it fails. Nothing in this module represents a
//! transient or recoverable condition.

use thiserror::Error;

/// Errors produced while constructing or deriving a [`Path`](crate::Path)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Splitting on `://` did not yield exactly a context and a remainder
    #[error("Expected two segments when splitting '{input}' on '://'")]
    ContextSplit { input: String },

    /// The context was the recursive wildcard
    #[error("Context cannot be the recursive wildcard '**'")]
    WildcardContext,

    /// Component contains the separator, is empty, or is not printable
    #[error("Invalid path component '{component}': {reason}")]
    InvalidComponent { component: String, reason: String },

    /// `**` appeared somewhere other than the final position
    #[error("Recursive wildcard must be the final component (found at {index} of {len})")]
    MisplacedRecursiveWildcard { index: usize, len: usize },

    /// Parent and child both define a context and they differ
    #[error("Context mismatch: parent '{parent}' != child '{child}'")]
    IncompatibleContext { parent: String, child: String },

    /// Child defines a context while the parent has none
    #[error("Parent path must have a context if the child has context '{child}'")]
    ContextRequired { child: String },

    /// Wildcard or component index out of range
    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange { index: isize, len: usize },

    /// Relative rendering requested for a path with a context
    #[error("Path '{path}' has a context; expected a relative path")]
    RelativePathRequired { path: String },

    /// Bytes were not valid UTF-8
    #[error("Path bytes are not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// Context could not be interpreted as a node id
    #[error("Context does not name a node: {0}")]
    InvalidNodeId(#[from] IdentifierError),
}

/// Errors produced while parsing identifiers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Node id text is not `{instance}.{application}`
    #[error("Malformed node id '{input}': {reason}")]
    MalformedNodeId { input: String, reason: String },

    /// A UUID segment failed to parse
    #[error("Invalid UUID '{input}'")]
    InvalidUuid { input: String },
}
