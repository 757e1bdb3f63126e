//! Error types for the IR crate.

use thiserror::Error;

use crate::nodes::{NodeKind, Span};

/// A builder factory received arguments violating its arity/type contract.
#[derive(Debug, Clone, Error)]
#[error("invalid node shape for {kind}: {reason}{}", .location.map(|l| format!(" at {l}")).unwrap_or_default())]
#[must_use = "errors must not be silently ignored"]
pub struct InvalidNodeShape {
    pub kind: NodeKind,
    pub reason: String,
    pub location: Option<Span>,
}

impl InvalidNodeShape {
    pub(crate) fn new(kind: NodeKind, reason: impl Into<String>, location: Option<Span>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            location,
        }
    }
}

/// Errors raised when reading canonical IR JSON back into a tree.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum SerializeError {
    /// The document is not valid JSON at all.
    #[error("malformed IR document: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    /// The document is JSON but does not follow the IR schema.
    #[error("malformed IR document: {reason}")]
    Malformed { reason: String },

    /// An object carries a `kind` outside the closed node set.
    #[error("unknown node kind `{kind}`")]
    UnknownKind { kind: String },

    /// The document's schema version is not the one this build writes.
    #[error("unsupported IR schema version `{found}`, expected `{expected}`")]
    UnsupportedVersion { found: String, expected: String },
}

impl From<serde_json::Error> for SerializeError {
    fn from(source: serde_json::Error) -> Self {
        SerializeError::Json { source }
    }
}
