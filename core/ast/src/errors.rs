//! Error types for the surface AST crate.

use thiserror::Error;

/// Errors raised while reading a surface-AST document.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum AstError {
    /// The input is not a well-formed AST document.
    #[error("malformed AST document: {source}")]
    Document {
        #[source]
        source: serde_json::Error,
    },
}
