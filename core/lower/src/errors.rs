//! Error types for the lowering crate.

use core::fmt;
use std::fmt::{Display, Formatter};

use etna_ir::errors::InvalidNodeShape;
use etna_ir::nodes::Span;
use thiserror::Error;

/// Renders an optional span as a `line:column: ` prefix.
#[must_use]
pub fn at(location: &Option<Span>) -> String {
    location.map(|l| format!("{l}: ")).unwrap_or_default()
}

/// Why a scope check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeViolation {
    Undeclared,
    Redeclared,
}

impl Display for ScopeViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScopeViolation::Undeclared => write!(f, "use of undeclared identifier"),
            ScopeViolation::Redeclared => write!(f, "redeclaration of identifier"),
        }
    }
}

/// Errors raised while lowering the surface AST to IR. The lowerer never
/// retries; the first error is surfaced to the caller.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum LowerError {
    /// A surface node kind the lowerer does not handle.
    #[error("{}unsupported construct: {construct}", at(.location))]
    UnsupportedConstruct {
        construct: String,
        location: Option<Span>,
    },

    /// An undeclared or re-declared identifier in strict mode.
    #[error("{}{violation} `{name}`", at(.location))]
    Scope {
        name: String,
        violation: ScopeViolation,
        location: Option<Span>,
    },

    /// A malformed destructuring pattern.
    #[error("{}invalid pattern: {reason}", at(.location))]
    Pattern {
        reason: String,
        location: Option<Span>,
    },

    /// A builder factory rejected a node shape. Indicates a lowerer bug.
    #[error(transparent)]
    Shape(#[from] InvalidNodeShape),

    /// Cooperative cancellation was requested.
    #[error("compilation cancelled")]
    Cancelled,
}
