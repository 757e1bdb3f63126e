//! The pipeline-boundary error taxonomy.
//!
//! Every stage's typed errors flatten into [`CompileError`] at the pipeline
//! boundary. Handling is pattern-matching on the variant, never string
//! inspection; there is no recovery inside the core.

use etna_ast::errors::AstError;
use etna_codegen::errors::EmitError;
use etna_ir::errors::{InvalidNodeShape, SerializeError};
use etna_ir::nodes::Span;
use etna_lower::errors::LowerError;
use etna_validator::ValidationError;
use thiserror::Error;

/// Renders an optional span as a `line:column: ` prefix.
#[must_use]
pub fn at(location: &Option<Span>) -> String {
    location.map(|l| format!("{l}: ")).unwrap_or_default()
}

#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum CompileError {
    /// The input document could not be read as a surface AST (surfaced
    /// from the external parser side of the boundary).
    #[error("parse error: {reason}")]
    Parse { reason: String },

    /// The lowerer met a construct it does not handle.
    #[error("{}unsupported construct: {construct}", at(.location))]
    UnsupportedConstruct {
        construct: String,
        location: Option<Span>,
    },

    /// A node violated its variant schema or placement rules.
    #[error("{}{reason}", at(.location))]
    InvalidNodeShape {
        reason: String,
        location: Option<Span>,
    },

    /// An identifier failed scope resolution or uniqueness rules.
    #[error("{}{reason}", at(.location))]
    Scope {
        reason: String,
        location: Option<Span>,
    },

    /// Types incompatible under the lattice.
    #[error("{}{reason}", at(.location))]
    Type {
        reason: String,
        location: Option<Span>,
    },

    /// A malformed destructuring pattern.
    #[error("{}invalid pattern: {reason}", at(.location))]
    Pattern {
        reason: String,
        location: Option<Span>,
    },

    /// The Lua backend cannot express the construct under the active
    /// policy.
    #[error("{}not emittable as Lua: {construct}", at(.location))]
    UnsupportedForLua {
        construct: String,
        location: Option<Span>,
    },

    /// The LLVM backend cannot express the construct.
    #[error("{}not emittable as LLVM IR: {construct}", at(.location))]
    UnsupportedForLlvm {
        construct: String,
        location: Option<Span>,
    },

    /// The WebAssembly backend cannot express the construct.
    #[error("{}not emittable as WebAssembly: {construct}", at(.location))]
    UnsupportedForWasm {
        construct: String,
        location: Option<Span>,
    },

    /// Cooperative cancellation was requested; partial output is discarded.
    #[error("compilation cancelled")]
    Cancelled,

    /// A warning promoted to an error under strict determinism.
    #[error("{}{message} (warning promoted under strict determinism)", at(.location))]
    StrictWarning {
        message: String,
        location: Option<Span>,
    },

    /// An invariant violation. Always a bug, never bad input.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl From<AstError> for CompileError {
    fn from(error: AstError) -> Self {
        CompileError::Parse {
            reason: error.to_string(),
        }
    }
}

impl From<SerializeError> for CompileError {
    fn from(error: SerializeError) -> Self {
        CompileError::Parse {
            reason: error.to_string(),
        }
    }
}

impl From<InvalidNodeShape> for CompileError {
    fn from(error: InvalidNodeShape) -> Self {
        CompileError::InvalidNodeShape {
            reason: format!("invalid node shape for {}: {}", error.kind, error.reason),
            location: error.location,
        }
    }
}

impl From<LowerError> for CompileError {
    fn from(error: LowerError) -> Self {
        match error {
            LowerError::UnsupportedConstruct {
                construct,
                location,
            } => CompileError::UnsupportedConstruct {
                construct,
                location,
            },
            LowerError::Scope {
                name,
                violation,
                location,
            } => CompileError::Scope {
                reason: format!("{violation} `{name}`"),
                location,
            },
            LowerError::Pattern { reason, location } => {
                CompileError::Pattern { reason, location }
            }
            LowerError::Shape(shape) => shape.into(),
            LowerError::Cancelled => CompileError::Cancelled,
        }
    }
}

impl From<ValidationError> for CompileError {
    fn from(error: ValidationError) -> Self {
        let rendered = error.to_string();
        match error {
            ValidationError::Structural {
                kind,
                reason,
                location,
            } => CompileError::InvalidNodeShape {
                reason: format!("malformed {kind} node: {reason}"),
                location,
            },
            ValidationError::ReturnOutsideFunction { location } => {
                CompileError::InvalidNodeShape {
                    reason: "return outside a function".to_string(),
                    location,
                }
            }
            ValidationError::BreakOutsideLoop { location } => CompileError::InvalidNodeShape {
                reason: "break outside a loop or switch".to_string(),
                location,
            },
            ValidationError::ContinueOutsideLoop { location } => {
                CompileError::InvalidNodeShape {
                    reason: "continue outside a loop".to_string(),
                    location,
                }
            }
            ValidationError::UndeclaredIdentifier { name, location } => CompileError::Scope {
                reason: format!("use of undeclared identifier `{name}`"),
                location,
            },
            ValidationError::Redeclaration { name, location } => CompileError::Scope {
                reason: format!("conflicting redeclaration of `{name}`"),
                location,
            },
            ValidationError::AssignmentToConst { name, location } => CompileError::Scope {
                reason: format!("assignment to constant `{name}`"),
                location,
            },
            ValidationError::IncompatibleOperand { location, .. }
            | ValidationError::IncomparableOperands { location, .. }
            | ValidationError::IncompatibleUnaryOperand { location, .. }
            | ValidationError::ArityMismatch { location, .. }
            | ValidationError::LiteralTypeMismatch { location, .. } => CompileError::Type {
                reason: strip_location_prefix(&rendered),
                location,
            },
        }
    }
}

impl From<EmitError> for CompileError {
    fn from(error: EmitError) -> Self {
        match error {
            EmitError::UnsupportedForLua {
                construct,
                location,
            } => CompileError::UnsupportedForLua {
                construct,
                location,
            },
            EmitError::UnsupportedForLlvm {
                construct,
                location,
            } => CompileError::UnsupportedForLlvm {
                construct,
                location,
            },
            EmitError::UnsupportedForWasm {
                construct,
                location,
            } => CompileError::UnsupportedForWasm {
                construct,
                location,
            },
            EmitError::Cancelled => CompileError::Cancelled,
            EmitError::Internal { reason } => CompileError::Internal { reason },
        }
    }
}

/// The validation display already leads with `line:column: `; drop it so the
/// flattened variant does not render the prefix twice.
fn strip_location_prefix(message: &str) -> String {
    match message.split_once(": ") {
        Some((prefix, rest))
            if prefix.chars().all(|c| c.is_ascii_digit() || c == ':') && !prefix.is_empty() =>
        {
            rest.to_string()
        }
        _ => message.to_string(),
    }
}
