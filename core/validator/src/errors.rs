//! Validation error variants.
//!
//! Every variant carries the offending node's location when one was echoed
//! from the source. Errors are fatal for the unit; advisory findings are
//! reported as warnings instead.

use core::fmt;
use std::fmt::{Display, Formatter};

use etna_ir::nodes::{BinaryOperator, NodeKind, Span, UnaryOperator};
use etna_ir::types::Type;
use thiserror::Error;

/// Renders an optional span as a `line:column: ` prefix.
#[must_use]
pub fn at(location: &Option<Span>) -> String {
    location.map(|l| format!("{l}: ")).unwrap_or_default()
}

/// Which side of a binary operation failed a type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSide {
    Left,
    Right,
}

impl Display for OperandSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OperandSide::Left => write!(f, "left"),
            OperandSide::Right => write!(f, "right"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum ValidationError {
    /// A node does not match its variant schema.
    #[error("{}malformed {kind} node: {reason}", at(.location))]
    Structural {
        kind: NodeKind,
        reason: String,
        location: Option<Span>,
    },

    /// An identifier does not resolve to a declaration or free identifier.
    #[error("{}use of undeclared identifier `{name}`", at(.location))]
    UndeclaredIdentifier {
        name: String,
        location: Option<Span>,
    },

    /// A conflicting redeclaration within one scope.
    #[error("{}conflicting redeclaration of `{name}`", at(.location))]
    Redeclaration {
        name: String,
        location: Option<Span>,
    },

    /// An operand is incompatible with its binary operator.
    #[error(
        "{}{side} operand of `{operator}` has type `{found}`, expected `{expected}`",
        at(.location)
    )]
    IncompatibleOperand {
        operator: BinaryOperator,
        side: OperandSide,
        expected: Type,
        found: Type,
        location: Option<Span>,
    },

    /// The two sides of a comparison cannot be related under the lattice.
    #[error(
        "{}`{operator}` compares unrelated types `{left}` and `{right}`",
        at(.location)
    )]
    IncomparableOperands {
        operator: BinaryOperator,
        left: Type,
        right: Type,
        location: Option<Span>,
    },

    /// A unary operand is incompatible with its operator.
    #[error(
        "{}operand of `{operator}` has type `{found}`, expected `{expected}`",
        at(.location)
    )]
    IncompatibleUnaryOperand {
        operator: UnaryOperator,
        expected: Type,
        found: Type,
        location: Option<Span>,
    },

    /// A call does not match the callee's parameter count.
    #[error(
        "{}call to `{function}` passes {found} argument(s), expected {expected}",
        at(.location)
    )]
    ArityMismatch {
        function: String,
        expected: String,
        found: usize,
        location: Option<Span>,
    },

    /// A literal value disagrees with its declared type.
    #[error("{}literal of type `{found}` annotated as `{declared}`", at(.location))]
    LiteralTypeMismatch {
        declared: Type,
        found: Type,
        location: Option<Span>,
    },

    /// `return` outside a function body.
    #[error("{}return outside a function", at(.location))]
    ReturnOutsideFunction { location: Option<Span> },

    /// `break` outside a loop or switch.
    #[error("{}break outside a loop or switch", at(.location))]
    BreakOutsideLoop { location: Option<Span> },

    /// `continue` outside a loop.
    #[error("{}continue outside a loop", at(.location))]
    ContinueOutsideLoop { location: Option<Span> },

    /// Assignment to a `const` binding.
    #[error("{}assignment to constant `{name}`", at(.location))]
    AssignmentToConst {
        name: String,
        location: Option<Span>,
    },
}
