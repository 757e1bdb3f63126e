//! Backend error variants.

use etna_ir::nodes::Span;
use thiserror::Error;

/// Renders an optional span as a `line:column: ` prefix.
#[must_use]
pub fn at(location: &Option<Span>) -> String {
    location.map(|l| format!("{l}: ")).unwrap_or_default()
}

/// Errors raised by the backend emitters. Emitters fail fast on the first
/// error and discard partial output.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum EmitError {
    /// The construct has no Lua rendering under the active policy.
    #[error("{}not emittable as Lua: {construct}", at(.location))]
    UnsupportedForLua {
        construct: String,
        location: Option<Span>,
    },

    /// The construct has no LLVM lowering in this backend.
    #[error("{}not emittable as LLVM IR: {construct}", at(.location))]
    UnsupportedForLlvm {
        construct: String,
        location: Option<Span>,
    },

    /// The construct has no WebAssembly lowering in this backend.
    #[error("{}not emittable as WebAssembly: {construct}", at(.location))]
    UnsupportedForWasm {
        construct: String,
        location: Option<Span>,
    },

    /// Cooperative cancellation was requested.
    #[error("compilation cancelled")]
    Cancelled,

    /// An emitter invariant was violated. Indicates a bug, not bad input.
    #[error("internal emitter error: {reason}")]
    Internal { reason: String },
}
