#![warn(clippy::pedantic)]
//! Lowering for the Etna compiler: surface AST in, canonical IR out.
//!
//! Two passes live here. The [`normalizer`] cleans up the surface tree
//! (block wrapping, declarator splitting, arrow-body rewriting) and is total
//! and idempotent. The [`lowerer`] then performs a single top-down traversal
//! with a block-structured scope stack, producing the canonical IR and a
//! warning list, or failing fast with the first error it hits.

pub mod errors;
pub mod lowerer;
pub mod normalizer;
pub mod scope;

pub use errors::LowerError;
pub use lowerer::{Lowered, LowerOptions, lower};
pub use normalizer::normalize;
