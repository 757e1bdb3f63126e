#![warn(clippy::pedantic)]
//! Surface AST for the Etna compiler.
//!
//! The surface language is parsed elsewhere; this crate defines the
//! ECMAScript-AST-shaped tree the pipeline accepts as input and its JSON
//! deserialization. Each node object carries a `"type"` tag in the usual
//! ECMAScript AST convention (`"Program"`, `"FunctionDeclaration"`, …).

pub mod errors;
pub mod nodes;

use crate::errors::AstError;
use crate::nodes::Program;

/// Parses a surface-AST JSON document.
///
/// # Errors
///
/// Returns [`AstError::Document`] when the text is not valid JSON or does
/// not follow the expected AST shape.
pub fn from_json(text: &str) -> Result<Program, AstError> {
    serde_json::from_str(text).map_err(|source| AstError::Document { source })
}
