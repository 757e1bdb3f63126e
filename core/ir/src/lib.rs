#![warn(clippy::pedantic)]
//! Canonical IR for the Etna compiler.
//!
//! This crate defines the data model shared by every stage of the pipeline:
//! the tagged-variant node set, the type lattice, the deterministic node-ID
//! generator, the shape-checking builder, and the canonical JSON
//! serialization. Trees produced here are strictly owned (no shared
//! subgraphs); identifiers refer to declarations by name only, and each
//! consumer rebuilds its own scope tables.
//!
//! Determinism is a contract, not a convenience: for a fixed input, node IDs,
//! serialized JSON, and every downstream artifact are byte-identical across
//! runs. Nothing in this crate may iterate a hash map into an output.

pub mod builder;
pub mod cancel;
pub mod diagnostics;
pub mod errors;
pub mod id;
pub mod metadata;
pub mod nodes;
pub mod serializer;
pub mod types;
