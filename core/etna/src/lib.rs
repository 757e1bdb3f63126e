#![warn(clippy::pedantic)]
//! Core orchestration crate for the Etna compiler pipeline.
//!
//! Etna lowers an ECMAScript-shaped surface AST through a canonical,
//! deterministic IR and emits Lua, JavaScript, LLVM textual IR, and
//! WebAssembly binaries:
//!
//! ```text
//! Surface AST → Normalizer → Lowerer → Canonical IR → Validator
//!                                          │
//!                                          ▼
//!                                   Serializer (JSON)
//!                                          │
//!                      ┌───────────┬───────┴────────┬───────────┐
//!                      ▼           ▼                ▼           ▼
//!                 Lua emitter  JS emitter   LLVM emitter  WASM emitter
//! ```
//!
//! Each phase is exposed as a standalone function delegating to the
//! specialized crates, and [`compile`] runs the whole pipeline for a set of
//! [`Target`]s. The pipeline is single-threaded per compilation unit, does
//! no I/O, and holds no shared state: independent units may be compiled in
//! parallel by independent calls.
//!
//! ## Determinism
//!
//! For a fixed input AST and configuration, node IDs, the IR JSON document,
//! and every target artifact are byte-identical across runs. Nothing in the
//! pipeline consults ambient state.
//!
//! ## Errors and warnings
//!
//! [`compile`] returns either a [`CompileOutcome`] (artifacts plus a warning
//! list) or a non-empty error list. The lowerer and emitters fail fast; the
//! validator accumulates. Under `determinism.strict` all warnings are
//! promoted to errors.
//!
//! ## Cancellation
//!
//! A caller-supplied [`Cancellation`] predicate is polled at
//! function-boundary granularity during lowering and emission; once it
//! reports true the pipeline discards partial output and returns
//! [`CompileError::Cancelled`].
//!
//! ## Quick start
//!
//! ```no_run
//! use etna::{compile, CompilerConfig, Target};
//! use etna_ir::cancel::Cancellation;
//!
//! # fn demo(document: &str) -> Result<(), Vec<etna::CompileError>> {
//! let ast = etna::parse_ast(document).map_err(|e| vec![e])?;
//! let outcome = compile(
//!     &ast,
//!     &CompilerConfig::default(),
//!     &[Target::Ir, Target::Lua],
//!     &Cancellation::never(),
//! )?;
//! assert!(outcome.artifacts.lua.is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;

use etna_ast::nodes as ast;
use etna_codegen::js::JsOptions;
use etna_codegen::llvm::LlvmOptions;
use etna_codegen::lua::LuaOptions;
use etna_codegen::wasm::WasmOptions;
use etna_codegen::Emission;
use etna_ir::cancel::Cancellation;
use etna_ir::diagnostics::Warning;
use etna_ir::nodes::Program;
use etna_lower::{LowerOptions, Lowered};
use etna_validator::Validation;

pub use config::CompilerConfig;
pub use errors::CompileError;

/// A requested output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Canonical IR JSON.
    Ir,
    Lua,
    Js,
    Llvm,
    Wasm,
}

/// The artifacts produced for one compilation unit.
#[derive(Debug, Default)]
pub struct Artifacts {
    pub ir_json: Option<String>,
    pub lua: Option<String>,
    pub js: Option<String>,
    pub llvm: Option<String>,
    pub wasm: Option<Vec<u8>>,
}

/// A successful compilation: artifacts plus accumulated warnings.
#[derive(Debug)]
pub struct CompileOutcome {
    pub artifacts: Artifacts,
    pub warnings: Vec<Warning>,
}

/// Reads a surface-AST JSON document.
///
/// # Errors
///
/// Returns [`CompileError::Parse`] when the document is malformed.
pub fn parse_ast(document: &str) -> Result<ast::Program, CompileError> {
    Ok(etna_ast::from_json(document)?)
}

/// Normalizes a surface program. Total and idempotent.
#[must_use]
pub fn normalize(program: &ast::Program) -> ast::Program {
    etna_lower::normalize(program)
}

/// Lowers a normalized surface program to canonical IR.
///
/// # Errors
///
/// Surfaces the lowerer's first error.
pub fn lower(
    program: &ast::Program,
    config: &CompilerConfig,
    cancel: &Cancellation,
) -> Result<Lowered, CompileError> {
    let options = LowerOptions {
        strict: config.strict(),
    };
    Ok(etna_lower::lower(program, &options, cancel)?)
}

/// Validates canonical IR, accumulating every error and warning.
#[must_use]
pub fn validate(program: &Program) -> Validation {
    etna_validator::validate(program)
}

/// Serializes canonical IR to its deterministic JSON form.
#[must_use]
pub fn serialize(program: &Program, indent: Option<usize>) -> String {
    etna_ir::serializer::to_json(program, indent)
}

/// Reads canonical IR back from JSON. The inverse of [`serialize`].
///
/// # Errors
///
/// Returns [`CompileError::Parse`] on malformed documents or a schema
/// version mismatch.
pub fn deserialize(document: &str) -> Result<Program, CompileError> {
    Ok(etna_ir::serializer::from_json(document)?)
}

/// Emits Lua source for a validated program.
///
/// # Errors
///
/// Surfaces the Lua backend's first error.
pub fn emit_lua(
    program: &Program,
    config: &CompilerConfig,
    cancel: &Cancellation,
) -> Result<Emission<String>, CompileError> {
    let options = LuaOptions {
        indent: 2,
        emit_continue_warning: config.lua.emit_continue_warning,
        strict: config.strict(),
    };
    Ok(etna_codegen::lua::emit(program, &options, cancel)?)
}

/// Emits JavaScript source for a validated program.
///
/// # Errors
///
/// Surfaces the JS backend's first error.
pub fn emit_js(
    program: &Program,
    config: &CompilerConfig,
    cancel: &Cancellation,
) -> Result<Emission<String>, CompileError> {
    let options = JsOptions {
        semicolons: config.js.semicolons,
        indent: config.js.indent,
    };
    Ok(etna_codegen::js::emit(program, &options, cancel)?)
}

/// Emits an LLVM textual module for a validated program.
///
/// # Errors
///
/// Surfaces the LLVM backend's first error.
pub fn emit_llvm(
    program: &Program,
    config: &CompilerConfig,
    cancel: &Cancellation,
) -> Result<Emission<String>, CompileError> {
    let options = LlvmOptions {
        module_name: config.module_name.clone(),
        target_triple: config.target_triple.clone(),
    };
    Ok(etna_codegen::llvm::emit(program, &options, cancel)?)
}

/// Emits a WebAssembly binary for a validated program.
///
/// # Errors
///
/// Surfaces the WASM backend's first error.
pub fn emit_wasm(
    program: &Program,
    config: &CompilerConfig,
    cancel: &Cancellation,
) -> Result<Emission<Vec<u8>>, CompileError> {
    let options = WasmOptions {
        memory_initial_pages: config.wasm.memory_initial_pages,
        memory_max_pages: config.wasm.memory_max_pages,
    };
    Ok(etna_codegen::wasm::emit(program, &options, cancel)?)
}

/// Runs the full pipeline: normalize, lower, validate, then emit each
/// requested target.
///
/// # Errors
///
/// Returns a non-empty error list and no artifacts when any stage fails.
/// The validator contributes every error it found; other stages contribute
/// their first. Under strict determinism, accumulated warnings are promoted
/// and returned as errors.
pub fn compile(
    program: &ast::Program,
    config: &CompilerConfig,
    targets: &[Target],
    cancel: &Cancellation,
) -> Result<CompileOutcome, Vec<CompileError>> {
    let normalized = normalize(program);
    let lowered = lower(&normalized, config, cancel).map_err(|e| vec![e])?;
    let mut warnings = lowered.warnings;

    let validation = validate(&lowered.program);
    warnings.extend(validation.warnings);
    if !validation.valid {
        return Err(validation
            .errors
            .into_iter()
            .map(CompileError::from)
            .collect());
    }

    let mut artifacts = Artifacts::default();
    for target in targets {
        match target {
            Target::Ir => {
                artifacts.ir_json = Some(serialize(&lowered.program, Some(2)));
            }
            Target::Lua => {
                let emission = emit_lua(&lowered.program, config, cancel).map_err(|e| vec![e])?;
                warnings.extend(emission.warnings);
                artifacts.lua = Some(emission.output);
            }
            Target::Js => {
                let emission = emit_js(&lowered.program, config, cancel).map_err(|e| vec![e])?;
                warnings.extend(emission.warnings);
                artifacts.js = Some(emission.output);
            }
            Target::Llvm => {
                let emission = emit_llvm(&lowered.program, config, cancel).map_err(|e| vec![e])?;
                warnings.extend(emission.warnings);
                artifacts.llvm = Some(emission.output);
            }
            Target::Wasm => {
                let emission = emit_wasm(&lowered.program, config, cancel).map_err(|e| vec![e])?;
                warnings.extend(emission.warnings);
                artifacts.wasm = Some(emission.output);
            }
        }
    }

    if config.strict() && !warnings.is_empty() {
        return Err(warnings
            .into_iter()
            .map(|w| CompileError::StrictWarning {
                message: w.message,
                location: w.location,
            })
            .collect());
    }

    Ok(CompileOutcome {
        artifacts,
        warnings,
    })
}
