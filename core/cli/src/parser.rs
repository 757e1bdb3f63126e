//! Command line argument parsing for the Etna compiler.
//!
//! This module defines the CLI interface using `clap`. The `Cli` struct
//! captures all flags and arguments passed to the `etnac` binary.

use clap::Parser;

/// Command line interface definition for the Etna compiler.
///
/// `etnac` consumes a surface-AST JSON document (produced by an external
/// parser) and emits one artifact per requested target flag. At least one
/// target must be requested.
///
/// ## Examples
///
/// Emit Lua and the canonical IR document:
/// ```bash
/// etnac program.ast.json --lua --ir
/// ```
///
/// Emit everything into a custom directory with strict determinism:
/// ```bash
/// etnac program.ast.json --ir --lua --js --llvm --wasm -o build --strict
/// ```
#[derive(Parser)]
#[command(
    name = "etnac",
    author,
    version,
    about = "Etna compiler CLI (etnac)",
    long_about = "The 'etnac' command lowers a surface-AST JSON document through the canonical IR \
and emits the requested targets: canonical IR JSON, Lua, JavaScript, LLVM textual IR, and \
WebAssembly binaries."
)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct Cli {
    /// Path to the surface-AST JSON document to compile.
    pub(crate) path: std::path::PathBuf,

    /// Emit the canonical IR as `<stem>.ir.json`.
    #[clap(long = "ir", action = clap::ArgAction::SetTrue)]
    pub(crate) ir: bool,

    /// Emit Lua source as `<stem>.lua`.
    #[clap(long = "lua", action = clap::ArgAction::SetTrue)]
    pub(crate) lua: bool,

    /// Emit JavaScript source as `<stem>.js`.
    #[clap(long = "js", action = clap::ArgAction::SetTrue)]
    pub(crate) js: bool,

    /// Emit LLVM textual IR as `<stem>.ll`.
    #[clap(long = "llvm", action = clap::ArgAction::SetTrue)]
    pub(crate) llvm: bool,

    /// Emit a WebAssembly binary as `<stem>.wasm`.
    #[clap(long = "wasm", action = clap::ArgAction::SetTrue)]
    pub(crate) wasm: bool,

    /// Output directory (created if missing).
    #[clap(short = 'o', long = "out-dir", default_value = "out")]
    pub(crate) out_dir: std::path::PathBuf,

    /// Path to a compiler configuration JSON document.
    #[clap(long = "config")]
    pub(crate) config: Option<std::path::PathBuf>,

    /// Enable strict determinism: warnings become errors and loose
    /// constructs are rejected.
    #[clap(long = "strict", action = clap::ArgAction::SetTrue)]
    pub(crate) strict: bool,
}
