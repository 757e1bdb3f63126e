#![warn(clippy::pedantic)]

//! # Etna Compiler CLI
//!
//! Command line driver for the Etna pipeline.
//!
//! The binary reads a surface-AST JSON document, runs the pipeline for the
//! requested targets, and writes one artifact per target under the output
//! directory. Warnings go to stderr; errors go to stderr and exit with
//! code 1.
//!
//! ## Exit codes
//! * 0 – success.
//! * 1 – usage / IO / compilation failure.
//!
//! ## Example
//! ```bash
//! etnac examples.ast.json --lua --ir -o build
//! ```

mod parser;

use clap::Parser;
use etna::{CompilerConfig, Target, compile, parse_ast};
use etna_ir::cancel::Cancellation;
use parser::Cli;
use std::{fs, process};

fn main() {
    let args = Cli::parse();
    if !args.path.exists() {
        eprintln!("Error: path not found");
        process::exit(1);
    }

    let mut targets = Vec::new();
    if args.ir {
        targets.push(Target::Ir);
    }
    if args.lua {
        targets.push(Target::Lua);
    }
    if args.js {
        targets.push(Target::Js);
    }
    if args.llvm {
        targets.push(Target::Llvm);
    }
    if args.wasm {
        targets.push(Target::Wasm);
    }
    if targets.is_empty() {
        eprintln!(
            "Error: at least one of --ir, --lua, --js, --llvm, or --wasm must be specified"
        );
        process::exit(1);
    }

    let mut config = match &args.config {
        Some(path) => {
            let document = match fs::read_to_string(path) {
                Ok(document) => document,
                Err(e) => {
                    eprintln!("Error reading config {}: {e}", path.display());
                    process::exit(1);
                }
            };
            match CompilerConfig::from_json(&document) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error parsing config {}: {e}", path.display());
                    process::exit(1);
                }
            }
        }
        None => CompilerConfig::default(),
    };
    if args.strict {
        config.determinism.strict = true;
    }

    let document = match fs::read_to_string(&args.path) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.path.display());
            process::exit(1);
        }
    };
    let ast = match parse_ast(&document) {
        Ok(ast) => ast,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let outcome = match compile(&ast, &config, &targets, &Cancellation::never()) {
        Ok(outcome) => outcome,
        Err(errors) => {
            for error in errors {
                eprintln!("error: {error}");
            }
            process::exit(1);
        }
    };
    for warning in &outcome.warnings {
        eprintln!("warning: {warning}");
    }

    if let Err(e) = fs::create_dir_all(&args.out_dir) {
        eprintln!("Failed to create output directory: {e}");
        process::exit(1);
    }
    let stem = args
        .path
        .file_stem()
        .unwrap_or_else(|| std::ffi::OsStr::new("module"))
        .to_string_lossy()
        .into_owned();
    // "program.ast.json" should land as "program.lua", not "program.ast.lua".
    let stem = stem.strip_suffix(".ast").unwrap_or(&stem).to_string();

    let artifacts = outcome.artifacts;
    let write = |name: String, bytes: &[u8]| {
        let path = args.out_dir.join(name);
        if let Err(e) = fs::write(&path, bytes) {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        }
        println!("Wrote {}", path.display());
    };
    if let Some(ir_json) = &artifacts.ir_json {
        write(format!("{stem}.ir.json"), ir_json.as_bytes());
    }
    if let Some(lua) = &artifacts.lua {
        write(format!("{stem}.lua"), lua.as_bytes());
    }
    if let Some(js) = &artifacts.js {
        write(format!("{stem}.js"), js.as_bytes());
    }
    if let Some(llvm) = &artifacts.llvm {
        write(format!("{stem}.ll"), llvm.as_bytes());
    }
    if let Some(wasm) = &artifacts.wasm {
        write(format!("{stem}.wasm"), wasm);
    }
    process::exit(0);
}
